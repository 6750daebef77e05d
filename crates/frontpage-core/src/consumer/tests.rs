//! Consumer tests against an in-memory fake store.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
};

use serde_json::json;

use super::*;
use crate::{
  event::RawEvent,
  ident::{Did, Rkey},
  mirror::{
    Comment, CommentView, NewComment, NewPost, NewVote, Post, PostView, UserCounts,
    ViewerContext, Vote,
  },
  record::Collection,
};

#[derive(Debug, thiserror::Error)]
#[error("disk on fire")]
struct FakeError;

/// Keeps only the ledger and the list of events it committed.
#[derive(Default)]
struct FakeStore {
  ledger:  Mutex<HashSet<Offset>>,
  applied: Mutex<Vec<Offset>>,
  fail_at: Mutex<Option<Offset>>,
}

impl MirrorStore for FakeStore {
  type Error = FakeError;

  async fn apply_event(&self, event: &MirrorEvent) -> Result<ApplyOutcome, FakeError> {
    if *self.fail_at.lock().unwrap() == Some(event.offset) {
      return Err(FakeError);
    }
    if !self.ledger.lock().unwrap().insert(event.offset) {
      return Ok(ApplyOutcome::AlreadyConsumed);
    }
    self.applied.lock().unwrap().push(event.offset);
    let applied = match event.op {
      EventOp::Create { .. } => Applied::Created { collection: event.collection(), id: event.offset },
      EventOp::Delete { collection } => Applied::SoftDeleted { collection },
    };
    Ok(ApplyOutcome::Applied(applied))
  }

  async fn create_post(&self, _: NewPost) -> Result<Post, FakeError> { unimplemented!() }
  async fn create_comment(&self, _: NewComment) -> Result<Comment, FakeError> { unimplemented!() }
  async fn create_vote(&self, _: NewVote) -> Result<Vote, FakeError> { unimplemented!() }
  async fn soft_delete_post(&self, _: &Did, _: &Rkey) -> Result<bool, FakeError> { unimplemented!() }
  async fn soft_delete_comment(&self, _: &Did, _: &Rkey) -> Result<bool, FakeError> { unimplemented!() }
  async fn soft_delete_vote(&self, _: &Did, _: &Rkey) -> Result<bool, FakeError> { unimplemented!() }
  async fn record_offset(&self, _: Offset) -> Result<(), FakeError> { unimplemented!() }
  async fn is_consumed(&self, o: Offset) -> Result<bool, FakeError> { Ok(self.ledger.lock().unwrap().contains(&o)) }
  async fn get_post(&self, _: &Did, _: &Rkey, _: &ViewerContext) -> Result<Option<PostView>, FakeError> { unimplemented!() }
  async fn get_user_posts(&self, _: &Did, _: &ViewerContext) -> Result<Vec<PostView>, FakeError> { unimplemented!() }
  async fn get_post_comments(&self, _: &Did, _: &Rkey) -> Result<Vec<CommentView>, FakeError> { unimplemented!() }
  async fn get_user_counts(&self, _: &Did) -> Result<UserCounts, FakeError> { unimplemented!() }
  async fn live_posts(&self, _: &ViewerContext) -> Result<Vec<PostView>, FakeError> { unimplemented!() }
}

#[derive(Default)]
struct RecordingSink {
  fail:  bool,
  stall: bool,
  seen:  Mutex<Vec<PostCreated>>,
}

impl NotificationSink for RecordingSink {
  type Error = FakeError;

  async fn post_created(&self, event: &PostCreated) -> Result<(), FakeError> {
    self.seen.lock().unwrap().push(event.clone());
    if self.stall {
      std::future::pending::<()>().await;
    }
    if self.fail { Err(FakeError) } else { Ok(()) }
  }
}

fn post_event(offset: Offset, rkey: &str) -> RawEvent {
  serde_json::from_value(json!({
    "offset": offset,
    "type": "create",
    "collection": "fyi.frontpage.post",
    "authorDid": "did:plc:abc123",
    "rkey": rkey,
    "cid": "bafyreia",
    "record": { "title": "A post", "url": "https://example.com", "createdAt": "2024-05-01T00:00:00Z" }
  }))
  .unwrap()
}

fn delete_event(offset: Offset, rkey: &str) -> RawEvent {
  serde_json::from_value(json!({
    "offset": offset,
    "type": "delete",
    "collection": "fyi.frontpage.post",
    "authorDid": "did:plc:abc123",
    "rkey": rkey
  }))
  .unwrap()
}

fn consumer(
  store: &Arc<FakeStore>,
  sink: &Arc<RecordingSink>,
) -> OffsetConsumer<FakeStore, RecordingSink> {
  OffsetConsumer::new(Arc::clone(store), Arc::clone(sink))
}

#[tokio::test]
async fn batch_is_applied_in_offset_order() {
  let store = Arc::new(FakeStore::default());
  let sink = Arc::new(RecordingSink::default());
  let mut c = consumer(&store, &sink);

  let report = c
    .process_batch(vec![delete_event(3, "a"), post_event(1, "a"), post_event(2, "b")])
    .await;

  assert!(report.halted.is_none());
  assert_eq!(*store.applied.lock().unwrap(), vec![1, 2, 3]);
  assert_eq!(c.last_offset(), Some(3));
}

#[tokio::test]
async fn redelivery_is_skipped_and_notifies_once() {
  let store = Arc::new(FakeStore::default());
  let sink = Arc::new(RecordingSink::default());
  let mut c = consumer(&store, &sink);

  c.process_batch(vec![post_event(7, "a")]).await;
  let report = c.process_batch(vec![post_event(7, "a")]).await;
  c.flush_notifications().await;

  assert_eq!(report.outcomes.len(), 1);
  assert_eq!(report.outcomes[0].outcome, ApplyOutcome::AlreadyConsumed);
  assert_eq!(store.applied.lock().unwrap().len(), 1);
  assert_eq!(sink.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_event_is_reported_and_later_offsets_still_apply() {
  let store = Arc::new(FakeStore::default());
  let sink = Arc::new(RecordingSink::default());
  let mut c = consumer(&store, &sink);

  let mut bad = post_event(2, "b");
  bad.record = None;

  let report = c.process_batch(vec![post_event(1, "a"), bad.clone(), post_event(3, "c")]).await;

  assert!(report.halted.is_none());
  assert_eq!(report.outcomes.len(), 3);
  assert_eq!(report.outcomes[1].offset, 2);
  assert!(matches!(
    report.outcomes[1].outcome,
    ApplyOutcome::Rejected(Rejection::Malformed { ref detail }) if detail.contains("record")
  ));
  assert_eq!(*store.applied.lock().unwrap(), vec![1, 3]);

  // Redelivery of the same batch does not wedge on the bad event either.
  let again = c.process_batch(vec![post_event(1, "a"), bad, post_event(3, "c")]).await;
  assert!(again.halted.is_none());
  assert!(matches!(again.outcomes[1].outcome, ApplyOutcome::Rejected(Rejection::Malformed { .. })));
  assert_eq!(again.outcomes[2].outcome, ApplyOutcome::AlreadyConsumed);
}

#[tokio::test]
async fn unreadable_element_is_rejected_at_its_offset() {
  let store = Arc::new(FakeStore::default());
  let sink = Arc::new(RecordingSink::default());
  let mut c = consumer(&store, &sink);

  let unreadable = Delivered::from_value(json!({ "offset": 2, "type": "update" })).unwrap();
  let batch = vec![Delivered::from(post_event(3, "c")), unreadable, Delivered::from(post_event(1, "a"))];
  let report = c.process_batch(batch).await;

  let offsets: Vec<_> = report.outcomes.iter().map(|o| o.offset).collect();
  assert_eq!(offsets, vec![1, 2, 3]);
  assert!(matches!(report.outcomes[1].outcome, ApplyOutcome::Rejected(Rejection::Malformed { .. })));
  assert_eq!(*store.applied.lock().unwrap(), vec![1, 3]);
}

#[tokio::test]
async fn fatal_failure_leaves_offset_unconsumed_for_retry() {
  let store = Arc::new(FakeStore::default());
  let sink = Arc::new(RecordingSink::default());
  let mut c = consumer(&store, &sink);

  *store.fail_at.lock().unwrap() = Some(2);
  let report = c.process_batch(vec![post_event(1, "a"), post_event(2, "b"), post_event(3, "c")]).await;

  assert!(matches!(report.halted, Some(Halt::Fatal { offset: 2, .. })));
  assert!(!store.is_consumed(2).await.unwrap());
  assert!(!store.is_consumed(3).await.unwrap());

  *store.fail_at.lock().unwrap() = None;
  let retry = c.process_batch(vec![post_event(2, "b"), post_event(3, "c")]).await;
  assert!(retry.halted.is_none());
  assert_eq!(*store.applied.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn sink_failure_does_not_change_the_outcome() {
  let store = Arc::new(FakeStore::default());
  let sink = Arc::new(RecordingSink { fail: true, ..Default::default() });
  let mut c = consumer(&store, &sink);

  let report = c.process_batch(vec![post_event(1, "a")]).await;
  c.flush_notifications().await;

  assert!(report.halted.is_none());
  assert!(matches!(
    report.outcomes[0].outcome,
    ApplyOutcome::Applied(Applied::Created { collection: Collection::Post, .. })
  ));
  assert!(store.is_consumed(1).await.unwrap());
  assert_eq!(sink.seen.lock().unwrap()[0].uri.to_string(), "at://did:plc:abc123/fyi.frontpage.post/a");
}

#[tokio::test]
async fn deletes_do_not_notify() {
  let store = Arc::new(FakeStore::default());
  let sink = Arc::new(RecordingSink::default());
  let mut c = consumer(&store, &sink);

  c.process_batch(vec![delete_event(1, "a")]).await;
  c.flush_notifications().await;
  assert!(sink.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stalled_sink_does_not_hold_up_ingestion() {
  let store = Arc::new(FakeStore::default());
  let sink = Arc::new(RecordingSink { stall: true, ..Default::default() });
  let mut c = consumer(&store, &sink);

  let report = tokio::time::timeout(
    std::time::Duration::from_secs(5),
    c.process_batch(vec![post_event(1, "a"), post_event(2, "b")]),
  )
  .await
  .expect("batch finished while notifications were stalled");

  assert!(report.halted.is_none());
  assert_eq!(*store.applied.lock().unwrap(), vec![1, 2]);
}
