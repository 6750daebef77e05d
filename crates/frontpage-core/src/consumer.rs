//! The offset event consumer.
//!
//! Applies feed events to a [`MirrorStore`] one at a time, in offset order.
//! Each event is one atomic unit of work inside the store. The consumer orders
//! and validates events, reports what happened to each, and stops only when
//! the store itself fails.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::{
  Error,
  event::{Delivered, EventOp, MirrorEvent, Offset},
  ident::AtUri,
  notify::{NotificationSink, PostCreated},
  record::Record,
  store::{Applied, ApplyOutcome, MirrorStore, Rejection},
};

/// The store could not apply an event. The offset was not recorded, so the
/// same event must be delivered again.
#[derive(Debug, thiserror::Error)]
#[error("failed to apply event at offset {offset}: {source}")]
pub struct FatalError<E: std::error::Error + 'static> {
  pub offset: Offset,
  #[source]
  pub source: E,
}

/// Why a batch stopped before its last event.
#[derive(Debug, Serialize)]
#[serde(tag = "halt", rename_all = "snake_case")]
pub enum Halt {
  /// The store failed; this offset and everything after it await redelivery.
  Fatal { offset: Offset, reason: String },
}

/// Per-batch summary returned to the caller.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
  pub outcomes: Vec<EventReport>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub halted:   Option<Halt>,
}

#[derive(Debug, Serialize)]
pub struct EventReport {
  pub offset:  Offset,
  #[serde(flatten)]
  pub outcome: ApplyOutcome,
}

// ─── Consumer ────────────────────────────────────────────────────────────────

/// Single logical consumer for one feed. Methods take `&mut self`, so a shared
/// consumer must sit behind a lock, which keeps events strictly sequential.
pub struct OffsetConsumer<S, N> {
  store:       Arc<S>,
  sink:        Arc<N>,
  last_offset: Option<Offset>,
  /// Notifications still in flight. They never hold up the next event.
  pending:     JoinSet<()>,
}

impl<S, N> OffsetConsumer<S, N>
where
  S: MirrorStore,
  N: NotificationSink + 'static,
{
  pub fn new(store: Arc<S>, sink: Arc<N>) -> Self {
    Self { store, sink, last_offset: None, pending: JoinSet::new() }
  }

  /// Highest offset this consumer has seen committed or skipped.
  pub fn last_offset(&self) -> Option<Offset> { self.last_offset }

  /// Apply one validated event.
  pub async fn process(
    &mut self,
    event: &MirrorEvent,
  ) -> Result<ApplyOutcome, FatalError<S::Error>> {
    let offset = event.offset;
    if let Some(last) = self.last_offset
      && offset <= last
    {
      debug!(offset, last, "offset at or below last seen; ledger decides");
    }

    let outcome = match self.store.apply_event(event).await {
      Ok(outcome) => outcome,
      Err(source) => {
        error!(
          offset,
          did = %event.author_did,
          collection = %event.collection(),
          rkey = %event.rkey,
          error = %source,
          "store failure; offset not consumed"
        );
        return Err(FatalError { offset, source });
      }
    };

    match &outcome {
      ApplyOutcome::Applied(applied) => {
        info!(
          offset,
          did = %event.author_did,
          collection = %event.collection(),
          rkey = %event.rkey,
          ?applied,
          "event applied"
        );
        if let Applied::Created { .. } = applied {
          self.notify(event);
        }
      }
      ApplyOutcome::AlreadyConsumed => {
        debug!(offset, "offset already consumed; skipping");
      }
      ApplyOutcome::Rejected(rejection) => {
        warn!(
          offset,
          did = %event.author_did,
          collection = %event.collection(),
          rkey = %event.rkey,
          ?rejection,
          "event rejected"
        );
      }
    }

    self.last_offset = Some(self.last_offset.map_or(offset, |l| l.max(offset)));
    Ok(outcome)
  }

  /// Validate and apply a batch of delivered events in offset order.
  ///
  /// A malformed event is reported as rejected and the batch moves on. A
  /// fatal store failure stops the batch; nothing at or after that offset is
  /// applied.
  pub async fn process_batch<I>(&mut self, events: I) -> BatchReport
  where
    I: IntoIterator,
    I::Item: Into<Delivered>,
  {
    let mut events: Vec<Delivered> = events.into_iter().map(Into::into).collect();
    events.sort_by_key(Delivered::offset);
    let mut report = BatchReport::default();

    for delivered in events {
      let offset = delivered.offset();
      let parsed = match delivered {
        Delivered::Event(raw) => MirrorEvent::try_from(raw).map_err(|e| match e {
          Error::MalformedEvent { reason, .. } => reason,
          other => other.to_string(),
        }),
        Delivered::Unreadable { reason, .. } => Err(reason),
      };
      let event = match parsed {
        Ok(event) => event,
        Err(reason) => {
          warn!(offset, %reason, "malformed event rejected");
          let outcome = ApplyOutcome::Rejected(Rejection::Malformed { detail: reason });
          report.outcomes.push(EventReport { offset, outcome });
          continue;
        }
      };

      match self.process(&event).await {
        Ok(outcome) => report.outcomes.push(EventReport { offset, outcome }),
        Err(fatal) => {
          report.halted = Some(Halt::Fatal { offset, reason: fatal.source.to_string() });
          break;
        }
      }
    }

    report
  }

  /// Wait for every notification sent so far.
  pub async fn flush_notifications(&mut self) { while self.pending.join_next().await.is_some() {} }

  fn notify(&mut self, event: &MirrorEvent) {
    let EventOp::Create { record: Record::Post(post), .. } = &event.op else {
      return;
    };
    while self.pending.try_join_next().is_some() {}

    let offset = event.offset;
    let note = PostCreated {
      uri:        AtUri::new(event.author_did.clone(), event.collection(), event.rkey.clone()),
      author_did: event.author_did.clone(),
      title:      post.title.clone(),
      url:        post.url.clone(),
    };
    let sink = Arc::clone(&self.sink);
    self.pending.spawn(async move {
      if let Err(e) = sink.post_created(&note).await {
        error!(offset, uri = %note.uri, error = %e, "notification failed");
      }
    });
  }
}

#[cfg(test)]
mod tests;
