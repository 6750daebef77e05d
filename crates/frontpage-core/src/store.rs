//! The `MirrorStore` trait and the outcome types of applying a feed event.
//!
//! The trait is implemented by storage backends (e.g.
//! `frontpage-store-sqlite`). The consumer and the read API depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  event::{MirrorEvent, Offset},
  ident::{AtUri, Did, Rkey},
  mirror::{
    Comment, CommentView, NewComment, NewPost, NewVote, Post, PostView, RankedPost, RowId,
    UserCounts, ViewerContext, Vote,
  },
  ranking,
  record::Collection,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What a committed unit of work did to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Applied {
  Created { collection: Collection, id: RowId },
  /// A live record was flipped to `deleted`.
  SoftDeleted { collection: Collection },
  /// The delete matched no live record; only the offset was recorded.
  NothingToDelete { collection: Collection },
}

/// Why an event's unit of work was aborted or never started. Nothing was
/// written, including the offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
  /// A record with the same `(author_did, rkey)` already exists, or, for votes,
  /// the author already has a live vote on the post.
  DuplicateKey,
  /// The post a comment or vote references is not in the mirror.
  MissingSubject { uri: AtUri },
  /// The payload failed validation at the ingestion boundary.
  Malformed { detail: String },
}

/// Result of [`MirrorStore::apply_event`]. Fatal storage failures are the
/// `Err` side of the surrounding `Result`, never an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
  Applied(Applied),
  /// The offset was already in the ledger; the event was skipped whole.
  AlreadyConsumed,
  Rejected(Rejection),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a mirror backend.
///
/// Rows are never physically removed. Deletes are status transitions and are
/// idempotent; creates are unique per `(author_did, rkey)`.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait MirrorStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Creates ───────────────────────────────────────────────────────────

  /// Insert a post. Fails with a duplicate-key error if `(author_did, rkey)`
  /// is already mirrored, whatever its status.
  fn create_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  /// Insert a comment under an already-mirrored post.
  fn create_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// Insert a vote on an already-mirrored post.
  fn create_vote(
    &self,
    input: NewVote,
  ) -> impl Future<Output = Result<Vote, Self::Error>> + Send + '_;

  // ── Soft deletes ──────────────────────────────────────────────────────

  /// Flip a post to `deleted`. Returns `false` when there was no live post to
  /// flip; that is not an error.
  fn soft_delete_post<'a>(
    &'a self,
    author_did: &'a Did,
    rkey: &'a Rkey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn soft_delete_comment<'a>(
    &'a self,
    author_did: &'a Did,
    rkey: &'a Rkey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn soft_delete_vote<'a>(
    &'a self,
    author_did: &'a Did,
    rkey: &'a Rkey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Offset ledger ─────────────────────────────────────────────────────

  /// Record `offset` as consumed. Fails with an already-consumed error if it
  /// is in the ledger.
  fn record_offset(
    &self,
    offset: Offset,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn is_consumed(
    &self,
    offset: Offset,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Apply one event as a single atomic unit of work: the mutation and the
  /// ledger row for its offset commit together or not at all.
  fn apply_event<'a>(
    &'a self,
    event: &'a MirrorEvent,
  ) -> impl Future<Output = Result<ApplyOutcome, Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// A single post by key, whatever its status.
  fn get_post<'a>(
    &'a self,
    author_did: &'a Did,
    rkey: &'a Rkey,
    ctx: &'a ViewerContext,
  ) -> impl Future<Output = Result<Option<PostView>, Self::Error>> + Send + 'a;

  /// All live posts by one author, newest first.
  fn get_user_posts<'a>(
    &'a self,
    author_did: &'a Did,
    ctx: &'a ViewerContext,
  ) -> impl Future<Output = Result<Vec<PostView>, Self::Error>> + Send + 'a;

  /// Live comments on a post, oldest first.
  fn get_post_comments<'a>(
    &'a self,
    author_did: &'a Did,
    rkey: &'a Rkey,
  ) -> impl Future<Output = Result<Vec<CommentView>, Self::Error>> + Send + 'a;

  fn get_user_counts<'a>(
    &'a self,
    author_did: &'a Did,
  ) -> impl Future<Output = Result<UserCounts, Self::Error>> + Send + 'a;

  /// Every live post with its aggregates, in insertion order.
  fn live_posts<'a>(
    &'a self,
    ctx: &'a ViewerContext,
  ) -> impl Future<Output = Result<Vec<PostView>, Self::Error>> + Send + 'a;

  /// The ranked front page as of `now`. Scores are computed per call.
  fn front_page<'a>(
    &'a self,
    now: DateTime<Utc>,
    limit: usize,
    ctx: &'a ViewerContext,
  ) -> impl Future<Output = Result<Vec<RankedPost>, Self::Error>> + Send + 'a {
    async move {
      let views = self.live_posts(ctx).await?;
      Ok(ranking::rank(views, now, Some(limit)))
    }
  }
}
