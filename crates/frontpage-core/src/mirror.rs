//! Mirrored entities and the read models derived from them.
//!
//! A row here is the local copy of one create event. The only mutation a row
//! ever sees afterwards is its [`RecordStatus`] flipping to `deleted`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  ident::{AtUri, Did, Rkey},
  record::{Collection, CommentRecord, PostRecord, RecordStatus, VoteRecord},
};

/// Local row id; stable for the lifetime of the mirror.
pub type RowId = i64;

// ─── Stored rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
  pub id:         RowId,
  pub author_did: Did,
  pub rkey:       Rkey,
  pub cid:        String,
  pub title:      String,
  pub url:        String,
  /// Author-claimed creation time.
  pub created_at: DateTime<Utc>,
  pub status:     RecordStatus,
}

impl Post {
  pub fn uri(&self) -> AtUri {
    AtUri::new(self.author_did.clone(), Collection::Post, self.rkey.clone())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id:         RowId,
  pub post_id:    RowId,
  pub author_did: Did,
  pub rkey:       Rkey,
  pub cid:        String,
  pub content:    String,
  pub created_at: DateTime<Utc>,
  pub status:     RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
  pub id:         RowId,
  pub post_id:    RowId,
  pub author_did: Did,
  pub rkey:       Rkey,
  pub cid:        String,
  pub created_at: DateTime<Utc>,
  pub status:     RecordStatus,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::MirrorStore::create_post`].
#[derive(Debug, Clone)]
pub struct NewPost {
  pub author_did: Did,
  pub rkey:       Rkey,
  pub cid:        String,
  pub record:     PostRecord,
}

/// Input to [`crate::store::MirrorStore::create_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
  pub author_did: Did,
  pub rkey:       Rkey,
  pub cid:        String,
  pub record:     CommentRecord,
  /// The post this comment hangs off; must already be mirrored.
  pub post:       AtUri,
}

/// Input to [`crate::store::MirrorStore::create_vote`].
#[derive(Debug, Clone)]
pub struct NewVote {
  pub author_did: Did,
  pub rkey:       Rkey,
  pub cid:        String,
  pub record:     VoteRecord,
  /// The post being voted on; must already be mirrored.
  pub subject:    AtUri,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// Who is asking. Built once per request and passed to every read, so that
/// viewer-specific values never outlive the request that computed them.
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
  /// The authenticated caller, if any. Trusted as given.
  pub viewer: Option<Did>,
}

impl ViewerContext {
  pub fn anonymous() -> Self { Self::default() }

  pub fn for_viewer(did: Did) -> Self { Self { viewer: Some(did) } }
}

/// A post with its aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
  pub post:             Post,
  /// Live comments only.
  pub comment_count:    u64,
  /// Live votes, floored at 1.
  pub vote_count:       u64,
  pub viewer_has_voted: bool,
}

/// Floor applied to every vote count read out of the mirror so that the
/// ranking weight is never zero.
pub fn floored_vote_count(live_votes: u64) -> u64 { live_votes.max(1) }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
  pub comment: Comment,
  pub post:    AtUri,
}

/// Live-record totals for one author.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
  pub posts:    u64,
  pub comments: u64,
  pub votes:    u64,
}

/// One entry of the ranked front page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPost {
  #[serde(flatten)]
  pub view:  PostView,
  pub score: f64,
}
