//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! precision, so that lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use frontpage_core::{
  ident::{AtUri, Did, Rkey},
  mirror::{Comment, CommentView, Post, PostView, floored_vote_count},
  record::{Collection, RecordStatus},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Drop anything finer than a microsecond, which is all a column keeps.
/// Values handed back from an insert go through this so they compare equal to
/// the same row read back.
pub fn stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  stored_precision(dt).to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── RecordStatus ────────────────────────────────────────────────────────────

pub fn encode_status(s: RecordStatus) -> &'static str {
  match s {
    RecordStatus::Live => "live",
    RecordStatus::Deleted => "deleted",
  }
}

pub fn decode_status(s: &str) -> Result<RecordStatus> {
  s.parse()
    .map_err(|_| Error::UnknownStatus(s.to_owned()))
}

// ─── Counts ──────────────────────────────────────────────────────────────────

/// SQLite hands back `COUNT(*)` as a signed integer.
pub fn decode_count(n: i64) -> u64 { u64::try_from(n).unwrap_or(0) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawPost`] field order, for a `posts` alias `p`.
pub const POST_COLUMNS: &str =
  "p.id, p.author_did, p.rkey, p.cid, p.title, p.url, p.created_at, p.status";

/// Raw strings read directly from a `posts` row.
pub struct RawPost {
  pub id:         i64,
  pub author_did: String,
  pub rkey:       String,
  pub cid:        String,
  pub title:      String,
  pub url:        String,
  pub created_at: String,
  pub status:     String,
}

impl RawPost {
  /// Read the first eight columns of `row` in [`POST_COLUMNS`] order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      author_did: row.get(1)?,
      rkey:       row.get(2)?,
      cid:        row.get(3)?,
      title:      row.get(4)?,
      url:        row.get(5)?,
      created_at: row.get(6)?,
      status:     row.get(7)?,
    })
  }

  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      id:         self.id,
      author_did: Did::parse(&self.author_did)?,
      rkey:       Rkey::parse(&self.rkey)?,
      cid:        self.cid,
      title:      self.title,
      url:        self.url,
      created_at: decode_dt(&self.created_at)?,
      status:     decode_status(&self.status)?,
    })
  }
}

/// A `posts` row plus its aggregate columns.
pub struct RawPostView {
  pub post:             RawPost,
  pub comment_count:    i64,
  pub live_votes:       i64,
  pub viewer_has_voted: bool,
}

impl RawPostView {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      post:             RawPost::from_row(row)?,
      comment_count:    row.get(8)?,
      live_votes:       row.get(9)?,
      viewer_has_voted: row.get(10)?,
    })
  }

  pub fn into_view(self) -> Result<PostView> {
    Ok(PostView {
      post:             self.post.into_post()?,
      comment_count:    decode_count(self.comment_count),
      vote_count:       floored_vote_count(decode_count(self.live_votes)),
      viewer_has_voted: self.viewer_has_voted,
    })
  }
}

pub struct RawComment {
  pub id:         i64,
  pub post_id:    i64,
  pub author_did: String,
  pub rkey:       String,
  pub cid:        String,
  pub content:    String,
  pub created_at: String,
  pub status:     String,
}

impl RawComment {
  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      id:         self.id,
      post_id:    self.post_id,
      author_did: Did::parse(&self.author_did)?,
      rkey:       Rkey::parse(&self.rkey)?,
      cid:        self.cid,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
      status:     decode_status(&self.status)?,
    })
  }
}

/// A comment joined with the key of the post it belongs to.
pub struct RawCommentView {
  pub comment:         RawComment,
  pub post_author_did: String,
  pub post_rkey:       String,
}

impl RawCommentView {
  pub fn into_view(self) -> Result<CommentView> {
    let post = AtUri::new(
      Did::parse(&self.post_author_did)?,
      Collection::Post,
      Rkey::parse(&self.post_rkey)?,
    );
    Ok(CommentView { comment: self.comment.into_comment()?, post })
  }
}
