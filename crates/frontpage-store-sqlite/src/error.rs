//! Error type for `frontpage-store-sqlite`.

use frontpage_core::{
  event::Offset,
  ident::{AtUri, Did, Rkey},
  record::Collection,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] frontpage_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown record status: {0:?}")]
  UnknownStatus(String),

  /// `(author_did, rkey)` is already mirrored in `collection`, or a second
  /// live vote by the same author targets the same post.
  #[error("{collection} {author_did}/{rkey} already exists")]
  DuplicateKey {
    collection: Collection,
    author_did: Did,
    rkey:       Rkey,
  },

  #[error("offset {0} already consumed")]
  AlreadyConsumed(Offset),

  /// A comment or vote referenced a post that is not mirrored.
  #[error("subject not found: {0}")]
  SubjectNotFound(AtUri),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
