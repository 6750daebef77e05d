//! Error types for `frontpage-core`.

use thiserror::Error;

use crate::record::Collection;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid DID: {0:?}")]
  InvalidDid(String),

  #[error("invalid handle: {0:?}")]
  InvalidHandle(String),

  #[error("invalid record key: {0:?}")]
  InvalidRkey(String),

  #[error("invalid at:// URI: {0:?}")]
  InvalidAtUri(String),

  #[error("unknown collection: {0:?}")]
  UnknownCollection(String),

  #[error("invalid {collection} record: {reason}")]
  InvalidRecord {
    collection: Collection,
    reason:     String,
  },

  #[error("malformed event at offset {offset}: {reason}")]
  MalformedEvent { offset: i64, reason: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
