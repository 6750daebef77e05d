//! Error type for `frontpage-atproto`.

use frontpage_core::ident::Did;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid identifier: {0}")]
  InvalidIdentifier(#[from] frontpage_core::Error),

  /// The identifier does not resolve: unknown handle, unreachable directory,
  /// unsupported DID method, or a document that fails validation.
  #[error("could not resolve {identifier}: {reason}")]
  Resolution { identifier: String, reason: String },

  /// The identity resolved but its document names no PDS.
  #[error("{0} has no PDS endpoint")]
  NoPdsFound(Did),

  #[error("repository fetch from {url} failed: {}", status_text(.status))]
  RepoFetch { status: Option<u16>, url: String },

  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),
}

fn status_text(status: &Option<u16>) -> String {
  match status {
    Some(code) => format!("status {code}"),
    None => "no response".to_owned(),
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
