//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  /// An element of a hook batch carried no integer offset.
  #[error("event {index} is malformed: {reason}")]
  MalformedEvent { index: usize, reason: String },

  #[error(transparent)]
  Identity(#[from] frontpage_atproto::Error),

  /// A collaborator could not be built from configuration.
  #[error("startup failed: {0}")]
  Startup(String),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    use frontpage_atproto::Error as Atproto;

    match self {
      Error::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Bearer realm=\"frontpage\""),
        );
        res
      }
      Error::MalformedEvent { index, reason } => (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": format!("event {index} is malformed: {reason}"), "index": index })),
      )
        .into_response(),
      Error::Identity(e) => {
        let status = match &e {
          Atproto::InvalidIdentifier(_) | Atproto::Resolution { .. } => StatusCode::NOT_FOUND,
          Atproto::NoPdsFound(_) | Atproto::RepoFetch { .. } | Atproto::Http(_) => {
            StatusCode::BAD_GATEWAY
          }
        };
        (status, Json(json!({ "error": e.to_string() }))).into_response()
      }
      Error::Startup(msg) => {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg }))).into_response()
      }
    }
  }
}
