//! Per-request viewer extraction.

use axum::{extract::FromRequestParts, http::request::Parts};
use frontpage_core::{ident::Did, mirror::ViewerContext};

use crate::error::ApiError;

/// Header carrying the caller's DID, set by the authenticating proxy in front
/// of this API. Absent for anonymous readers.
pub const VIEWER_HEADER: &str = "x-frontpage-viewer";

/// The [`ViewerContext`] for the current request.
pub struct Viewer(pub ViewerContext);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let Some(value) = parts.headers.get(VIEWER_HEADER) else {
      return Ok(Viewer(ViewerContext::anonymous()));
    };
    let raw = value
      .to_str()
      .map_err(|_| ApiError::BadRequest(format!("{VIEWER_HEADER} is not valid text")))?;
    Ok(Viewer(ViewerContext::for_viewer(Did::parse(raw.trim())?)))
  }
}
