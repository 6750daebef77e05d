//! Handlers for the front page and `/posts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/front-page` | Optional `?limit=<n>` |
//! | `GET`  | `/posts/{did}/{rkey}` | Any status; 404 if never mirrored |
//! | `GET`  | `/posts/{did}/{rkey}/comments` | Live comments, oldest first |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::Utc;
use frontpage_core::{
  ident::{Did, Rkey},
  mirror::{CommentView, PostView, RankedPost, ViewerContext},
  store::MirrorStore,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError, viewer::Viewer};

/// Hard cap on `?limit=`.
pub const MAX_FRONT_PAGE_LIMIT: usize = 500;

fn post_key(did: &str, rkey: &str) -> Result<(Did, Rkey), ApiError> {
  Ok((Did::parse(did)?, Rkey::parse(rkey)?))
}

// ─── Front page ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FrontPageParams {
  pub limit: Option<usize>,
}

/// `GET /front-page[?limit=<n>]`
pub async fn front_page<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<FrontPageParams>,
  Viewer(ctx): Viewer,
) -> Result<Json<Vec<RankedPost>>, ApiError>
where
  S: MirrorStore,
{
  let limit = params.limit.unwrap_or(state.front_page_limit);
  if limit == 0 || limit > MAX_FRONT_PAGE_LIMIT {
    return Err(ApiError::BadRequest(format!("limit must be 1..={MAX_FRONT_PAGE_LIMIT}")));
  }

  let ranked = state
    .store
    .front_page(Utc::now(), limit, &ctx)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ranked))
}

// ─── Single post ─────────────────────────────────────────────────────────────

/// `GET /posts/{did}/{rkey}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path((did, rkey)): Path<(String, String)>,
  Viewer(ctx): Viewer,
) -> Result<Json<PostView>, ApiError>
where
  S: MirrorStore,
{
  let (did, rkey) = post_key(&did, &rkey)?;
  let view = state
    .store
    .get_post(&did, &rkey, &ctx)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("post {did}/{rkey} not found")))?;
  Ok(Json(view))
}

/// `GET /posts/{did}/{rkey}/comments`
pub async fn comments<S>(
  State(state): State<ApiState<S>>,
  Path((did, rkey)): Path<(String, String)>,
) -> Result<Json<Vec<CommentView>>, ApiError>
where
  S: MirrorStore,
{
  let (did, rkey) = post_key(&did, &rkey)?;
  let anonymous = ViewerContext::anonymous();
  if state.store.get_post(&did, &rkey, &anonymous).await.map_err(ApiError::store)?.is_none() {
    return Err(ApiError::NotFound(format!("post {did}/{rkey} not found")));
  }

  let comments = state
    .store
    .get_post_comments(&did, &rkey)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(comments))
}
