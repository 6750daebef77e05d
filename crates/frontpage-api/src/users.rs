//! Handlers for `/users/{did}` endpoints.

use axum::{
  Json,
  extract::{Path, State},
};
use frontpage_core::{
  ident::Did,
  mirror::{PostView, UserCounts},
  store::MirrorStore,
};

use crate::{ApiState, error::ApiError, viewer::Viewer};

/// `GET /users/{did}/posts`: live posts, newest first.
pub async fn posts<S>(
  State(state): State<ApiState<S>>,
  Path(did): Path<String>,
  Viewer(ctx): Viewer,
) -> Result<Json<Vec<PostView>>, ApiError>
where
  S: MirrorStore,
{
  let did = Did::parse(&did)?;
  let posts = state
    .store
    .get_user_posts(&did, &ctx)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(posts))
}

/// `GET /users/{did}/counts`
pub async fn counts<S>(
  State(state): State<ApiState<S>>,
  Path(did): Path<String>,
) -> Result<Json<UserCounts>, ApiError>
where
  S: MirrorStore,
{
  let did = Did::parse(&did)?;
  let counts = state.store.get_user_counts(&did).await.map_err(ApiError::store)?;
  Ok(Json(counts))
}
