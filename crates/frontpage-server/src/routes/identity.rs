//! `GET /api/identity/{identifier}`: resolve an identity and describe its
//! repository.

use axum::{
  Json,
  extract::{Path, State},
};
use frontpage_core::{
  ident::{Did, Handle, Identifier},
  store::MirrorStore,
};
use serde::Serialize;
use tracing::debug;

use crate::{AppState, error::Error};

#[derive(Debug, Serialize)]
pub struct IdentityView {
  pub did:         Did,
  pub handle:      Option<Handle>,
  pub pds:         String,
  pub collections: Vec<String>,
}

pub async fn lookup<S>(
  State(state): State<AppState<S>>,
  Path(identifier): Path<String>,
) -> Result<Json<IdentityView>, Error>
where
  S: MirrorStore + 'static,
{
  let identifier = Identifier::parse(&identifier).map_err(frontpage_atproto::Error::from)?;
  let resolved = state.resolver.resolve_pds(&identifier).await?;
  debug!(%identifier, did = %resolved.did(), pds = %resolved.pds, "identity resolved");

  let description = state.repos.describe_repository(&resolved.pds, resolved.did()).await?;

  Ok(Json(IdentityView {
    did:         resolved.document.id.clone(),
    handle:      resolved.document.handle(),
    pds:         resolved.pds.to_string(),
    collections: description.collections,
  }))
}
