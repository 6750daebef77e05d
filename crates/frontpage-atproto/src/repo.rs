//! Read-only client for a PDS repository.

use std::time::Duration;

use frontpage_core::ident::{Did, Handle};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Summary of a repository as reported by `com.atproto.repo.describeRepo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoDescription {
  pub handle:            Handle,
  pub did:               Did,
  /// NSIDs of every collection that currently holds records.
  #[serde(default)]
  pub collections:       Vec<String>,
  #[serde(default)]
  pub handle_is_correct: bool,
}

#[derive(Clone)]
pub struct RepoClient {
  http: Client,
}

impl RepoClient {
  pub fn new(timeout: Duration) -> Result<Self> {
    let http = Client::builder()
      .user_agent(concat!("frontpage/", env!("CARGO_PKG_VERSION")))
      .timeout(timeout)
      .build()?;
    Ok(Self { http })
  }

  /// Describe the repository `did` hosted at `pds`. Single attempt.
  pub async fn describe_repository(&self, pds: &Url, did: &Did) -> Result<RepoDescription> {
    let mut url = pds.join("xrpc/com.atproto.repo.describeRepo").map_err(|_| Error::RepoFetch {
      status: None,
      url:    pds.to_string(),
    })?;
    url.query_pairs_mut().append_pair("repo", did.as_str());
    debug!(%did, %url, "describing repository");

    let fetch_failed = |status: Option<u16>| Error::RepoFetch { status, url: url.to_string() };

    let resp = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| fetch_failed(e.status().map(|s| s.as_u16())))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(fetch_failed(Some(status.as_u16())));
    }

    resp.json().await.map_err(|_| fetch_failed(Some(status.as_u16())))
  }
}
