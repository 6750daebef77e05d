//! Async HTTP client wrapping the frontpage read API.

use anyhow::{Context, Result, anyhow};
use frontpage_core::{
  ident::{Did, Rkey},
  mirror::{PostView, RankedPost},
};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Async HTTP client for the frontpage JSON API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
  }

  /// `GET /api/front-page[?limit=<n>]`
  pub async fn front_page(&self, limit: Option<usize>) -> Result<Vec<RankedPost>> {
    let mut req = self.client.get(self.url("/front-page"));
    if let Some(limit) = limit {
      req = req.query(&[("limit", limit)]);
    }
    let resp = req.send().await.context("GET /front-page failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /front-page → {}", resp.status()));
    }
    resp.json().await.context("deserialising front page")
  }

  /// `GET /api/posts/<did>/<rkey>`; `None` when the mirror has no such post.
  pub async fn post(&self, did: &Did, rkey: &Rkey) -> Result<Option<PostView>> {
    let path = format!("/posts/{did}/{rkey}");
    let resp = self
      .client
      .get(self.url(&path))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;

    match resp.status() {
      StatusCode::NOT_FOUND => Ok(None),
      s if s.is_success() => resp.json().await.map(Some).context("deserialising post"),
      s => Err(anyhow!("GET {path} → {s}")),
    }
  }
}
