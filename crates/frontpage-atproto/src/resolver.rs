//! Identity resolution: handle → DID → DID document → PDS endpoint.
//!
//! The resolver is stateless per call. Caching, if wanted, is layered on top
//! by [`crate::cache::CachingResolver`].

use std::time::Duration;

use frontpage_core::ident::{Did, Handle, Identifier};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::{
  Error, Result,
  document::{DidDocument, get_pds_endpoint},
};

pub const DEFAULT_PLC_DIRECTORY: &str = "https://plc.directory";

/// Resolution settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
  /// Base URL of the `did:plc` directory.
  pub plc_directory:   String,
  /// Optional XRPC service answering `com.atproto.identity.resolveHandle`.
  /// When unset, handles resolve over `https://<handle>/.well-known/atproto-did`.
  pub handle_resolver: Option<String>,
  /// Upper bound on every outbound request.
  pub timeout:         Duration,
  pub user_agent:      String,
}

impl Default for ResolverConfig {
  fn default() -> Self {
    Self {
      plc_directory:   DEFAULT_PLC_DIRECTORY.to_owned(),
      handle_resolver: None,
      timeout:         Duration::from_secs(10),
      user_agent:      concat!("frontpage/", env!("CARGO_PKG_VERSION")).to_owned(),
    }
  }
}

/// A DID document together with the PDS it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
  pub document: DidDocument,
  pub pds:      Url,
}

impl ResolvedIdentity {
  pub fn did(&self) -> &Did { &self.document.id }
}

#[derive(Clone)]
pub struct IdentityResolver {
  http:   Client,
  config: ResolverConfig,
}

impl IdentityResolver {
  pub fn new(config: ResolverConfig) -> Result<Self> {
    let http = Client::builder()
      .user_agent(&config.user_agent)
      .timeout(config.timeout)
      .build()?;
    Ok(Self { http, config })
  }

  /// Resolve a handle or DID string to its DID document.
  pub async fn resolve_str(&self, identifier: &str) -> Result<DidDocument> {
    let identifier = Identifier::parse(identifier)?;
    self.resolve(&identifier).await
  }

  /// Resolve to a DID document. Handles must be confirmed by the document's
  /// `alsoKnownAs`.
  pub async fn resolve(&self, identifier: &Identifier) -> Result<DidDocument> {
    match identifier {
      Identifier::Did(did) => self.resolve_did(did).await,
      Identifier::Handle(handle) => {
        let did = self.resolve_handle(handle).await?;
        let doc = self.resolve_did(&did).await?;
        if !doc.claims_handle(handle) {
          return Err(Error::Resolution {
            identifier: handle.to_string(),
            reason:     format!("{did} does not claim this handle"),
          });
        }
        Ok(doc)
      }
    }
  }

  /// Resolve and require a PDS endpoint.
  pub async fn resolve_pds(&self, identifier: &Identifier) -> Result<ResolvedIdentity> {
    let document = self.resolve(identifier).await?;
    let pds = get_pds_endpoint(&document).ok_or_else(|| Error::NoPdsFound(document.id.clone()))?;
    Ok(ResolvedIdentity { document, pds })
  }

  pub async fn resolve_handle(&self, handle: &Handle) -> Result<Did> {
    let fail = |reason: String| Error::Resolution { identifier: handle.to_string(), reason };

    let raw = match &self.config.handle_resolver {
      Some(service) => {
        #[derive(Deserialize)]
        struct ResolveHandleResponse {
          did: String,
        }

        let url = format!(
          "{}/xrpc/com.atproto.identity.resolveHandle",
          service.trim_end_matches('/')
        );
        debug!(%handle, %url, "resolving handle via xrpc");
        let resp = self
          .http
          .get(&url)
          .query(&[("handle", handle.as_str())])
          .send()
          .await
          .map_err(|e| fail(format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
          return Err(fail(format!("GET {url} returned {}", resp.status())));
        }
        let body: ResolveHandleResponse =
          resp.json().await.map_err(|e| fail(format!("invalid response from {url}: {e}")))?;
        body.did
      }
      None => {
        let url = format!("https://{handle}/.well-known/atproto-did");
        debug!(%handle, %url, "resolving handle via well-known");
        let resp = self
          .http
          .get(&url)
          .send()
          .await
          .map_err(|e| fail(format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
          return Err(fail(format!("GET {url} returned {}", resp.status())));
        }
        let text = resp.text().await.map_err(|e| fail(format!("reading {url}: {e}")))?;
        text.trim().to_owned()
      }
    };

    Did::parse(&raw).map_err(|e| fail(e.to_string()))
  }

  /// Fetch the DID document for `did`. Supports `did:plc` and `did:web`.
  pub async fn resolve_did(&self, did: &Did) -> Result<DidDocument> {
    let fail = |reason: String| Error::Resolution { identifier: did.to_string(), reason };

    let url = self.document_url(did).map_err(fail)?;
    debug!(%did, %url, "fetching did document");

    let resp = self
      .http
      .get(&url)
      .send()
      .await
      .map_err(|e| fail(format!("GET {url}: {e}")))?;
    if !resp.status().is_success() {
      return Err(fail(format!("GET {url} returned {}", resp.status())));
    }

    let doc: DidDocument = resp
      .json()
      .await
      .map_err(|e| fail(format!("invalid DID document from {url}: {e}")))?;

    if &doc.id != did {
      return Err(fail(format!("document id {} does not match", doc.id)));
    }
    Ok(doc)
  }

  fn document_url(&self, did: &Did) -> std::result::Result<String, String> {
    match did.method() {
      "plc" => Ok(format!("{}/{did}", self.config.plc_directory.trim_end_matches('/'))),
      "web" => {
        // did:web:example.com             -> https://example.com/.well-known/did.json
        // did:web:example.com:user:alice  -> https://example.com/user/alice/did.json
        let mut parts = did.method_specific_id().split(':');
        let host = parts
          .next()
          .filter(|h| !h.is_empty())
          .ok_or_else(|| "missing host in did:web".to_owned())?
          .replace("%3A", ":");
        let path: Vec<&str> = parts.collect();
        if path.is_empty() {
          Ok(format!("https://{host}/.well-known/did.json"))
        } else {
          Ok(format!("https://{host}/{}/did.json", path.join("/")))
        }
      }
      other => Err(format!("unsupported DID method {other:?}")),
    }
  }
}
