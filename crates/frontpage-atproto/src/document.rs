//! DID documents and PDS endpoint extraction.

use frontpage_core::ident::{Did, Handle};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Service `type` that marks a Personal Data Server.
pub const PDS_SERVICE_TYPE: &str = "AtprotoPersonalDataServer";

/// Conventional fragment id of the PDS service entry.
pub const PDS_SERVICE_ID: &str = "#atproto_pds";

/// The subset of a DID document this mirror reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
  pub id:            Did,
  #[serde(default)]
  pub also_known_as: Vec<String>,
  #[serde(default)]
  pub service:       Vec<Service>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
  pub id:               String,
  #[serde(rename = "type")]
  pub kind:             String,
  /// Usually a URL string; DID-core also allows maps and sets.
  pub service_endpoint: serde_json::Value,
}

impl DidDocument {
  /// Handles claimed through `at://` entries in `alsoKnownAs`.
  pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
    self
      .also_known_as
      .iter()
      .filter_map(|aka| aka.strip_prefix("at://"))
      .filter_map(|h| Handle::parse(h).ok())
  }

  /// The first claimed handle, if any.
  pub fn handle(&self) -> Option<Handle> { self.handles().next() }

  pub fn claims_handle(&self, handle: &Handle) -> bool { self.handles().any(|h| &h == handle) }
}

/// Scan `doc` for its PDS service and return the endpoint.
///
/// An entry with the conventional `#atproto_pds` id wins over any other entry
/// of the PDS type. Endpoints that are not absolute http(s) URLs are skipped.
pub fn get_pds_endpoint(doc: &DidDocument) -> Option<Url> {
  let candidates = doc
    .service
    .iter()
    .filter(|s| s.kind == PDS_SERVICE_TYPE)
    .filter_map(|s| {
      let url = Url::parse(s.service_endpoint.as_str()?).ok()?;
      matches!(url.scheme(), "http" | "https").then_some((s, url))
    });

  let mut fallback = None;
  for (service, url) in candidates {
    if service.id == PDS_SERVICE_ID || service.id.ends_with(PDS_SERVICE_ID) {
      return Some(url);
    }
    fallback.get_or_insert(url);
  }
  fallback
}
