//! Identifier types: DIDs, handles, record keys and `at://` URIs.
//!
//! Everything that crosses the ingestion boundary as a string is parsed into
//! one of these before it reaches the mirror.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, record::Collection};

// ─── Did ─────────────────────────────────────────────────────────────────────

/// A syntactically valid Decentralized Identifier, e.g. `did:plc:abc123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
  pub fn parse(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidDid(s.to_owned());

    let rest = s.strip_prefix("did:").ok_or_else(invalid)?;
    let (method, id) = rest.split_once(':').ok_or_else(invalid)?;

    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_lowercase()) {
      return Err(invalid());
    }
    if id.is_empty()
      || id.ends_with(':')
      || !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"._:%-".contains(&b))
    {
      return Err(invalid());
    }
    if s.len() > 2048 {
      return Err(invalid());
    }
    Ok(Self(s.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The DID method, e.g. `plc` or `web`.
  pub fn method(&self) -> &str {
    self.0["did:".len()..].split(':').next().unwrap_or_default()
  }

  /// Everything after `did:<method>:`.
  pub fn method_specific_id(&self) -> &str {
    let rest = &self.0["did:".len()..];
    rest.split_once(':').map(|(_, id)| id).unwrap_or_default()
  }
}

impl fmt::Display for Did {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for Did {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for Did {
  type Error = Error;
  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<Did> for String {
  fn from(d: Did) -> Self { d.0 }
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// A domain-name handle such as `alice.example`. Always stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
  pub fn parse(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidHandle(s.to_owned());
    let normalized = s.trim_start_matches('@').to_ascii_lowercase();

    if normalized.len() > 253 {
      return Err(invalid());
    }
    let labels: Vec<&str> = normalized.split('.').collect();
    if labels.len() < 2 {
      return Err(invalid());
    }
    for label in &labels {
      if label.is_empty()
        || label.len() > 63
        || label.starts_with('-')
        || label.ends_with('-')
        || !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
      {
        return Err(invalid());
      }
    }
    // The TLD may not start with a digit.
    if labels
      .last()
      .is_some_and(|tld| tld.starts_with(|c: char| c.is_ascii_digit()))
    {
      return Err(invalid());
    }
    Ok(Self(normalized))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Handle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for Handle {
  type Error = Error;
  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<Handle> for String {
  fn from(h: Handle) -> Self { h.0 }
}

// ─── Identifier ──────────────────────────────────────────────────────────────

/// Anything a human may type to name an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
  Did(Did),
  Handle(Handle),
}

impl Identifier {
  pub fn parse(s: &str) -> Result<Self> {
    let s = s.trim();
    if s.starts_with("did:") {
      Ok(Self::Did(Did::parse(s)?))
    } else {
      Ok(Self::Handle(Handle::parse(s)?))
    }
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Did(d) => d.fmt(f),
      Self::Handle(h) => h.fmt(f),
    }
  }
}

impl FromStr for Identifier {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

// ─── Rkey ────────────────────────────────────────────────────────────────────

/// A record key, unique per collection within one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rkey(String);

impl Rkey {
  pub fn parse(s: &str) -> Result<Self> {
    let ok = !s.is_empty()
      && s.len() <= 512
      && s != "."
      && s != ".."
      && s
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"._:~-".contains(&b));
    if ok {
      Ok(Self(s.to_owned()))
    } else {
      Err(Error::InvalidRkey(s.to_owned()))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Rkey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for Rkey {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for Rkey {
  type Error = Error;
  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<Rkey> for String {
  fn from(r: Rkey) -> Self { r.0 }
}

// ─── AtUri ───────────────────────────────────────────────────────────────────

/// `at://<did>/<collection>/<rkey>`, the address of one mirrored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtUri {
  pub did:        Did,
  pub collection: Collection,
  pub rkey:       Rkey,
}

impl AtUri {
  pub fn new(did: Did, collection: Collection, rkey: Rkey) -> Self {
    Self { did, collection, rkey }
  }

  pub fn parse(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidAtUri(s.to_owned());
    let rest = s.strip_prefix("at://").ok_or_else(invalid)?;
    let mut parts = rest.splitn(3, '/');

    let did = parts.next().ok_or_else(invalid)?;
    let collection = parts.next().ok_or_else(invalid)?;
    let rkey = parts.next().ok_or_else(invalid)?;

    Ok(Self {
      did:        Did::parse(did).map_err(|_| invalid())?,
      collection: collection.parse().map_err(|_| invalid())?,
      rkey:       Rkey::parse(rkey).map_err(|_| invalid())?,
    })
  }
}

impl fmt::Display for AtUri {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "at://{}/{}/{}", self.did, self.collection, self.rkey)
  }
}

impl FromStr for AtUri {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl Serialize for AtUri {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for AtUri {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let s = String::deserialize(d)?;
    AtUri::parse(&s).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn did_parses_plc_and_web() {
    let plc = Did::parse("did:plc:abc123").unwrap();
    assert_eq!(plc.method(), "plc");
    assert_eq!(plc.method_specific_id(), "abc123");

    let web = Did::parse("did:web:example.com:user:alice").unwrap();
    assert_eq!(web.method(), "web");
    assert_eq!(web.method_specific_id(), "example.com:user:alice");
  }

  #[test]
  fn did_rejects_malformed() {
    for bad in ["", "did:", "did:plc", "did:plc:", "DID:plc:abc", "did:PLC:abc", "did:plc:a b", "did:plc:abc:"] {
      assert!(Did::parse(bad).is_err(), "accepted {bad:?}");
    }
  }

  #[test]
  fn handle_is_lowercased_and_validated() {
    let h = Handle::parse("@Alice.Example").unwrap();
    assert_eq!(h.as_str(), "alice.example");

    for bad in ["alice", "alice..example", "-alice.example", "alice.1com", "al ice.example"] {
      assert!(Handle::parse(bad).is_err(), "accepted {bad:?}");
    }
  }

  #[test]
  fn identifier_dispatches_on_prefix() {
    assert!(matches!(Identifier::parse("did:plc:abc123").unwrap(), Identifier::Did(_)));
    assert!(matches!(Identifier::parse("alice.example").unwrap(), Identifier::Handle(_)));
    assert!(Identifier::parse("did:nope").is_err());
  }

  #[test]
  fn rkey_rejects_dot_segments() {
    assert!(Rkey::parse("3k2x").is_ok());
    assert!(Rkey::parse(".").is_err());
    assert!(Rkey::parse("..").is_err());
    assert!(Rkey::parse("a/b").is_err());
  }

  #[test]
  fn at_uri_parses_and_displays() {
    let raw = "at://did:plc:abc123/fyi.frontpage.post/3k2x";
    let uri = AtUri::parse(raw).unwrap();
    assert_eq!(uri.did.as_str(), "did:plc:abc123");
    assert_eq!(uri.collection, Collection::Post);
    assert_eq!(uri.rkey.as_str(), "3k2x");
    assert_eq!(uri.to_string(), raw);
  }

  #[test]
  fn at_uri_rejects_unknown_collection() {
    assert!(AtUri::parse("at://did:plc:abc123/app.bsky.feed.post/3k2x").is_err());
    assert!(AtUri::parse("https://did:plc:abc123/fyi.frontpage.post/3k2x").is_err());
  }
}
