//! Inbound feed events.
//!
//! [`RawEvent`] is the wire shape delivered by the feed. It is converted into a
//! [`MirrorEvent`] at the ingestion boundary; nothing past that point handles
//! untyped JSON.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  ident::{Did, Rkey},
  record::{Collection, Record},
};

/// Position of an event in the feed. Strictly increasing per deployment.
pub type Offset = i64;

// ─── Wire shape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
  Create,
  Delete,
}

/// One event exactly as the feed delivers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
  pub offset:     Offset,
  #[serde(rename = "type")]
  pub kind:       EventKind,
  pub collection: String,
  pub author_did: String,
  pub rkey:       String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cid:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub record:     Option<serde_json::Value>,
}

/// One element of a delivered batch, read as far as its offset.
#[derive(Debug, Clone)]
pub enum Delivered {
  Event(RawEvent),
  /// Carries an integer offset but not the event shape.
  Unreadable { offset: Offset, reason: String },
}

impl Delivered {
  /// Read one batch element. Fails only when there is no integer `offset`
  /// to report the element against.
  pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, String> {
    let offset = value.get("offset").and_then(serde_json::Value::as_i64);
    match (serde_json::from_value::<RawEvent>(value), offset) {
      (Ok(raw), _) => Ok(Self::Event(raw)),
      (Err(e), Some(offset)) => Ok(Self::Unreadable { offset, reason: e.to_string() }),
      (Err(e), None) => Err(e.to_string()),
    }
  }

  pub fn offset(&self) -> Offset {
    match self {
      Self::Event(raw) => raw.offset,
      Self::Unreadable { offset, .. } => *offset,
    }
  }
}

impl From<RawEvent> for Delivered {
  fn from(raw: RawEvent) -> Self { Self::Event(raw) }
}

// ─── Validated shape ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOp {
  Create { cid: String, record: Record },
  Delete { collection: Collection },
}

/// A validated, typed feed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEvent {
  pub offset:     Offset,
  pub author_did: Did,
  pub rkey:       Rkey,
  pub op:         EventOp,
}

impl MirrorEvent {
  pub fn collection(&self) -> Collection {
    match &self.op {
      EventOp::Create { record, .. } => record.collection(),
      EventOp::Delete { collection } => *collection,
    }
  }
}

impl TryFrom<RawEvent> for MirrorEvent {
  type Error = Error;

  fn try_from(raw: RawEvent) -> Result<Self> {
    let offset = raw.offset;
    let malformed = |reason: String| Error::MalformedEvent { offset, reason };

    if offset < 0 {
      return Err(malformed("offset must be non-negative".into()));
    }

    let collection: Collection = raw
      .collection
      .parse()
      .map_err(|_| malformed(Error::UnknownCollection(raw.collection.clone()).to_string()))?;
    let author_did = Did::parse(&raw.author_did).map_err(|e| malformed(e.to_string()))?;
    let rkey = Rkey::parse(&raw.rkey).map_err(|e| malformed(e.to_string()))?;

    let op = match raw.kind {
      EventKind::Create => {
        let cid = raw
          .cid
          .filter(|c| !c.is_empty())
          .ok_or_else(|| malformed("create without cid".into()))?;
        let value = raw
          .record
          .ok_or_else(|| malformed("create without record".into()))?;
        let record = Record::from_json(collection, value).map_err(|e| malformed(e.to_string()))?;
        EventOp::Create { cid, record }
      }
      EventKind::Delete => EventOp::Delete { collection },
    };

    Ok(Self { offset, author_did, rkey, op })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn raw(v: serde_json::Value) -> RawEvent { serde_json::from_value(v).unwrap() }

  #[test]
  fn create_event_validates_into_typed_record() {
    let ev = MirrorEvent::try_from(raw(json!({
      "offset": 10,
      "type": "create",
      "collection": "fyi.frontpage.post",
      "authorDid": "did:plc:abc123",
      "rkey": "3k2x",
      "cid": "bafyrei1",
      "record": { "title": "Hi", "url": "https://example.com", "createdAt": "2024-05-01T00:00:00Z" }
    })))
    .unwrap();

    assert_eq!(ev.offset, 10);
    assert_eq!(ev.collection(), Collection::Post);
    assert!(matches!(ev.op, EventOp::Create { ref cid, record: Record::Post(_) } if cid == "bafyrei1"));
  }

  #[test]
  fn delete_event_needs_no_record() {
    let ev = MirrorEvent::try_from(raw(json!({
      "offset": 11,
      "type": "delete",
      "collection": "fyi.frontpage.comment",
      "authorDid": "did:plc:abc123",
      "rkey": "3k2y"
    })))
    .unwrap();
    assert_eq!(ev.op, EventOp::Delete { collection: Collection::Comment });
  }

  #[test]
  fn create_without_record_is_malformed() {
    let err = MirrorEvent::try_from(raw(json!({
      "offset": 12,
      "type": "create",
      "collection": "fyi.frontpage.post",
      "authorDid": "did:plc:abc123",
      "rkey": "3k2x",
      "cid": "bafy"
    })))
    .unwrap_err();
    assert!(matches!(err, Error::MalformedEvent { offset: 12, .. }));
  }

  #[test]
  fn unknown_collection_and_bad_did_are_malformed() {
    let unknown = raw(json!({
      "offset": 1, "type": "delete", "collection": "app.bsky.feed.like",
      "authorDid": "did:plc:abc123", "rkey": "1"
    }));
    assert!(matches!(MirrorEvent::try_from(unknown), Err(Error::MalformedEvent { .. })));

    let bad_did = raw(json!({
      "offset": 2, "type": "delete", "collection": "fyi.frontpage.post",
      "authorDid": "alice", "rkey": "1"
    }));
    assert!(matches!(MirrorEvent::try_from(bad_did), Err(Error::MalformedEvent { .. })));
  }

  #[test]
  fn unknown_event_type_fails_to_deserialize() {
    let v = json!({
      "offset": 3, "type": "update", "collection": "fyi.frontpage.post",
      "authorDid": "did:plc:abc123", "rkey": "1"
    });
    assert!(serde_json::from_value::<RawEvent>(v.clone()).is_err());
    assert!(matches!(
      Delivered::from_value(v),
      Ok(Delivered::Unreadable { offset: 3, ref reason }) if reason.contains("update")
    ));
  }

  #[test]
  fn element_without_integer_offset_is_unreadable_outright() {
    assert!(Delivered::from_value(json!({ "offset": "two" })).is_err());
    assert!(Delivered::from_value(json!([1, 2])).is_err());

    let ok = Delivered::from_value(json!({
      "offset": 4, "type": "delete", "collection": "fyi.frontpage.vote",
      "authorDid": "did:plc:abc123", "rkey": "v1"
    }))
    .unwrap();
    assert!(matches!(ok, Delivered::Event(_)));
    assert_eq!(ok.offset(), 4);
  }
}
