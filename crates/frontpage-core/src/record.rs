//! Remote record schemas: the typed shape of what authors write to their
//! repositories.
//!
//! Payloads arrive as untyped JSON; [`Record::from_json`] validates them into
//! one of these before anything else sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, ident::AtUri};

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_COMMENT_LEN: usize = 10_000;

// ─── Collections ─────────────────────────────────────────────────────────────

/// The repository collections this mirror understands.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
pub enum Collection {
  #[strum(serialize = "fyi.frontpage.post")]
  #[serde(rename = "fyi.frontpage.post")]
  Post,
  #[strum(serialize = "fyi.frontpage.comment")]
  #[serde(rename = "fyi.frontpage.comment")]
  Comment,
  #[strum(serialize = "fyi.frontpage.vote")]
  #[serde(rename = "fyi.frontpage.vote")]
  Vote,
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// Mirrored records are never removed; a delete event only flips this.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
  #[default]
  Live,
  Deleted,
}

// ─── Record bodies ───────────────────────────────────────────────────────────

/// A pointer at a specific version of another record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
  pub uri: String,
  pub cid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
  pub title:      String,
  pub url:        String,
  /// Author-claimed; never replaced with ingestion time.
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
  pub content:    String,
  pub post:       StrongRef,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
  pub subject:    StrongRef,
  pub created_at: DateTime<Utc>,
}

/// A validated record of any supported collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
  Post(PostRecord),
  /// The comment together with the parsed address of the post it belongs to.
  Comment(CommentRecord, AtUri),
  /// The vote together with the parsed address of the post it targets.
  Vote(VoteRecord, AtUri),
}

impl Record {
  pub fn collection(&self) -> Collection {
    match self {
      Self::Post(_) => Collection::Post,
      Self::Comment(..) => Collection::Comment,
      Self::Vote(..) => Collection::Vote,
    }
  }

  /// Validate an untyped payload against the schema for `collection`.
  ///
  /// The payload may carry a `$type` field; if present it must name the same
  /// collection.
  pub fn from_json(collection: Collection, mut value: serde_json::Value) -> Result<Self> {
    if let Some(obj) = value.as_object_mut()
      && let Some(ty) = obj.remove("$type")
      && ty.as_str() != Some(collection.as_ref())
    {
      return Err(Error::InvalidRecord {
        collection,
        reason: format!("$type {ty} does not match collection"),
      });
    }

    let invalid = |reason: String| Error::InvalidRecord { collection, reason };

    match collection {
      Collection::Post => {
        let post: PostRecord =
          serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
        let title_len = post.title.trim().chars().count();
        if title_len == 0 || title_len > MAX_TITLE_LEN {
          return Err(invalid(format!("title must be 1..={MAX_TITLE_LEN} characters")));
        }
        if !(post.url.starts_with("https://") || post.url.starts_with("http://")) {
          return Err(invalid(format!("url {:?} is not http(s)", post.url)));
        }
        Ok(Self::Post(post))
      }
      Collection::Comment => {
        let comment: CommentRecord =
          serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
        let len = comment.content.trim().chars().count();
        if len == 0 || len > MAX_COMMENT_LEN {
          return Err(invalid(format!("content must be 1..={MAX_COMMENT_LEN} characters")));
        }
        let parent = post_ref(&comment.post).map_err(invalid)?;
        Ok(Self::Comment(comment, parent))
      }
      Collection::Vote => {
        let vote: VoteRecord =
          serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
        let subject = post_ref(&vote.subject).map_err(invalid)?;
        Ok(Self::Vote(vote, subject))
      }
    }
  }
}

fn post_ref(r: &StrongRef) -> std::result::Result<AtUri, String> {
  let uri = AtUri::parse(&r.uri).map_err(|e| e.to_string())?;
  if uri.collection != Collection::Post {
    return Err(format!("{uri} does not reference a post"));
  }
  Ok(uri)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn collection_nsids_roundtrip() {
    assert_eq!(Collection::Post.to_string(), "fyi.frontpage.post");
    assert_eq!("fyi.frontpage.vote".parse::<Collection>().unwrap(), Collection::Vote);
    assert!("app.bsky.feed.post".parse::<Collection>().is_err());
  }

  #[test]
  fn post_record_validates() {
    let rec = Record::from_json(
      Collection::Post,
      json!({
        "$type": "fyi.frontpage.post",
        "title": "Hello",
        "url": "https://example.com",
        "createdAt": "2024-05-01T12:00:00Z"
      }),
    )
    .unwrap();
    assert!(matches!(rec, Record::Post(ref p) if p.title == "Hello"));
  }

  #[test]
  fn extra_lexicon_fields_are_tolerated() {
    let rec = Record::from_json(
      Collection::Post,
      json!({
        "title": "Hello",
        "url": "https://example.com",
        "langs": ["en"],
        "createdAt": "2024-05-01T12:00:00Z"
      }),
    )
    .unwrap();
    assert!(matches!(rec, Record::Post(ref p) if p.url == "https://example.com"));

    let comment = json!({
      "content": "reply",
      "post": { "uri": "at://did:plc:abc/fyi.frontpage.post/1", "cid": "bafy" },
      "parent": { "uri": "at://did:plc:abc/fyi.frontpage.comment/2", "cid": "bafy2" },
      "createdAt": "2024-05-01T12:00:00Z"
    });
    assert!(Record::from_json(Collection::Comment, comment).is_ok());
  }

  #[test]
  fn post_record_rejects_bad_url_and_title() {
    let bad_url = json!({ "title": "t", "url": "ftp://x", "createdAt": "2024-05-01T12:00:00Z" });
    assert!(Record::from_json(Collection::Post, bad_url).is_err());

    let long_title = "x".repeat(MAX_TITLE_LEN + 1);
    let bad_title =
      json!({ "title": long_title, "url": "https://x.test", "createdAt": "2024-05-01T12:00:00Z" });
    assert!(Record::from_json(Collection::Post, bad_title).is_err());
  }

  #[test]
  fn mismatched_type_is_rejected() {
    let v = json!({
      "$type": "fyi.frontpage.comment",
      "title": "Hello",
      "url": "https://example.com",
      "createdAt": "2024-05-01T12:00:00Z"
    });
    assert!(matches!(
      Record::from_json(Collection::Post, v),
      Err(Error::InvalidRecord { collection: Collection::Post, .. })
    ));
  }

  #[test]
  fn vote_must_target_a_post() {
    let v = json!({
      "subject": { "uri": "at://did:plc:abc/fyi.frontpage.comment/1", "cid": "bafy" },
      "createdAt": "2024-05-01T12:00:00Z"
    });
    assert!(Record::from_json(Collection::Vote, v).is_err());

    let ok = json!({
      "subject": { "uri": "at://did:plc:abc/fyi.frontpage.post/1", "cid": "bafy" },
      "createdAt": "2024-05-01T12:00:00Z"
    });
    let rec = Record::from_json(Collection::Vote, ok).unwrap();
    assert!(matches!(rec, Record::Vote(_, ref uri) if uri.rkey.as_str() == "1"));
  }
}
