//! Outbound notifications fired after a post is mirrored.
//!
//! Delivery is best-effort. A failing sink is logged by the consumer and
//! never affects the mirror.

use std::{convert::Infallible, future::Future};

use serde::Serialize;

use crate::ident::{AtUri, Did};

/// Payload handed to a sink when a new post has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostCreated {
  pub uri:        AtUri,
  pub author_did: Did,
  pub title:      String,
  pub url:        String,
}

pub trait NotificationSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn post_created<'a>(
    &'a self,
    event: &'a PostCreated,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// A sink that drops everything; used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
  type Error = Infallible;

  async fn post_created(&self, _event: &PostCreated) -> Result<(), Infallible> { Ok(()) }
}
