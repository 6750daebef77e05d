//! Notification sinks wired up by the server.

use std::time::Duration;

use frontpage_core::notify::{NoopSink, NotificationSink, PostCreated};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("webhook request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("webhook returned status {0}")]
  Status(u16),
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
  #[serde(rename = "type")]
  kind: &'static str,
  #[serde(flatten)]
  post: &'a PostCreated,
}

/// POSTs a JSON message to a fixed URL for every newly mirrored post.
#[derive(Clone)]
pub struct WebhookSink {
  http: reqwest::Client,
  url:  String,
}

impl WebhookSink {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
    let http = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { http, url: url.into() })
  }
}

impl NotificationSink for WebhookSink {
  type Error = NotifyError;

  async fn post_created(&self, event: &PostCreated) -> Result<(), NotifyError> {
    let body = WebhookMessage { kind: "post_created", post: event };
    let resp = self.http.post(&self.url).json(&body).send().await?;
    if !resp.status().is_success() {
      return Err(NotifyError::Status(resp.status().as_u16()));
    }
    debug!(uri = %event.uri, "webhook delivered");
    Ok(())
  }
}

/// The sink chosen from configuration.
#[derive(Clone)]
pub enum Notifier {
  Disabled(NoopSink),
  Webhook(WebhookSink),
}

impl NotificationSink for Notifier {
  type Error = NotifyError;

  async fn post_created(&self, event: &PostCreated) -> Result<(), NotifyError> {
    match self {
      Notifier::Disabled(sink) => match sink.post_created(event).await {
        Ok(()) => Ok(()),
        Err(never) => match never {},
      },
      Notifier::Webhook(sink) => sink.post_created(event).await,
    }
  }
}
