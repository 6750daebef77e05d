//! HTTP server wiring for the Frontpage mirror.
//!
//! Combines the read API from `frontpage-api` with the ingestion hook and the
//! identity lookup route, over any [`MirrorStore`].

pub mod auth;
pub mod error;
pub mod notify;
pub mod routes;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use frontpage_atproto::{CachingResolver, IdentityResolver, RepoClient, ResolverConfig};
use frontpage_core::{
  consumer::OffsetConsumer,
  notify::NoopSink,
  store::MirrorStore,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
use notify::{Notifier, WebhookSink};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `FRONTPAGE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                    String,
  #[serde(default = "defaults::port")]
  pub port:                    u16,
  pub store_path:              PathBuf,
  /// PHC string produced by `server --hash-secret`.
  pub hook_secret_hash:        String,
  #[serde(default = "defaults::plc_directory")]
  pub plc_directory:           String,
  #[serde(default)]
  pub handle_resolver:         Option<String>,
  #[serde(default = "defaults::identity_cache_ttl_secs")]
  pub identity_cache_ttl_secs: u64,
  /// Identities kept in memory; `0` disables the cache.
  #[serde(default = "defaults::identity_cache_capacity")]
  pub identity_cache_capacity: usize,
  #[serde(default = "defaults::http_timeout_secs")]
  pub http_timeout_secs:       u64,
  #[serde(default)]
  pub notification_webhook:    Option<String>,
  #[serde(default = "defaults::front_page_limit")]
  pub front_page_limit:        usize,
}

mod defaults {
  pub fn host() -> String { "127.0.0.1".to_owned() }
  pub fn port() -> u16 { 3000 }
  pub fn plc_directory() -> String { frontpage_atproto::resolver::DEFAULT_PLC_DIRECTORY.to_owned() }
  pub fn identity_cache_ttl_secs() -> u64 { 300 }
  pub fn identity_cache_capacity() -> usize { frontpage_atproto::cache::DEFAULT_CAPACITY }
  pub fn http_timeout_secs() -> u64 { 10 }
  pub fn front_page_limit() -> usize { frontpage_api::DEFAULT_FRONT_PAGE_LIMIT }
}

impl ServerConfig {
  pub fn http_timeout(&self) -> Duration { Duration::from_secs(self.http_timeout_secs) }

  /// `store_path` with a leading `~/` expanded against `$HOME`.
  pub fn resolved_store_path(&self) -> PathBuf {
    let raw = self.store_path.to_string_lossy();
    match (raw.strip_prefix("~/"), std::env::var_os("HOME")) {
      (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
      _ => self.store_path.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the server's own handlers.
pub struct AppState<S: MirrorStore> {
  pub store:    Arc<S>,
  /// The one consumer for the feed; the lock serialises hook batches.
  pub consumer: Arc<Mutex<OffsetConsumer<S, Notifier>>>,
  pub resolver: Arc<CachingResolver>,
  pub repos:    RepoClient,
  pub config:   Arc<ServerConfig>,
  pub auth:     Arc<AuthConfig>,
}

impl<S: MirrorStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      consumer: Arc::clone(&self.consumer),
      resolver: Arc::clone(&self.resolver),
      repos:    self.repos.clone(),
      config:   Arc::clone(&self.config),
      auth:     Arc::clone(&self.auth),
    }
  }
}

impl<S: MirrorStore> AppState<S> {
  /// Build every collaborator described by `config` around `store`.
  pub fn new(store: Arc<S>, config: ServerConfig) -> Result<Self, Error> {
    let timeout = config.http_timeout();

    let resolver = IdentityResolver::new(ResolverConfig {
      plc_directory: config.plc_directory.clone(),
      handle_resolver: config.handle_resolver.clone(),
      timeout,
      ..Default::default()
    })?;
    let resolver = CachingResolver::new(
      resolver,
      Duration::from_secs(config.identity_cache_ttl_secs),
      config.identity_cache_capacity,
    );

    let notifier = match &config.notification_webhook {
      Some(url) => Notifier::Webhook(
        WebhookSink::new(url.clone(), timeout)
          .map_err(|e| Error::Startup(format!("webhook client: {e}")))?,
      ),
      None => Notifier::Disabled(NoopSink),
    };

    let consumer = OffsetConsumer::new(Arc::clone(&store), Arc::new(notifier));

    Ok(Self {
      store,
      consumer: Arc::new(Mutex::new(consumer)),
      resolver: Arc::new(resolver),
      repos: RepoClient::new(timeout)?,
      auth: Arc::new(AuthConfig { secret_hash: config.hook_secret_hash.clone() }),
      config: Arc::new(config),
    })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: MirrorStore + 'static,
{
  let api = frontpage_api::api_router(Arc::clone(&state.store), state.config.front_page_limit);

  Router::new()
    .route("/api/receive_hook",         post(routes::hook::receive::<S>))
    .route("/api/identity/{identifier}", get(routes::identity::lookup::<S>))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
