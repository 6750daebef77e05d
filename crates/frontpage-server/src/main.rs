//! frontpage server binary.
//!
//! Configuration comes from `config.toml` (or `--config`) overlaid with
//! `FRONTPAGE_*` environment variables. `server --hash-secret` prints the
//! argon2 PHC string to put in `hook_secret_hash`.

use std::{io::BufRead as _, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use frontpage_server::{AppState, ServerConfig};
use frontpage_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Frontpage mirror server")]
struct Cli {
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Read a hook secret from stdin, print its argon2 hash and exit.
  #[arg(long)]
  hash_secret: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  if cli.hash_secret {
    println!("{}", hash_secret_from_stdin()?);
    return Ok(());
  }

  let cfg: ServerConfig = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("FRONTPAGE"))
    .build()
    .and_then(config::Config::try_deserialize)
    .context("failed to load server configuration")?;

  let store_path = cfg.resolved_store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open mirror at {}", store_path.display()))?;

  let address = format!("{}:{}", cfg.host, cfg.port);
  if cfg.notification_webhook.is_none() {
    info!("no notification_webhook configured; post notifications disabled");
  }
  let state = AppState::new(Arc::new(store), cfg).context("failed to build application state")?;

  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  info!(%address, "mirror listening");

  axum::serve(listener, frontpage_server::router(state.clone()))
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
      info!("shutting down");
    })
    .await
    .context("server error")?;

  // Let webhooks for posts mirrored just before shutdown go out.
  state.consumer.lock().await.flush_notifications().await;
  Ok(())
}

fn hash_secret_from_stdin() -> anyhow::Result<String> {
  eprint!("Secret: ");
  let mut line = String::new();
  std::io::stdin().lock().read_line(&mut line)?;
  let secret = line.trim_end_matches(['\n', '\r']);
  anyhow::ensure!(!secret.is_empty(), "empty secret");

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(secret.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
  Ok(hash.to_string())
}
