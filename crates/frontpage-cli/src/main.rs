//! `frontpage`: operator tool for a Frontpage mirror.
//!
//! # Usage
//!
//! ```text
//! frontpage resolve alice.example
//! frontpage describe did:plc:abc123
//! frontpage --url http://localhost:3000 front-page --limit 10
//! frontpage post did:plc:abc123 3k2x
//! ```

mod client;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client::ApiClient;
use frontpage_atproto::{IdentityResolver, RepoClient, ResolverConfig, resolver::DEFAULT_PLC_DIRECTORY};
use frontpage_core::{
  ident::{Did, Identifier, Rkey},
  mirror::PostView,
};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://localhost:3000";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "frontpage", about = "Operator tool for a Frontpage mirror")]
struct Args {
  /// Path to a TOML config file (url, plc_directory).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the frontpage server (default: http://localhost:3000).
  #[arg(long, env = "FRONTPAGE_URL")]
  url: Option<String>,

  /// PLC directory used to resolve `did:plc` identities.
  #[arg(long, env = "FRONTPAGE_PLC")]
  plc: Option<String>,

  /// Timeout in seconds for identity and repository requests.
  #[arg(long, default_value_t = 10)]
  timeout: u64,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Resolve a handle or DID to its DID document and PDS.
  Resolve { identifier: String },
  /// List the collections in an identity's repository.
  Describe { identifier: String },
  /// Print the ranked front page from the server.
  FrontPage {
    #[arg(short, long)]
    limit: Option<usize>,
  },
  /// Look up one mirrored post, live or deleted.
  Post { did: Did, rkey: Rkey },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:           Option<String>,
  #[serde(default)]
  plc_directory: Option<String>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // Flags and env override the config file, which overrides defaults.
  let url = args.url.or(file_cfg.url).unwrap_or_else(|| DEFAULT_URL.to_owned());
  let plc = args
    .plc
    .or(file_cfg.plc_directory)
    .unwrap_or_else(|| DEFAULT_PLC_DIRECTORY.to_owned());
  let timeout = Duration::from_secs(args.timeout);

  match args.command {
    Command::Resolve { identifier } => {
      let identifier = Identifier::parse(&identifier).context("parsing identifier")?;
      let resolver = resolver(plc, timeout)?;
      let identity = resolver
        .resolve_pds(&identifier)
        .await
        .with_context(|| format!("resolving {identifier}"))?;
      println!("did:    {}", identity.did());
      if let Some(handle) = identity.document.handle() {
        println!("handle: {handle}");
      }
      println!("pds:    {}", identity.pds);
    }

    Command::Describe { identifier } => {
      let identifier = Identifier::parse(&identifier).context("parsing identifier")?;
      let identity = resolver(plc, timeout)?
        .resolve_pds(&identifier)
        .await
        .with_context(|| format!("resolving {identifier}"))?;
      let description = RepoClient::new(timeout)?
        .describe_repository(&identity.pds, identity.did())
        .await
        .with_context(|| format!("describing repository of {}", identity.did()))?;
      for collection in &description.collections {
        println!("{collection}");
      }
    }

    Command::FrontPage { limit } => {
      let page = ApiClient::new(url)?.front_page(limit).await?;
      let now = Utc::now();
      for (rank, entry) in page.iter().enumerate() {
        let hours = (now - entry.view.post.created_at).num_hours();
        println!(
          "{:>3}. [{:.3}] {} ({} votes, {} comments, {hours}h ago)",
          rank + 1,
          entry.score,
          entry.view.post.title,
          entry.view.vote_count,
          entry.view.comment_count,
        );
        println!("     {}", entry.view.post.url);
      }
    }

    Command::Post { did, rkey } => {
      match ApiClient::new(url)?.post(&did, &rkey).await? {
        Some(view) => print_post(&view),
        None => anyhow::bail!("no post {rkey} by {did} in the mirror"),
      }
    }
  }

  Ok(())
}

fn resolver(plc_directory: String, timeout: Duration) -> Result<IdentityResolver> {
  IdentityResolver::new(ResolverConfig { plc_directory, timeout, ..Default::default() })
    .context("building identity resolver")
}

fn print_post(view: &PostView) {
  let post = &view.post;
  println!("uri:      {}", post.uri());
  println!("title:    {}", post.title);
  println!("url:      {}", post.url);
  println!("status:   {}", post.status);
  println!("created:  {}", post.created_at.to_rfc3339());
  println!("votes:    {}", view.vote_count);
  println!("comments: {}", view.comment_count);
}
