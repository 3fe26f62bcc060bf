//! chanlens binary: pipeline jobs and the analytics API server.
//!
//! Reads `chanlens.toml` (or the path given with `--config`), overridden by
//! `CHANLENS_*` environment variables, and opens the SQLite warehouse at
//! `store_path`.
//!
//! ```text
//! chanlens run              # load raw files, profile, transform
//! chanlens serve            # serve the REST API
//! ```

mod config;
mod ingest;
mod jobs;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chanlens_store_sqlite::SqliteWarehouse;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Telegram channel analytics warehouse")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "chanlens.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Append every scraper output file under a directory to the raw layer.
  LoadMessages {
    /// Defaults to `raw_messages_dir`.
    #[arg(long)]
    dir: Option<PathBuf>,
  },
  /// Append detector output to the raw layer.
  LoadDetections {
    /// Defaults to `detections_path`.
    #[arg(long)]
    file: Option<PathBuf>,
  },
  /// Print the raw message and detection quality reports as JSON.
  Quality,
  /// Rebuild and publish the marts from the raw layer.
  Transform,
  /// Load messages, load detections, profile, transform, then profile
  /// the published detections.
  Run,
  /// Serve the REST API.
  Serve,
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
  let cfg = ServerConfig::load(&cli.config)?;

  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteWarehouse::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open warehouse at {:?}", cfg.store_path))?;

  match cli.command {
    Command::LoadMessages { dir } => {
      let dir = dir.unwrap_or_else(|| cfg.raw_messages_dir.clone());
      let n = jobs::load_messages(&store, &dir).await?;
      println!("loaded {n} raw messages");
    }
    Command::LoadDetections { file } => {
      let file = file.unwrap_or_else(|| cfg.detections_path.clone());
      let n = jobs::load_detections(&store, &file).await?;
      println!("loaded {n} raw detections");
    }
    Command::Quality => {
      let report = jobs::quality(&store).await?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::Transform => {
      let report = jobs::transform(&store, &cfg.object_categories()?).await?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::Run => {
      let report = jobs::run(&store, &cfg, &cfg.object_categories()?).await?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::Serve => serve(store, &cfg).await?,
  }

  Ok(())
}

async fn serve(store: SqliteWarehouse, cfg: &ServerConfig) -> anyhow::Result<()> {
  let app = chanlens_api::api_router(Arc::new(store));
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}
