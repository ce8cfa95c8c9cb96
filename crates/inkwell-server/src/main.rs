//! inkwell-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `INKWELL_*` environment variables, opens the SQLite store, and serves the
//! API and the billing webhook over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use inkwell_llm::OpenAiChat;
use inkwell_server::{AppState, ServerConfig};
use inkwell_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Inkwell document workspace server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("INKWELL"))
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  server_cfg
    .check_webhook_secret()
    .context("webhook_secret is not a usable Standard Webhooks secret")?;
  if server_cfg.webhook_secret.is_none() {
    warn!("INKWELL_WEBHOOK_SECRET is not set: webhook deliveries will not be authenticated");
  }
  if server_cfg.openai_api_key.is_none() {
    warn!("INKWELL_OPENAI_API_KEY is not set: chat requests will fail");
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let model = OpenAiChat::new(
    server_cfg.openai_api_key.clone().unwrap_or_default(),
    server_cfg.openai_api_base.clone(),
  );
  info!(model = %server_cfg.model, api_base = model.api_base(), "chat provider configured");

  let state = AppState {
    store:  Arc::new(store),
    model:  Arc::new(model),
    config: Arc::new(server_cfg.clone()),
  };

  let app = inkwell_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  info!("Listening on http://{address}");
  info!("Webhook URL: {}", server_cfg.webhook_url());
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
