//! HTTP server for Inkwell.
//!
//! Mounts the JSON API under `/api` and the billing webhook at `/webhook`,
//! backed by any [`WorkspaceStore`].

pub mod webhook;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use inkwell_api::{ApiSettings, ApiState, api_router};
use inkwell_core::store::WorkspaceStore;
use inkwell_llm::{ChatModel, DEFAULT_MODEL};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `INKWELL_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  /// Public base URL, used to tell operators where to point the provider.
  #[serde(default = "default_site_url")]
  pub site_url:               String,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  #[serde(default)]
  pub openai_api_key:         Option<String>,
  #[serde(default)]
  pub openai_api_base:        Option<String>,
  #[serde(default = "default_model")]
  pub model:                  String,
  /// Standard Webhooks secret (`whsec_...` or `polar_whs_...`). Unsigned
  /// deliveries are accepted when unset.
  #[serde(default)]
  pub webhook_secret:         Option<String>,
  /// Maximum clock skew for `webhook-timestamp`; `0` disables the check.
  #[serde(default = "default_webhook_tolerance")]
  pub webhook_tolerance_secs: u64,
  #[serde(default)]
  pub debug_endpoints:        bool,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_site_url() -> String { "http://localhost:8080".to_owned() }
fn default_store_path() -> PathBuf { PathBuf::from("inkwell.db") }
fn default_model() -> String { DEFAULT_MODEL.to_owned() }
fn default_webhook_tolerance() -> u64 { 300 }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                   default_host(),
      port:                   default_port(),
      site_url:               default_site_url(),
      store_path:             default_store_path(),
      openai_api_key:         None,
      openai_api_base:        None,
      model:                  default_model(),
      webhook_secret:         None,
      webhook_tolerance_secs: default_webhook_tolerance(),
      debug_endpoints:        false,
    }
  }
}

impl ServerConfig {
  /// Where the billing provider should deliver webhooks.
  pub fn webhook_url(&self) -> String {
    format!("{}/webhook", self.site_url.trim_end_matches('/'))
  }

  /// Decode the configured webhook secret, if any. Run once at startup so a
  /// malformed secret stops the server instead of failing every delivery.
  pub fn check_webhook_secret(&self) -> Result<(), webhook::signature::SignatureError> {
    if let Some(secret) = &self.webhook_secret {
      webhook::signature::decode_secret(secret)?;
    }
    Ok(())
  }

  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      model:           self.model.clone(),
      debug_endpoints: self.debug_endpoints,
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through the webhook handlers.
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub model:  Arc<dyn ChatModel>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      config: Arc::clone(&self.config),
      model:  Arc::clone(&self.model),
    }
  }
}

impl<S> AppState<S> {
  pub fn api_state(&self) -> ApiState<S> {
    ApiState {
      store:    Arc::clone(&self.store),
      model:    Arc::clone(&self.model),
      settings: Arc::new(self.config.api_settings()),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full server router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: WorkspaceStore + 'static,
{
  let api = api_router(state.api_state());

  Router::new()
    .route(
      "/webhook",
      post(webhook::receive::<S>)
        .options(webhook::preflight)
        .get(webhook::probe::<S>),
    )
    .route("/polar-webhook", get(webhook::moved::<S>))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}
