//! HTTP server wiring for Tally.
//!
//! Mounts the JSON API from `tally-api` under `/api` and wraps it in request
//! tracing. The binary in `main.rs` supplies configuration and the store.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use serde::Deserialize;
use tally_core::{Coordinator, store::Store};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered
/// under `TALLY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 5000 }

fn default_store_path() -> PathBuf { PathBuf::from("tally.db") }

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application router over `coordinator`.
pub fn app<S>(coordinator: Arc<Coordinator<S>>) -> Router
where
  S: Store + 'static,
{
  Router::new()
    .nest("/api", tally_api::api_router(coordinator))
    .layer(TraceLayer::new_for_http())
}
