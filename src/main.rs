//! Vibe Cultivator · Learning Progression Backend
//!
//! - Axum HTTP + WebSocket API
//! - Placement assessment, module quizzes, final quiz, challenge lab
//! - Progress persisted to a local JSON file
//! - Optional OpenAI integration for feedback and challenges (via environment variables)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   OPENAI_API_KEY         : enables OpenAI integration if present
//!   OPENAI_BASE_URL        : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL      : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL    : default "gpt-4o"
//!   CULTIVATOR_CONFIG_PATH : path to TOML config (prompts + optional question banks)
//!   CULTIVATOR_DATA_PATH   : progress file (default "./data/progress.json")
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod telemetry;
mod util;
mod errors;
mod domain;
mod scoring;
mod progression;
mod assessment;
mod storage;
mod store;
mod lab;
mod config;
mod seeds;
mod generator;
mod openai;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: progress store (loaded from disk), lab, quiz sessions, generator.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "cultivator", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "cultivator", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "cultivator", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}
