//! VNQGen · Vietnamese Summarizer & Question Generator Backend
//!
//! - Axum HTTP + WebSocket API driving three task operations
//!   (analyze, summarize, generate questions) and a plain-text export
//! - Gemini integration with timeout, retries and rate-limit backoff
//! - Defensive recovery of JSON from free-form model output
//! - Static page fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   GEMINI_API_KEY      : enables the completion backend if present
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-2.0-flash"
//!   VNQGEN_CONFIG_PATH  : path to TOML config (client settings, prompts, defaults)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod completion;
mod config;
mod domain;
mod envelope;
mod export;
mod gemini;
mod logic;
mod normalize;
mod placeholders;
mod protocol;
mod routes;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared read-only state: config, prompts, optional completion client.
  let state = Arc::new(AppState::from_env());

  let app = build_router(state);

  // Local single-user tool: loopback only.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([127, 0, 0, 1], port)))
    .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "vnqgen", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
