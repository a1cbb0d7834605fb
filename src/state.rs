//! Application state: configuration plus the optional completion client.
//!
//! Built once at start-up and shared read-only between handlers; nothing here
//! is mutated after construction.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::completion::{CompletionBackend, CompletionClient};
use crate::config::{AppConfig, Prompts};
use crate::domain::ProcessingConfig;
use crate::gemini::Gemini;
use crate::logic::TaskError;

#[derive(Clone)]
pub struct AppState {
  pub client: Option<CompletionClient>,
  pub prompts: Prompts,
  pub defaults: ProcessingConfig,
}

impl AppState {
  /// Build state from env: load config, init the Gemini backend if a key is present.
  #[instrument(level = "info", skip_all)]
  pub fn from_env() -> Self {
    let cfg = AppConfig::from_env();
    let backend = Gemini::from_env();
    match &backend {
      Some(g) => {
        info!(target: "vnqgen", base_url = %g.base_url, model = %cfg.client.model, timeout_ms = cfg.client.timeout_ms, max_retries = cfg.client.max_retries, "Gemini enabled.")
      }
      None => warn!(target: "vnqgen", "Gemini disabled (GEMINI_API_KEY unset or HTTP client failed to build). Task operations will fail."),
    }
    Self::new(cfg, backend.map(|g| Arc::new(g) as Arc<dyn CompletionBackend>))
  }

  pub fn new(cfg: AppConfig, backend: Option<Arc<dyn CompletionBackend>>) -> Self {
    let client = backend.map(|b| CompletionClient::new(b, cfg.client.clone()));
    Self { client, prompts: cfg.prompts, defaults: cfg.defaults }
  }

  pub fn client(&self) -> Result<&CompletionClient, TaskError> {
    self.client.as_ref().ok_or(TaskError::BackendUnavailable)
  }
}
