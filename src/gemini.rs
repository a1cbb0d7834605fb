//! Minimal Gemini client for our use-cases.
//!
//! We only call `models/{model}:generateContent` with a single user text part.
//! Calls are instrumented and log model names, latencies, and token counts
//! (not contents).
//!
//! NOTE: We never log the API key.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::completion::{BackendError, CompletionBackend};
use crate::envelope::ResponseEnvelope;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
}

impl Gemini {
  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  /// Timeouts are enforced per attempt by the completion client.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    match Self::new(api_key, &base_url) {
      Ok(g) => Some(g),
      Err(e) => {
        error!(target: "vnqgen", error = %e, "Failed to build Gemini HTTP client; backend disabled");
        None
      }
    }
  }

  pub fn new(api_key: String, base_url: &str) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().build()?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string() })
  }

  fn endpoint(&self, model: &str) -> String {
    format!("{}/models/{}:generateContent", self.base_url, model)
  }
}

#[async_trait]
impl CompletionBackend for Gemini {
  #[instrument(level = "info", skip(self, prompt), fields(model = %model, prompt_len = prompt.len()))]
  async fn generate(&self, prompt: &str, model: &str) -> Result<ResponseEnvelope, BackendError> {
    let req = GenerateContentRequest {
      contents: vec![ContentReq { role: "user".into(), parts: vec![PartReq { text: prompt.into() }] }],
    };

    let res = self
      .client
      .post(self.endpoint(model))
      .header(USER_AGENT, "vnqgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req)
      .send()
      .await
      .map_err(|e| BackendError::Transport(e.to_string()))?;

    let status = res.status();
    let body = res.text().await.map_err(|e| BackendError::Transport(e.to_string()))?;

    if !status.is_success() {
      let message = extract_gemini_error(&body).unwrap_or(body);
      return Err(BackendError::Http { status: status.as_u16(), message });
    }

    let envelope = ResponseEnvelope::from_body(&body);
    if let Some(usage) = &envelope.usage_metadata {
      info!(target: "completion", prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    if let Some(reason) = envelope.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
      warn!(target: "completion", block_reason = %reason, "Gemini blocked the prompt");
    }
    Ok(envelope)
  }
}

// --- Request DTOs ---

#[derive(Serialize)]
struct GenerateContentRequest {
  contents: Vec<ContentReq>,
}
#[derive(Serialize)]
struct ContentReq {
  role: String,
  parts: Vec<PartReq>,
}
#[derive(Serialize)]
struct PartReq {
  text: String,
}

/// Try to extract a clean error message from a Gemini error body,
/// keeping the status name so quota errors stay recognizable.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
    #[serde(default)]
    status: Option<String>,
  }
  let w = serde_json::from_str::<EWrap>(body).ok()?;
  Some(match w.error.status {
    Some(status) => format!("{}: {}", status, w.error.message),
    None => w.error.message,
  })
}
