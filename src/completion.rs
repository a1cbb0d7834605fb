//! Completion client: one prompt in, one non-empty text out, with retries.
//!
//! Each attempt races the backend call against a timeout. Failed attempts are
//! fed to a small retry state machine that decides between giving up, the
//! standard exponential wait, or the long fixed wait used for rate limiting.
//! The client holds no mutable state, so clones may be used concurrently.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientSettings;
use crate::envelope::ResponseEnvelope;

/// Error reported by a backend for a single call.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BackendError {
  #[error("HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("transport error: {0}")]
  Transport(String),
}

impl BackendError {
  /// HTTP 429, or a message carrying a quota/rate-limit signal.
  pub fn is_rate_limited(&self) -> bool {
    let message = match self {
      BackendError::Http { status: 429, .. } => return true,
      BackendError::Http { message, .. } => message,
      BackendError::Transport(message) => message,
    };
    let lower = message.to_lowercase();
    lower.contains("resource_exhausted")
      || lower.contains("rate limit")
      || lower.contains("too many requests")
      || mentions_status_429(&lower)
  }
}

/// "429" only counts right after "http", "status" or "code", so ports,
/// byte counts and URL segments do not trip it.
fn mentions_status_429(lower: &str) -> bool {
  let words: Vec<&str> = lower.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()).collect();
  words.windows(2).any(|w| matches!(w[0], "http" | "status" | "code") && w[1] == "429")
}

/// Opaque text-completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
  async fn generate(&self, prompt: &str, model: &str) -> Result<ResponseEnvelope, BackendError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
  Timeout,
  RateLimited,
  Transport,
  EmptyResponse,
}

impl FailureKind {
  pub fn classify(err: &BackendError) -> Self {
    if err.is_rate_limited() { FailureKind::RateLimited } else { FailureKind::Transport }
  }
}

/// Completion failed on every allowed attempt.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("completion failed after {attempts} attempt(s) ({kind:?}): {last_message}")]
pub struct CompletionError {
  pub kind: FailureKind,
  pub attempts: u32,
  pub last_message: String,
}

/// One completion call, fixed once issued.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
  pub prompt_text: String,
  pub model_id: String,
  pub timeout_ms: u64,
  pub max_retries: u32,
}

/// Wait durations for the two backoff regimes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
  pub base: Duration,
  pub rate_limit_wait: Duration,
}

impl Default for BackoffPolicy {
  fn default() -> Self {
    Self { base: Duration::from_millis(1000), rate_limit_wait: Duration::from_secs(60) }
  }
}

impl BackoffPolicy {
  /// Wait before the next attempt, given the number of attempts consumed so far.
  pub fn delay(&self, kind: FailureKind, attempts: u32) -> Duration {
    match kind {
      FailureKind::RateLimited => self.rate_limit_wait,
      _ => self.base.saturating_mul(2u32.saturating_pow(attempts)),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RetryDecision {
  Wait(Duration),
  GiveUp,
}

/// Attempt counter plus the last failure kind.
#[derive(Clone, Debug)]
pub struct RetryState {
  attempts: u32,
  max_retries: u32,
  last_kind: Option<FailureKind>,
  policy: BackoffPolicy,
}

impl RetryState {
  /// `max_retries` of zero still allows a single attempt.
  pub fn new(max_retries: u32, policy: BackoffPolicy) -> Self {
    Self { attempts: 0, max_retries: max_retries.max(1), last_kind: None, policy }
  }

  pub fn attempts(&self) -> u32 {
    self.attempts
  }

  pub fn max_retries(&self) -> u32 {
    self.max_retries
  }

  pub fn last_kind(&self) -> Option<FailureKind> {
    self.last_kind
  }

  /// Consume one attempt and decide what happens next.
  pub fn record_failure(&mut self, kind: FailureKind) -> RetryDecision {
    self.attempts += 1;
    self.last_kind = Some(kind);
    if self.attempts >= self.max_retries {
      RetryDecision::GiveUp
    } else {
      RetryDecision::Wait(self.policy.delay(kind, self.attempts))
    }
  }
}

#[derive(Clone)]
pub struct CompletionClient {
  backend: Arc<dyn CompletionBackend>,
  settings: ClientSettings,
}

impl CompletionClient {
  pub fn new(backend: Arc<dyn CompletionBackend>, settings: ClientSettings) -> Self {
    Self { backend, settings }
  }

  /// Request with the configured model, timeout and retry budget.
  pub fn request(&self, prompt_text: impl Into<String>) -> CompletionRequest {
    CompletionRequest {
      prompt_text: prompt_text.into(),
      model_id: self.settings.model.clone(),
      timeout_ms: self.settings.timeout_ms,
      max_retries: self.settings.max_retries,
    }
  }

  fn policy(&self) -> BackoffPolicy {
    BackoffPolicy {
      base: Duration::from_millis(self.settings.base_backoff_ms),
      rate_limit_wait: Duration::from_millis(self.settings.rate_limit_wait_ms),
    }
  }

  /// Run the request until a non-empty text comes back or retries run out.
  #[instrument(
    level = "info",
    skip(self, req),
    fields(model = %req.model_id, prompt_len = req.prompt_text.len(), max_retries = req.max_retries)
  )]
  pub async fn complete(&self, req: &CompletionRequest) -> Result<String, CompletionError> {
    let mut state = RetryState::new(req.max_retries, self.policy());
    let timeout = Duration::from_millis(req.timeout_ms);

    loop {
      let start = std::time::Instant::now();
      let outcome = tokio::time::timeout(timeout, self.backend.generate(&req.prompt_text, &req.model_id)).await;

      let (kind, message) = match outcome {
        Err(_) => (FailureKind::Timeout, format!("API timeout after {} ms", req.timeout_ms)),
        Ok(Err(e)) => (FailureKind::classify(&e), e.to_string()),
        Ok(Ok(envelope)) => {
          let text = envelope.text();
          if !text.is_empty() {
            info!(target: "completion", elapsed = ?start.elapsed(), attempt = state.attempts() + 1, text_len = text.len(), "Completion received");
            debug!(target: "completion", text = %crate::util::trunc_for_log(&text, 400), "Completion text");
            return Ok(text);
          }
          let reason = envelope.finish_reason().unwrap_or("none");
          (FailureKind::EmptyResponse, format!("Response empty (finish reason: {reason})"))
        }
      };

      match state.record_failure(kind) {
        RetryDecision::GiveUp => {
          warn!(target: "completion", attempts = state.attempts(), last_kind = ?state.last_kind(), error = %message, "Completion failed; retries exhausted");
          return Err(CompletionError { kind, attempts: state.attempts(), last_message: message });
        }
        RetryDecision::Wait(wait) => {
          warn!(target: "completion", attempt = state.attempts(), max_retries = state.max_retries(), ?kind, ?wait, error = %message, "Completion attempt failed; backing off");
          tokio::time::sleep(wait).await;
        }
      }
    }
  }
}
