//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::State,
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument};

use crate::domain::{AnalysisResult, QuestionSet, SummaryResult};
use crate::export::{render_questions, EXPORT_FILE_NAME};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for TaskError {
  fn into_response(self) -> Response {
    let status = match &self {
      TaskError::EmptyInput => StatusCode::BAD_REQUEST,
      TaskError::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      TaskError::Completion(_) => StatusCode::BAD_GATEWAY,
    };
    error!(target: "vnqgen", %status, error = %self, "Task failed");
    (status, Json(ErrorOut { message: self.user_message().to_string() })).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, backend: state.client.is_some() })
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_analyze(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TaskIn>,
) -> Result<Json<AnalysisResult>, TaskError> {
  let cfg = body.config.apply(&state.defaults);
  let analysis = analyze(state.client()?, &state.prompts, &body.text, cfg.extraction_ratio).await?;
  info!(target: "vnqgen", keywords = analysis.keywords.len(), entities = analysis.entities.len(), enable_chunking = cfg.enable_chunking, "HTTP analysis served");
  Ok(Json(analysis))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_summarize(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TaskIn>,
) -> Result<Json<SummaryResult>, TaskError> {
  let cfg = body.config.apply(&state.defaults);
  let summary = summarize(state.client()?, &state.prompts, &body.text, cfg.summary_length).await?;
  info!(target: "vnqgen", words = summary.summary_length_words, rouge = summary.rouge_score, "HTTP summary served");
  Ok(Json(summary))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_questions(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TaskIn>,
) -> Result<Json<QuestionSet>, TaskError> {
  let cfg = body.config.apply(&state.defaults);
  let questions =
    generate_questions(state.client()?, &state.prompts, &body.text, cfg.num_questions, cfg.question_types).await?;
  info!(target: "vnqgen", count = questions.len(), types = ?cfg.question_types, "HTTP questions served");
  Ok(Json(questions))
}

#[instrument(level = "info", skip(questions), fields(count = questions.len()))]
pub async fn http_post_export(Json(questions): Json<QuestionSet>) -> impl IntoResponse {
  let text = render_questions(&questions);
  (
    [
      (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
      (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME)),
    ],
    text,
  )
}
