//! Task operations shared by both HTTP and WebSocket handlers.
//!
//! Each operation fills its prompt template, runs one completion (with the
//! client's retry policy), normalizes the text and substitutes the task
//! fallback when nothing usable comes back. Only an exhausted completion call
//! surfaces as an error; malformed model output never does.

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::completion::{CompletionClient, CompletionError};
use crate::config::Prompts;
use crate::domain::{AnalysisResult, QuestionSet, QuestionTypes, SummaryResult};
use crate::normalize::{normalize_analysis, normalize_questions, normalize_summary};
use crate::placeholders::{fallback_analysis, fallback_questions, fallback_summary};
use crate::util::fill_template;

/// Generic message shown to users whenever a task fails.
pub const USER_ERROR_MESSAGE: &str = "Có lỗi xảy ra khi xử lý văn bản. Vui lòng thử lại sau.";

#[derive(Debug, Error)]
pub enum TaskError {
  #[error("completion backend not configured (set GEMINI_API_KEY)")]
  BackendUnavailable,
  #[error("input text is empty")]
  EmptyInput,
  #[error(transparent)]
  Completion(#[from] CompletionError),
}

impl TaskError {
  /// Text safe to show in the page.
  pub fn user_message(&self) -> &'static str {
    match self {
      TaskError::EmptyInput => "Vui lòng nhập văn bản cần xử lý.",
      TaskError::BackendUnavailable | TaskError::Completion(_) => USER_ERROR_MESSAGE,
    }
  }
}

fn require_text(text: &str) -> Result<&str, TaskError> {
  let t = text.trim();
  if t.is_empty() { Err(TaskError::EmptyInput) } else { Ok(t) }
}

pub fn analyze_prompt(prompts: &Prompts, text: &str, extraction_ratio: u32) -> String {
  let ratio = extraction_ratio.to_string();
  fill_template(&prompts.analyze_template, &[("extraction_ratio", &ratio), ("text", text)])
}

pub fn summarize_prompt(prompts: &Prompts, text: &str, summary_length: u32) -> String {
  let length = summary_length.to_string();
  fill_template(&prompts.summarize_template, &[("summary_length", &length), ("text", text)])
}

pub fn questions_prompt(prompts: &Prompts, text: &str, num_questions: u32, types: QuestionTypes) -> String {
  let n = num_questions.to_string();
  fill_template(
    &prompts.questions_template,
    &[("num_questions", &n), ("question_types", types.prompt_label()), ("text", text)],
  )
}

#[instrument(level = "info", skip(client, prompts, text), fields(text_len = text.len()))]
pub async fn analyze(
  client: &CompletionClient,
  prompts: &Prompts,
  text: &str,
  extraction_ratio: u32,
) -> Result<AnalysisResult, TaskError> {
  let text = require_text(text)?;
  let req = client.request(analyze_prompt(prompts, text, extraction_ratio));
  let raw = client.complete(&req).await?;
  Ok(normalize_analysis(&raw).unwrap_or_else(|| {
    warn!(target: "task", "Analysis not recoverable; using fallback");
    fallback_analysis()
  }))
}

#[instrument(level = "info", skip(client, prompts, text), fields(text_len = text.len()))]
pub async fn summarize(
  client: &CompletionClient,
  prompts: &Prompts,
  text: &str,
  summary_length: u32,
) -> Result<SummaryResult, TaskError> {
  let text = require_text(text)?;
  let req = client.request(summarize_prompt(prompts, text, summary_length));
  let raw = client.complete(&req).await?;
  Ok(normalize_summary(&raw).unwrap_or_else(|| {
    warn!(target: "task", "Summary not recoverable; using fallback");
    fallback_summary()
  }))
}

/// Generate questions; a longer set than requested is cut to `num_questions`.
#[instrument(level = "info", skip(client, prompts, text), fields(text_len = text.len()))]
pub async fn generate_questions(
  client: &CompletionClient,
  prompts: &Prompts,
  text: &str,
  num_questions: u32,
  question_types: QuestionTypes,
) -> Result<QuestionSet, TaskError> {
  let text = require_text(text)?;
  let req = client.request(questions_prompt(prompts, text, num_questions, question_types));
  let raw = client.complete(&req).await?;
  let mut questions = normalize_questions(&raw).unwrap_or_else(|| {
    warn!(target: "task", "Questions not recoverable; using fallback");
    fallback_questions()
  });
  if questions.len() > num_questions as usize {
    info!(target: "task", got = questions.len(), wanted = num_questions, "Truncating surplus questions");
    questions.truncate(num_questions as usize);
  }
  Ok(questions)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  use serde_json::json;

  use crate::completion::tests::{client, ScriptedBackend};
  use crate::completion::{BackendError, FailureKind};
  use crate::domain::QuestionItem;
  use crate::placeholders::placeholder_analysis;

  const INPUT: &str = "Việt Nam giành độc lập ngày 2/9/1945.";

  #[tokio::test]
  async fn summarize_recovers_fenced_json() {
    let reply = "```json\n{\"base_summary\":\"VN độc lập 1945.\",\"enhanced_summary\":\"Việt Nam giành độc lập năm 1945.\",\"summary_length\":5,\"rouge_score\":0.42}\n```";
    let backend = Arc::new(ScriptedBackend::texts(&[reply]));
    let s = summarize(&client(backend.clone()), &Prompts::default(), INPUT, 75).await.unwrap();
    assert_eq!(s.rouge_score, 0.42);
    assert_eq!(s.summary_length_words, 5);
    assert_eq!(s.base_summary, "VN độc lập 1945.");

    let prompt = backend.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains(INPUT));
    assert!(prompt.contains("75 từ"));
  }

  #[tokio::test]
  async fn analyze_prose_yields_canonical_placeholder() {
    let backend = Arc::new(ScriptedBackend::texts(&["Tôi không tìm thấy important_sentences nào, xin lỗi."]));
    let a = analyze(&client(backend), &Prompts::default(), INPUT, 20).await.unwrap();
    assert_eq!(a, placeholder_analysis());
  }

  #[tokio::test]
  async fn unrecognized_output_uses_task_fallbacks() {
    let backend = Arc::new(ScriptedBackend::texts(&["???", "???", "???"]));
    let c = client(backend);
    let p = Prompts::default();
    assert_eq!(analyze(&c, &p, INPUT, 20).await.unwrap(), fallback_analysis());
    assert_eq!(summarize(&c, &p, INPUT, 75).await.unwrap(), fallback_summary());
    assert_eq!(generate_questions(&c, &p, INPUT, 4, QuestionTypes::All).await.unwrap(), fallback_questions());
  }

  #[tokio::test]
  async fn question_count_follows_cooperating_backend() {
    for n in 1..=10u32 {
      let items: Vec<_> = (0..n)
        .map(|i| json!({"question": format!("Câu {i}"), "type": "tf", "answer": i % 2 == 0}))
        .collect();
      let reply = format!("```json\n{}\n```", serde_json::Value::Array(items));
      let backend = Arc::new(ScriptedBackend::texts(&[reply.as_str()]));
      let qs = generate_questions(&client(backend.clone()), &Prompts::default(), INPUT, n, QuestionTypes::Tf)
        .await
        .unwrap();
      assert_eq!(qs.len(), n as usize);
      assert_eq!(qs[0].question(), "Câu 0");
      let prompt = backend.prompts.lock().unwrap()[0].clone();
      assert!(prompt.contains(&format!("Tạo đúng {n} câu hỏi")));
    }
  }

  #[tokio::test]
  async fn surplus_questions_are_truncated_in_order() {
    let reply = json!([
      {"question": "A", "type": "fill", "answer": "1"},
      {"question": "B", "type": "fill", "answer": "2"},
      {"question": "C", "type": "fill", "answer": "3"}
    ])
    .to_string();
    let backend = Arc::new(ScriptedBackend::texts(&[reply.as_str()]));
    let qs = generate_questions(&client(backend), &Prompts::default(), INPUT, 2, QuestionTypes::Fill).await.unwrap();
    assert_eq!(
      qs,
      vec![
        QuestionItem::Fill { question: "A".into(), answer: "1".into() },
        QuestionItem::Fill { question: "B".into(), answer: "2".into() }
      ]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn exhausted_completion_propagates() {
    let fail = || Some(Err(BackendError::Http { status: 503, message: "unavailable".into() }));
    let backend = Arc::new(ScriptedBackend::new(vec![fail(), fail(), fail()]));
    let err = summarize(&client(backend), &Prompts::default(), INPUT, 75).await.unwrap_err();
    match err {
      TaskError::Completion(e) => {
        assert_eq!(e.kind, FailureKind::Transport);
        assert_eq!(e.attempts, 3);
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn blank_input_is_rejected_before_calling_backend() {
    let backend = Arc::new(ScriptedBackend::texts(&["{}"]));
    let err = analyze(&client(backend.clone()), &Prompts::default(), "   \n", 20).await.unwrap_err();
    assert!(matches!(err, TaskError::EmptyInput));
    assert_eq!(backend.calls(), 0);
  }

  #[test]
  fn question_prompt_lists_all_types() {
    let p = questions_prompt(&Prompts::default(), INPUT, 4, QuestionTypes::All);
    assert!(p.contains("Tạo đúng 4 câu hỏi"));
    assert!(p.contains("đúng/sai (tf)"));
    assert!(p.contains(INPUT));
    let p = analyze_prompt(&Prompts::default(), INPUT, 35);
    assert!(p.contains("khoảng 35%"));
  }
}
