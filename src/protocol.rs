//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisResult, ProcessingConfig, QuestionSet, QuestionTypes, SummaryResult};

/// Settings sent by the page; anything left out falls back to server defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
  #[serde(default)]
  pub extraction_ratio: Option<u32>,
  #[serde(default)]
  pub summary_length: Option<u32>,
  #[serde(default)]
  pub num_questions: Option<u32>,
  #[serde(default)]
  pub question_types: Option<QuestionTypes>,
  #[serde(default)]
  pub enable_chunking: Option<bool>,
}

impl ConfigPatch {
  /// Overlay onto `base` and clamp into the allowed ranges.
  pub fn apply(&self, base: &ProcessingConfig) -> ProcessingConfig {
    ProcessingConfig {
      extraction_ratio: self.extraction_ratio.unwrap_or(base.extraction_ratio),
      summary_length: self.summary_length.unwrap_or(base.summary_length),
      num_questions: self.num_questions.unwrap_or(base.num_questions),
      question_types: self.question_types.unwrap_or(base.question_types),
      enable_chunking: self.enable_chunking.unwrap_or(base.enable_chunking),
    }
    .clamped()
  }
}

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  /// Analyze, then summarize, then generate questions, reporting each result.
  Process {
    text: String,
    #[serde(default)]
    config: ConfigPatch,
  },
  Analyze {
    text: String,
    #[serde(default)]
    config: ConfigPatch,
  },
  Summarize {
    text: String,
    #[serde(default)]
    config: ConfigPatch,
  },
  GenerateQuestions {
    text: String,
    #[serde(default)]
    config: ConfigPatch,
  },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Analysis {
    analysis: AnalysisResult,
  },
  Summary {
    summary: SummaryResult,
  },
  Questions {
    questions: QuestionSet,
  },
  /// End of a `process` run.
  Done {
    #[serde(rename = "runId")]
    run_id: String,
  },
  Error {
    message: String,
  },
}

//
// HTTP request/response DTOs
//

/// Body for analyze/summarize/questions.
#[derive(Debug, Deserialize)]
pub struct TaskIn {
  pub text: String,
  #[serde(flatten)]
  pub config: ConfigPatch,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
  pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub backend: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn task_body_flattens_config() {
    let body: TaskIn =
      serde_json::from_str(r#"{"text":"Xin chào","numQuestions":3,"questionTypes":"mcq"}"#).unwrap();
    let cfg = body.config.apply(&ProcessingConfig::default());
    assert_eq!(body.text, "Xin chào");
    assert_eq!(cfg.num_questions, 3);
    assert_eq!(cfg.question_types, QuestionTypes::Mcq);
    assert_eq!(cfg.summary_length, 75);
  }

  #[test]
  fn patch_is_clamped() {
    let patch = ConfigPatch { extraction_ratio: Some(90), num_questions: Some(0), ..Default::default() };
    let cfg = patch.apply(&ProcessingConfig::default());
    assert_eq!(cfg.extraction_ratio, 50);
    assert_eq!(cfg.num_questions, 1);
  }

  #[test]
  fn ws_messages_round_trip_names() {
    let msg: ClientWsMessage =
      serde_json::from_str(r#"{"type":"process","text":"abc","config":{"summaryLength":40}}"#).unwrap();
    match msg {
      ClientWsMessage::Process { text, config } => {
        assert_eq!(text, "abc");
        assert_eq!(config.summary_length, Some(40));
      }
      other => panic!("unexpected: {other:?}"),
    }
    let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"generate_questions","text":"abc"}"#).unwrap();
    assert!(matches!(msg, ClientWsMessage::GenerateQuestions { .. }));

    let out = serde_json::to_value(ServerWsMessage::Done { run_id: "r1".into() }).unwrap();
    assert_eq!(out, serde_json::json!({"type": "done", "runId": "r1"}));
  }
}
