//! Loading application configuration (client settings, prompts, defaults) from TOML.
//!
//! Every section is optional. See `AppConfig`, `ClientSettings` and `Prompts`
//! for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::ProcessingConfig;
use crate::gemini::DEFAULT_MODEL;

#[derive(Clone, Debug, Deserialize, Default, PartialEq)]
pub struct AppConfig {
  #[serde(default)]
  pub client: ClientSettings,
  #[serde(default)]
  pub prompts: Prompts,
  /// Used for any field a request leaves out.
  #[serde(default)]
  pub defaults: ProcessingConfig,
}

/// Completion client knobs shared by every task operation.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
  pub model: String,
  pub timeout_ms: u64,
  pub max_retries: u32,
  pub base_backoff_ms: u64,
  pub rate_limit_wait_ms: u64,
}

impl Default for ClientSettings {
  fn default() -> Self {
    Self {
      model: DEFAULT_MODEL.into(),
      timeout_ms: 30_000,
      max_retries: 3,
      base_backoff_ms: 1_000,
      rate_limit_wait_ms: 60_000,
    }
  }
}

/// Prompt templates for the three task operations.
/// Placeholders: `{text}`, `{extraction_ratio}`, `{summary_length}`,
/// `{num_questions}`, `{question_types}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Prompts {
  pub analyze_template: String,
  pub summarize_template: String,
  pub questions_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      analyze_template: r#"Phân tích văn bản tiếng Việt sau đây:
"{text}"

Trả về kết quả dưới dạng JSON với cấu trúc:
{
  "keywords": [các từ khóa quan trọng],
  "important_sentences": [các câu quan trọng nhất, khoảng {extraction_ratio}% tổng số câu],
  "entities": [các thực thể được nhận diện]
}

Chỉ trả về JSON, không kèm lời giải thích."#
        .into(),
      summarize_template: r#"Tóm tắt văn bản tiếng Việt sau đây trong khoảng {summary_length} từ:
"{text}"

Trả về kết quả dưới dạng JSON với cấu trúc:
{
  "base_summary": "tóm tắt ngắn gọn, cơ bản",
  "enhanced_summary": "tóm tắt chi tiết hơn, đủ thông tin quan trọng",
  "summary_length": số từ của enhanced_summary,
  "rouge_score": điểm chất lượng tóm tắt (0.0-1.0)
}

Chỉ trả về JSON, không kèm lời giải thích."#
        .into(),
      questions_template: r#"Tạo đúng {num_questions} câu hỏi kiểm tra từ văn bản tiếng Việt sau đây:
"{text}"

Loại câu hỏi: {question_types}

Trả về một mảng JSON, mỗi phần tử có dạng:
{
  "question": "nội dung câu hỏi",
  "type": "mcq" | "tf" | "fill",
  "answers": ["lựa chọn A", "lựa chọn B", "lựa chọn C", "lựa chọn D"] (chỉ cho mcq),
  "correct_index": chỉ số đáp án đúng, bắt đầu từ 0 (chỉ cho mcq),
  "answer": true/false cho tf, hoặc chuỗi đáp án cho fill
}

Chỉ trả về JSON, không kèm lời giải thích."#
        .into(),
    }
  }
}

impl AppConfig {
  /// Load from VNQGEN_CONFIG_PATH (defaults when unset or unreadable),
  /// then apply the GEMINI_MODEL override.
  pub fn from_env() -> Self {
    let mut cfg = load_app_config_from_env().unwrap_or_default();
    if let Ok(model) = std::env::var("GEMINI_MODEL") {
      if !model.trim().is_empty() {
        cfg.client.model = model;
      }
    }
    cfg.defaults = cfg.defaults.clamped();
    cfg
  }
}

/// Attempt to load `AppConfig` from VNQGEN_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("VNQGEN_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "vnqgen", %path, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "vnqgen", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "vnqgen", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
