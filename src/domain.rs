//! Domain models: analysis, two-tier summary, quiz questions and the
//! per-request processing configuration.
//!
//! Everything here is built fresh for one request/response cycle and never
//! mutated afterwards. Serialized field names are the snake_case names the
//! model is asked to produce, so the same shapes travel to the browser.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Keyword/entity analysis of one input text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
  pub keywords: Vec<String>,
  pub important_sentences: Vec<String>,
  pub entities: Vec<Entity>,
}

/// A recognized entity: either a bare string or an object with a name and an
/// optional label ("PER", "LOC", ...).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
  Name(String),
  Labeled {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
  },
}

// Models mix key spellings, sometimes within one object, so the first
// present key wins instead of serde aliases (which reject duplicates).
impl<'de> Deserialize<'de> for Entity {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    match Value::deserialize(deserializer)? {
      Value::String(name) => Ok(Entity::Name(name)),
      Value::Object(obj) => {
        let pick = |keys: &[&str]| {
          keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str)).map(str::to_string)
        };
        let name = pick(&["name", "text", "entity"]).ok_or_else(|| de::Error::custom("entity without a name"))?;
        Ok(Entity::Labeled { name, label: pick(&["label", "type"]) })
      }
      _ => Err(de::Error::custom("entity must be a string or an object")),
    }
  }
}

/// Two-tier summary. Length and ROUGE are advisory values reported by the
/// model, never recomputed here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
  pub base_summary: String,
  pub enhanced_summary: String,
  #[serde(rename = "summary_length")]
  pub summary_length_words: u32,
  /// Always within [0, 1].
  pub rouge_score: f64,
}

/// One quiz question, tagged by `type` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionItem {
  /// Multiple choice; `correct_index` is 0-based into `answers`.
  Mcq { question: String, answers: Vec<String>, correct_index: usize },
  /// True/false.
  Tf { question: String, answer: bool },
  /// Fill in the blank.
  Fill { question: String, answer: String },
}

impl QuestionItem {
  pub fn question(&self) -> &str {
    match self {
      QuestionItem::Mcq { question, .. }
      | QuestionItem::Tf { question, .. }
      | QuestionItem::Fill { question, .. } => question,
    }
  }
}

/// Ordered questions; order is presentation and export order.
pub type QuestionSet = Vec<QuestionItem>;

/// Which question types the model should produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionTypes {
  #[default]
  All,
  Mcq,
  Tf,
  Fill,
}

impl QuestionTypes {
  /// Wording inserted into the question prompt.
  pub fn prompt_label(self) -> &'static str {
    match self {
      QuestionTypes::All => "trắc nghiệm (mcq), đúng/sai (tf), và điền khuyết (fill)",
      QuestionTypes::Mcq => "mcq",
      QuestionTypes::Tf => "tf",
      QuestionTypes::Fill => "fill",
    }
  }
}

pub const EXTRACTION_RATIO_RANGE: (u32, u32) = (5, 50);
pub const SUMMARY_LENGTH_RANGE: (u32, u32) = (30, 150);
pub const NUM_QUESTIONS_RANGE: (u32, u32) = (1, 10);

/// Per-request knobs coming from the settings panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessingConfig {
  /// Share of sentences (percent) to keep as "important".
  pub extraction_ratio: u32,
  /// Target summary length in words.
  pub summary_length: u32,
  pub num_questions: u32,
  pub question_types: QuestionTypes,
  /// Accepted and carried, but long inputs are not split yet.
  pub enable_chunking: bool,
}

impl Default for ProcessingConfig {
  fn default() -> Self {
    Self {
      extraction_ratio: 20,
      summary_length: 75,
      num_questions: 4,
      question_types: QuestionTypes::All,
      enable_chunking: true,
    }
  }
}

impl ProcessingConfig {
  /// Clamp every numeric knob into its allowed range, warning on each change.
  pub fn clamped(self) -> Self {
    Self {
      extraction_ratio: clamp_knob("extraction_ratio", self.extraction_ratio, EXTRACTION_RATIO_RANGE),
      summary_length: clamp_knob("summary_length", self.summary_length, SUMMARY_LENGTH_RANGE),
      num_questions: clamp_knob("num_questions", self.num_questions, NUM_QUESTIONS_RANGE),
      ..self
    }
  }
}

fn clamp_knob(name: &str, value: u32, (lo, hi): (u32, u32)) -> u32 {
  let clamped = value.clamp(lo, hi);
  if clamped != value {
    warn!(target: "vnqgen", knob = name, value, clamped, "Config value out of range; clamped");
  }
  clamped
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn question_items_use_type_tag() {
    let q = QuestionItem::Mcq {
      question: "Thủ đô của Việt Nam?".into(),
      answers: vec!["Hà Nội".into(), "Huế".into()],
      correct_index: 0,
    };
    let v = serde_json::to_value(&q).unwrap();
    assert_eq!(v["type"], "mcq");
    assert_eq!(v["correct_index"], 0);

    let tf: QuestionItem = serde_json::from_value(json!({"type": "tf", "question": "Đúng?", "answer": true})).unwrap();
    assert_eq!(tf, QuestionItem::Tf { question: "Đúng?".into(), answer: true });
    assert_eq!(tf.question(), "Đúng?");
  }

  #[test]
  fn entities_accept_strings_and_objects() {
    let v = json!(["Hồ Chí Minh", {"name": "Ba Đình", "label": "LOC"}, {"text": "1945", "type": "DATE"}]);
    let ents: Vec<Entity> = serde_json::from_value(v).unwrap();
    assert_eq!(ents[0], Entity::Name("Hồ Chí Minh".into()));
    assert_eq!(ents[1], Entity::Labeled { name: "Ba Đình".into(), label: Some("LOC".into()) });
    assert_eq!(ents[2], Entity::Labeled { name: "1945".into(), label: Some("DATE".into()) });
  }

  #[test]
  fn entity_with_mixed_key_spellings_keeps_first_name() {
    let v = json!({"name": "Hà Nội", "text": "Thủ đô", "type": "LOC", "label": "GPE"});
    let e: Entity = serde_json::from_value(v).unwrap();
    assert_eq!(e, Entity::Labeled { name: "Hà Nội".into(), label: Some("GPE".into()) });

    let e: Entity = serde_json::from_value(json!({"entity": "Huế", "type": "LOC", "score": 0.9})).unwrap();
    assert_eq!(e, Entity::Labeled { name: "Huế".into(), label: Some("LOC".into()) });

    assert!(serde_json::from_value::<Entity>(json!({"label": "PER"})).is_err());
    assert!(serde_json::from_value::<Entity>(json!(42)).is_err());
  }

  #[test]
  fn summary_serializes_wire_names() {
    let s = SummaryResult {
      base_summary: "a".into(),
      enhanced_summary: "b".into(),
      summary_length_words: 5,
      rouge_score: 0.42,
    };
    let v = serde_json::to_value(&s).unwrap();
    assert_eq!(v["summary_length"], 5);
    assert_eq!(v["rouge_score"], 0.42);
  }

  #[test]
  fn processing_config_partial_camel_case_and_clamp() {
    let cfg: ProcessingConfig =
      serde_json::from_value(json!({"numQuestions": 25, "questionTypes": "tf", "summaryLength": 10})).unwrap();
    assert_eq!(cfg.extraction_ratio, 20);
    assert_eq!(cfg.question_types, QuestionTypes::Tf);
    let cfg = cfg.clamped();
    assert_eq!(cfg.num_questions, 10);
    assert_eq!(cfg.summary_length, 30);
    assert!(cfg.enable_chunking);
  }

  #[test]
  fn all_types_label_lists_three_kinds() {
    let label = QuestionTypes::All.prompt_label();
    assert!(label.contains("mcq") && label.contains("tf") && label.contains("fill"));
    assert_eq!(QuestionTypes::Fill.prompt_label(), "fill");
  }
}
