//! Response normalization: free-form model text in, validated domain object out.
//!
//! Model output is not guaranteed to be pure JSON. It may be fenced in
//! markdown, wrapped in prose, or cut off. Recovery is layered:
//!
//! 1. strip code fences and control characters, trim;
//! 2. if the text spans a `{ ... }` region, parse the whole cleaned text;
//! 3. parse each balanced `{...}` / `[...]` region in turn, keeping the
//!    first one that fits the expected shape;
//! 4. parse the whole cleaned text;
//! 5. otherwise sniff the raw text and resolve a degraded-mode fallback
//!    (see [`resolve_fallback`]).
//!
//! Parsed JSON is then validated against the expected shape. Nothing here
//! returns an error: the worst case is `None`, which the task operations turn
//! into their own fallback object.

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::domain::{AnalysisResult, Entity, QuestionItem, QuestionSet, SummaryResult};
use crate::placeholders::{placeholder_analysis, placeholder_question, placeholder_summary};
use crate::util::trunc_for_log;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
  Analysis,
  Summary,
  Questions,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Normalized {
  Analysis(AnalysisResult),
  Summary(SummaryResult),
  Questions(QuestionSet),
}

impl Normalized {
  pub fn shape(&self) -> Shape {
    match self {
      Normalized::Analysis(_) => Shape::Analysis,
      Normalized::Summary(_) => Shape::Summary,
      Normalized::Questions(_) => Shape::Questions,
    }
  }
}

/// Turn raw model text into a domain object of the expected shape, if possible.
#[instrument(level = "debug", skip(raw), fields(raw_len = raw.len()))]
pub fn normalize(raw: &str, shape: Shape) -> Option<Normalized> {
  let cleaned = clean_text(raw);
  let candidates = json_candidates(&cleaned);
  if !candidates.is_empty() {
    let out = candidates.iter().find_map(|value| from_value(value, shape));
    if out.is_none() {
      warn!(target: "normalize", ?shape, parsed = candidates.len(), "Parsed JSON does not fit the expected shape");
    }
    return out;
  }

  warn!(target: "normalize", ?shape, raw = %trunc_for_log(raw, 200), "No JSON recovered; using degraded-mode fallback");
  let out = resolve_fallback(raw).into_shape(shape);
  debug!(target: "normalize", ?shape, recovered = out.is_some(), "Fallback resolved");
  out
}

pub fn normalize_analysis(raw: &str) -> Option<AnalysisResult> {
  match normalize(raw, Shape::Analysis)? {
    Normalized::Analysis(a) => Some(a),
    _ => None,
  }
}

pub fn normalize_summary(raw: &str) -> Option<SummaryResult> {
  match normalize(raw, Shape::Summary)? {
    Normalized::Summary(s) => Some(s),
    _ => None,
  }
}

pub fn normalize_questions(raw: &str) -> Option<QuestionSet> {
  match normalize(raw, Shape::Questions)? {
    Normalized::Questions(q) => Some(q),
    _ => None,
  }
}

/// Remove markdown code fences and control characters, then trim.
pub fn clean_text(raw: &str) -> String {
  raw
    .replace("```json", "")
    .replace("```", "")
    .chars()
    .filter(|c| !c.is_control())
    .collect::<String>()
    .trim()
    .to_string()
}

/// Layered JSON recovery over already-cleaned text, in preference order.
///
/// A whole-text parse wins outright. Otherwise every balanced region that
/// parses is a candidate, so a bracket in leading prose does not hide the
/// document that follows it.
pub fn json_candidates(cleaned: &str) -> Vec<Value> {
  if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
    if end > start && is_enclosed(cleaned[start..=end].trim()) {
      if let Ok(v) = serde_json::from_str(cleaned) {
        return vec![v];
      }
    }
  }

  let mut out: Vec<Value> = balanced_regions(cleaned)
    .into_iter()
    .filter_map(|region| serde_json::from_str(region).ok())
    .collect();

  if out.is_empty() {
    if let Ok(v) = serde_json::from_str(cleaned) {
      out.push(v);
    }
  }
  out
}

fn is_enclosed(s: &str) -> bool {
  matches!((s.chars().next(), s.chars().last()), (Some('{'), Some('}')) | (Some('['), Some(']')))
}

/// Byte index just past the bracket that closes the one at `start`.
/// Brackets inside JSON strings are ignored; a mismatched closer aborts.
fn scan_balanced(text: &str, start: usize) -> Option<usize> {
  let mut stack: Vec<char> = Vec::new();
  let mut in_string = false;
  let mut escape_next = false;

  for (i, ch) in text[start..].char_indices() {
    if in_string {
      if escape_next {
        escape_next = false;
      } else if ch == '\\' {
        escape_next = true;
      } else if ch == '"' {
        in_string = false;
      }
      continue;
    }
    match ch {
      '"' => in_string = true,
      '{' => stack.push('}'),
      '[' => stack.push(']'),
      '}' | ']' => {
        if stack.pop() != Some(ch) {
          return None;
        }
        if stack.is_empty() {
          return Some(start + i + 1);
        }
      }
      _ => {}
    }
  }
  None
}

/// Complete top-level `{...}` / `[...]` regions, left to right. Scanning
/// stops at the first opener that never closes: whatever follows it belongs
/// to a cut-off document and is left to the fragment fallback.
fn balanced_regions(text: &str) -> Vec<&str> {
  let mut out = Vec::new();
  let mut pos = 0;
  while let Some(offset) = text[pos..].find(['{', '[']) {
    let start = pos + offset;
    let Some(end) = scan_balanced(text, start) else { break };
    out.push(&text[start..end]);
    pos = end;
  }
  out
}

/// Every complete top-level `{...}` fragment. An unclosed opener is skipped
/// and scanning resumes at the next `{`.
fn balanced_objects(text: &str) -> Vec<&str> {
  let mut out = Vec::new();
  let mut pos = 0;
  while let Some(offset) = text[pos..].find('{') {
    let start = pos + offset;
    match scan_balanced(text, start) {
      Some(end) => {
        out.push(&text[start..end]);
        pos = end;
      }
      None => pos = start + 1,
    }
  }
  out
}

/// Degraded-mode result chosen by sniffing the raw text.
#[derive(Clone, Debug, PartialEq)]
pub enum Fallback {
  Questions(QuestionSet),
  Analysis(AnalysisResult),
  Summary(SummaryResult),
  Unrecognized,
}

impl Fallback {
  /// Keep the fallback only if it matches what the caller asked for.
  pub fn into_shape(self, shape: Shape) -> Option<Normalized> {
    let out = match self {
      Fallback::Questions(q) if !q.is_empty() => Normalized::Questions(q),
      Fallback::Analysis(a) => Normalized::Analysis(a),
      Fallback::Summary(s) => Normalized::Summary(s),
      _ => return None,
    };
    (out.shape() == shape).then_some(out)
  }
}

/// Last-resort recovery for text that holds no parseable JSON document.
///
/// Question-like text is split into individual object fragments, each parsed
/// on its own; fragments that fail become the canonical placeholder item.
/// Analysis- or summary-like text yields the canonical placeholder object.
/// This is substring sniffing and is only as reliable as that.
pub fn resolve_fallback(raw: &str) -> Fallback {
  if raw.contains("\"question\"") && raw.contains("\"type\"") {
    let cleaned = clean_text(raw);
    let items = balanced_objects(&cleaned)
      .into_iter()
      .map(|frag| {
        serde_json::from_str::<Value>(frag)
          .ok()
          .and_then(|v| question_from_value(&v))
          .unwrap_or_else(placeholder_question)
      })
      .collect();
    Fallback::Questions(items)
  } else if raw.contains("keywords") || raw.contains("important_sentences") {
    Fallback::Analysis(placeholder_analysis())
  } else if raw.contains("summary") || raw.contains("enhanced_summary") {
    Fallback::Summary(placeholder_summary())
  } else {
    Fallback::Unrecognized
  }
}

fn from_value(value: &Value, shape: Shape) -> Option<Normalized> {
  match shape {
    Shape::Analysis => analysis_from_value(value).map(Normalized::Analysis),
    Shape::Summary => summary_from_value(value).map(Normalized::Summary),
    Shape::Questions => questions_from_value(value).map(Normalized::Questions),
  }
}

fn analysis_from_value(value: &Value) -> Option<AnalysisResult> {
  let obj = value.as_object()?;
  if !["keywords", "important_sentences", "entities"].iter().any(|k| obj.contains_key(*k)) {
    return None;
  }
  let entities = match obj.get("entities") {
    Some(Value::Array(items)) => items
      .iter()
      .filter_map(|e| serde_json::from_value::<Entity>(e.clone()).ok())
      .collect(),
    _ => Vec::new(),
  };
  Some(AnalysisResult {
    keywords: string_list(obj.get("keywords")),
    important_sentences: string_list(obj.get("important_sentences")),
    entities,
  })
}

/// Non-empty trimmed strings from an array (or a lone string).
fn string_list(value: Option<&Value>) -> Vec<String> {
  let items: Vec<&Value> = match value {
    Some(Value::Array(items)) => items.iter().collect(),
    Some(v @ Value::String(_)) => vec![v],
    _ => Vec::new(),
  };
  items
    .into_iter()
    .filter_map(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}

fn summary_from_value(value: &Value) -> Option<SummaryResult> {
  let obj = value.as_object()?;
  let base = obj.get("base_summary").and_then(Value::as_str);
  let enhanced = obj.get("enhanced_summary").and_then(Value::as_str);
  if base.is_none() && enhanced.is_none() {
    return None;
  }
  let rouge = obj.get("rouge_score").and_then(as_number).unwrap_or(0.0);
  Some(SummaryResult {
    base_summary: base.unwrap_or_default().trim().to_string(),
    enhanced_summary: enhanced.unwrap_or_default().trim().to_string(),
    summary_length_words: obj
      .get("summary_length")
      .and_then(as_number)
      .map(|n| n.max(0.0).round().min(u32::MAX as f64) as u32)
      .unwrap_or(0),
    rouge_score: if rouge.is_finite() { rouge.clamp(0.0, 1.0) } else { 0.0 },
  })
}

/// A JSON number or a numeric string.
fn as_number(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn questions_from_value(value: &Value) -> Option<QuestionSet> {
  let items: Vec<&Value> = match value {
    Value::Array(items) => items.iter().collect(),
    Value::Object(obj) => match obj.get("questions") {
      Some(Value::Array(items)) => items.iter().collect(),
      _ if obj.contains_key("question") => vec![value],
      _ => return None,
    },
    _ => return None,
  };
  if items.is_empty() {
    return None;
  }
  Some(
    items
      .into_iter()
      .map(|item| {
        question_from_value(item).unwrap_or_else(|| {
          debug!(target: "normalize", item = %trunc_for_log(&item.to_string(), 120), "Invalid question item replaced");
          placeholder_question()
        })
      })
      .collect(),
  )
}

/// Validate one question object. `None` means "replace with a placeholder".
pub fn question_from_value(value: &Value) -> Option<QuestionItem> {
  let obj = value.as_object()?;
  let question = obj.get("question")?.as_str()?.trim();
  if question.is_empty() {
    return None;
  }
  let question = question.to_string();

  let kind = match obj.get("type").and_then(Value::as_str) {
    Some(t) => t.trim().to_lowercase(),
    None => infer_kind(obj)?.to_string(),
  };

  match kind.as_str() {
    "mcq" => {
      let answers = match obj.get("answers").or_else(|| obj.get("options"))? {
        Value::Array(items) => items.iter().map(answer_text).collect::<Option<Vec<_>>>()?,
        _ => return None,
      };
      let correct_index = obj.get("correct_index").or_else(|| obj.get("correctIndex"))?.as_u64()? as usize;
      if answers.len() < 2 || correct_index >= answers.len() {
        return None;
      }
      Some(QuestionItem::Mcq { question, answers, correct_index })
    }
    "tf" => {
      let answer = match obj.get("answer")? {
        Value::Bool(b) => *b,
        Value::String(s) => match s.trim().to_lowercase().as_str() {
          "true" | "đúng" => true,
          "false" | "sai" => false,
          _ => return None,
        },
        _ => return None,
      };
      Some(QuestionItem::Tf { question, answer })
    }
    "fill" => {
      let answer = answer_text(obj.get("answer")?)?;
      if answer.trim().is_empty() {
        return None;
      }
      Some(QuestionItem::Fill { question, answer })
    }
    _ => None,
  }
}

fn infer_kind(obj: &Map<String, Value>) -> Option<&'static str> {
  if obj.contains_key("answers") {
    return Some("mcq");
  }
  match obj.get("answer")? {
    Value::Bool(_) => Some("tf"),
    _ => Some("fill"),
  }
}

fn answer_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}
