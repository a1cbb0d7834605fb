//! Backend response envelope and text extraction.
//!
//! The generateContent response is loosely typed: every level may be missing
//! and the first part may be a bare string or an object carrying `text`.
//! Each level is modeled as an `Option` so navigation yields an explicit
//! absence instead of a panic.

use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
  #[serde(default)]
  pub candidates: Option<Vec<Candidate>>,
  #[serde(default)]
  pub usage_metadata: Option<UsageMetadata>,
  #[serde(default)]
  pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
  #[serde(default)]
  pub content: Option<Content>,
  #[serde(default)]
  pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Content {
  #[serde(default)]
  pub parts: Option<Vec<Part>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Part {
  Text(String),
  Object {
    #[serde(default)]
    text: Option<String>,
  },
  Other(serde_json::Value),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
  #[serde(default)]
  pub prompt_token_count: Option<u32>,
  #[serde(default)]
  pub candidates_token_count: Option<u32>,
  #[serde(default)]
  pub total_token_count: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
  #[serde(default)]
  pub block_reason: Option<String>,
}

impl ResponseEnvelope {
  /// Envelope holding a single text part.
  #[cfg(test)]
  pub fn from_text(text: impl Into<String>) -> Self {
    Self {
      candidates: Some(vec![Candidate {
        content: Some(Content { parts: Some(vec![Part::Text(text.into())]) }),
        finish_reason: None,
      }]),
      ..Self::default()
    }
  }

  /// Decode a response body; anything undecodable becomes an empty envelope.
  pub fn from_body(body: &str) -> Self {
    serde_json::from_str(body).unwrap_or_default()
  }

  fn first_part(&self) -> Option<&Part> {
    self.candidates.as_ref()?.first()?.content.as_ref()?.parts.as_ref()?.first()
  }

  /// Why the first candidate stopped, e.g. "SAFETY" or "MAX_TOKENS".
  pub fn finish_reason(&self) -> Option<&str> {
    self.candidates.as_ref()?.first()?.finish_reason.as_deref()
  }

  /// Text of the first part of the first candidate, or "" when absent.
  pub fn text(&self) -> String {
    match self.first_part() {
      Some(Part::Text(s)) => s.clone(),
      Some(Part::Object { text: Some(s) }) => s.clone(),
      _ => String::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_text_from_object_part() {
    let body = r#"{"candidates":[{"content":{"parts":[{"text":"Xin chào"}],"role":"model"},"finishReason":"STOP"}],
                   "usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":2,"totalTokenCount":7}}"#;
    let env = ResponseEnvelope::from_body(body);
    assert_eq!(env.text(), "Xin chào");
    assert_eq!(env.finish_reason(), Some("STOP"));
    assert_eq!(env.usage_metadata.and_then(|u| u.total_token_count), Some(7));
  }

  #[test]
  fn extracts_text_from_string_part() {
    let env = ResponseEnvelope::from_body(r#"{"candidates":[{"content":{"parts":["plain"]}}]}"#);
    assert_eq!(env.text(), "plain");
  }

  #[test]
  fn missing_levels_yield_empty_text() {
    for body in [
      "{}",
      r#"{"candidates":[]}"#,
      r#"{"candidates":[{}]}"#,
      r#"{"candidates":[{"content":{}}]}"#,
      r#"{"candidates":[{"content":{"parts":[]}}]}"#,
      r#"{"candidates":[{"content":{"parts":[{"inlineData":{}}]}}]}"#,
      r#"{"candidates":[{"content":{"parts":[42]}}]}"#,
      "not json at all",
      r#"{"candidates":"oops"}"#,
    ] {
      assert_eq!(ResponseEnvelope::from_body(body).text(), "", "body: {body}");
    }
  }

  #[test]
  fn block_reason_is_decoded() {
    let env = ResponseEnvelope::from_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
    assert_eq!(env.prompt_feedback.and_then(|p| p.block_reason).as_deref(), Some("SAFETY"));
    assert_eq!(ResponseEnvelope::from_text("x").text(), "x");
  }
}
