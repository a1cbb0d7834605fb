//! Canonical placeholder content.
//!
//! These fixed values stand in for model output that could not be recovered,
//! so callers always receive a well-shaped object. Two families exist:
//! the heuristic placeholders returned by the normalizer when it recognizes
//! the kind of response but cannot parse it, and the task fallbacks used when
//! normalization yields nothing at all.

use crate::domain::{AnalysisResult, Entity, QuestionItem, QuestionSet, SummaryResult};

/// Substitute for a single question fragment that failed to parse or validate.
pub fn placeholder_question() -> QuestionItem {
  QuestionItem::Mcq {
    question: "Không thể parse câu hỏi".into(),
    answers: vec!["A".into(), "B".into(), "C".into()],
    correct_index: 0,
  }
}

/// Analysis-shaped response recognized but unparseable.
pub fn placeholder_analysis() -> AnalysisResult {
  AnalysisResult {
    keywords: vec!["Không thể phân tích văn bản".into()],
    important_sentences: vec!["Không thể trích xuất câu quan trọng từ dữ liệu API.".into()],
    entities: vec![Entity::Name("Không thể nhận diện thực thể".into())],
  }
}

/// Summary-shaped response recognized but unparseable. Also the task fallback.
pub fn placeholder_summary() -> SummaryResult {
  SummaryResult {
    base_summary: "Không thể tạo tóm tắt.".into(),
    enhanced_summary: "API không thể tạo tóm tắt cho văn bản này.".into(),
    summary_length_words: 0,
    rouge_score: 0.0,
  }
}

pub fn fallback_analysis() -> AnalysisResult {
  AnalysisResult {
    keywords: vec!["API error".into()],
    important_sentences: vec!["Không thể phân tích văn bản.".into()],
    entities: Vec::new(),
  }
}

pub fn fallback_summary() -> SummaryResult {
  placeholder_summary()
}

pub fn fallback_questions() -> QuestionSet {
  vec![QuestionItem::Mcq {
    question: "Không thể tạo câu hỏi từ API.".into(),
    answers: vec!["Error".into(), "API failed".into(), "Try again".into()],
    correct_index: 0,
  }]
}
