//! Plain-text rendering of a question set, the one downloadable artifact.

use std::fmt::Write;

use crate::domain::QuestionItem;

pub const EXPORT_FILE_NAME: &str = "cau-hoi-trac-nghiem.txt";
const HEADER: &str = "CÂU HỎI TRẮC NGHIỆM";
const CORRECT_MARK: &str = " ✓";

/// Numbered from 1, options lettered A, B, C..., a blank line after each question.
pub fn render_questions(questions: &[QuestionItem]) -> String {
  let mut out = format!("{HEADER}\n\n");
  for (i, q) in questions.iter().enumerate() {
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{}. {}", i + 1, q.question());
    match q {
      QuestionItem::Mcq { answers, correct_index, .. } => {
        for (j, answer) in answers.iter().enumerate() {
          let mark = if j == *correct_index { CORRECT_MARK } else { "" };
          let _ = writeln!(out, "   {}. {}{}", option_letter(j), answer, mark);
        }
      }
      QuestionItem::Tf { answer, .. } => {
        let _ = writeln!(out, "   Đáp án: {}", if *answer { "Đúng" } else { "Sai" });
      }
      QuestionItem::Fill { answer, .. } => {
        let _ = writeln!(out, "   Đáp án: {}", answer);
      }
    }
    out.push('\n');
  }
  out
}

/// A..Z, then AA, AB, ... for unusually long option lists.
fn option_letter(index: usize) -> String {
  let mut n = index;
  let mut letters = Vec::new();
  loop {
    letters.push((b'A' + (n % 26) as u8) as char);
    if n < 26 {
      break;
    }
    n = n / 26 - 1;
  }
  letters.iter().rev().collect()
}
