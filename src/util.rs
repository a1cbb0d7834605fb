//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// Pairs are applied in order, so user-provided text should come last.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings, on a char boundary.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  let total = s.chars().count();
  if total <= max_chars {
    s.to_string()
  } else {
    let head: String = s.chars().take(max_chars).collect();
    format!("{}… ({} chars total)", head, total)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_known_keys_only() {
    let out = fill_template("Tạo {n} câu hỏi: {text} {json}", &[("n", "4"), ("text", "Hà Nội")]);
    assert_eq!(out, "Tạo 4 câu hỏi: Hà Nội {json}");
  }

  #[test]
  fn user_text_filled_last_is_not_reinterpreted() {
    let out = fill_template("{n}|{text}", &[("n", "3"), ("text", "{n}")]);
    assert_eq!(out, "3|{n}");
  }

  #[test]
  fn trunc_respects_multibyte_chars() {
    let s = "Độc lập tự do hạnh phúc";
    assert_eq!(trunc_for_log(s, 100), s);
    let t = trunc_for_log(s, 3);
    let head: String = s.chars().take(3).collect();
    assert!(t.starts_with(&format!("{}…", head)));
    assert!(t.ends_with(&format!("({} chars total)", s.chars().count())));
  }
}
