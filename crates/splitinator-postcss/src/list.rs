//! Selector/value list splitting with quote, parenthesis, and escape
//! awareness. `comma` is what hook code uses to take a selector list apart
//! member by member.

fn split(value: &str, separators: &[char], keep_last: bool) -> Vec<String> {
  let mut parts = Vec::new();
  let mut current = String::new();

  let mut in_quote = false;
  let mut quote_char = '\0';
  let mut escaped = false;
  let mut depth = 0u32;

  for ch in value.chars() {
    if escaped {
      escaped = false;
      current.push(ch);
      continue;
    }

    if in_quote {
      if ch == quote_char {
        in_quote = false;
      } else if ch == '\\' {
        escaped = true;
      }
      current.push(ch);
      continue;
    }

    match ch {
      '"' | '\'' => {
        in_quote = true;
        quote_char = ch;
        current.push(ch);
      }
      '\\' => {
        escaped = true;
        current.push(ch);
      }
      '(' => {
        depth += 1;
        current.push(ch);
      }
      ')' => {
        depth = depth.saturating_sub(1);
        current.push(ch);
      }
      _ if depth == 0 && separators.contains(&ch) => {
        parts.push(std::mem::take(&mut current));
      }
      _ => current.push(ch),
    }
  }

  if keep_last || !current.is_empty() {
    parts.push(current);
  }
  parts
}

/// Split a comma-separated list. Members are trimmed; a trailing empty
/// member (from a trailing comma) is preserved.
pub fn comma(value: &str) -> Vec<String> {
  split(value, &[','], true)
    .into_iter()
    .map(|part| part.trim().to_string())
    .collect()
}

/// Split on runs of whitespace outside quotes and parentheses.
pub fn space(value: &str) -> Vec<String> {
  split(value, &[' ', '\n', '\t'], false)
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect()
}
