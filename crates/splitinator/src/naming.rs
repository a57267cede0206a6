//! Grammars for pulling `(--name: value)` pairs out of container query
//! params and synthesizing variable/class names from them.

use std::error::Error;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static VARIABLE_PAIR_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\(\s*--(.*?)\s*:\s*(.*?)\s*\)").expect("variable pair regex"));

static WHERE_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^:where\((.*?)\)$").expect("where guard regex"));

static BASE_SELECTOR_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^\.([a-z]+-?(?:[A-Z]\w+-{0,2})*)").expect("base selector regex"));

static DASH_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("dash run regex"));

/// Container query params held no `(--name: value)` pair, so no variable
/// name can be derived.
#[derive(Clone, Debug)]
pub struct MissingContainerVariable {
  pub params: String,
}

impl fmt::Display for MissingContainerVariable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "no custom property found in container query params \"{}\"",
      self.params
    )
  }
}

impl Error for MissingContainerVariable {}

/// Every `(--name: value)` pair in the params, halves trimmed. Pairs with
/// an empty half are kept; callers decide whether they are usable.
pub fn container_variable_pairs(params: &str) -> Vec<(String, String)> {
  VARIABLE_PAIR_RE
    .captures_iter(params)
    .map(|caps| (caps[1].to_string(), caps[2].to_string()))
    .collect()
}

/// Derive the flattened variable name for one compound selector and
/// declaration inside a container query.
///
/// Only the first variable pair counts. Its value leads the name, then the
/// base component stripped from the selector (and from the property, when
/// the property starts with it), the remaining `.`-separated selector
/// tokens, the property minus its `--` prefix, and finally an `is-` state
/// token minus its prefix.
pub fn reference_property_name(
  selector: &str,
  prop: &str,
  params: &str,
) -> Result<String, MissingContainerVariable> {
  let mut selector = selector.to_string();
  if let Some(caps) = WHERE_RE.captures(&selector) {
    selector = caps[1].to_string();
  }

  let caps = VARIABLE_PAIR_RE
    .captures(params)
    .ok_or_else(|| MissingContainerVariable {
      params: params.to_string(),
    })?;
  let name = caps[1].to_string();
  let value = caps[2].to_string();

  let mut parts: Vec<String> = Vec::new();
  if !name.is_empty() && !value.is_empty() {
    parts.push(value);
  }

  let mut property = prop.to_string();
  if let Some(base_caps) = BASE_SELECTOR_RE.captures(&selector) {
    let base = base_caps[1].to_string();
    // Drop the base component from properties that repeat it, e.g.
    // `.spectrum-Button` + `--spectrum-Button-padding`; unrelated
    // properties keep their full name.
    if let Some(rest) = property.strip_prefix(&format!("--{}-", base)) {
      property = format!("--{}", rest);
    }
    selector = selector.replacen(&base, "", 1);
    parts.push(base);
  }

  let cleaned: String = selector
    .chars()
    .filter(|c| !c.is_whitespace() && *c != ',')
    .collect();
  let mut tokens: Vec<String> = cleaned
    .split('.')
    .filter(|token| !token.is_empty())
    .map(str::to_string)
    .collect();

  let state = tokens
    .iter()
    .position(|token| token.starts_with("is-"))
    .map(|index| tokens.remove(index));

  parts.extend(tokens);
  parts.push(property.strip_prefix("--").unwrap_or(&property).to_string());
  if let Some(state) = state {
    parts.push(state.strip_prefix("is-").unwrap_or(&state).to_string());
  }

  let joined = parts.join("-");
  let collapsed = DASH_RUN_RE.replace_all(&joined, "-");
  Ok(format!("--{}", collapsed.to_lowercase()))
}

/// Derive the synthetic class selector for a container query. One
/// `.`-segment per usable pair; the namespace prefixes a segment only when
/// it differs from the pair's value. `None` means skip the container.
pub fn reference_container_class(params: &str, namespace: Option<&str>) -> Option<String> {
  let mut class = String::new();
  for (name, value) in container_variable_pairs(params) {
    if name.is_empty() || value.is_empty() {
      continue;
    }
    let prefix = match namespace {
      Some(ns) if ns != value => format!("{}--", ns),
      _ => String::new(),
    };
    class.push('.');
    class.push_str(&prefix);
    class.push_str(&value);
  }
  if class.is_empty() {
    None
  } else {
    Some(class)
  }
}
