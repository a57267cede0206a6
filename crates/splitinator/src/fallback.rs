//! Recognition of the two-level `var(A, var(B))` shape and composition of
//! replacement values that splice a generated variable into the chain.
//! Deeper nesting is opaque text by design.

use once_cell::sync::Lazy;
use regex::Regex;

static FALLBACK_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"var\(\s*(.*?)\s*,\s*var\(\s*(.*?)\s*\)\)").expect("fallback regex"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackParts {
  pub primary: String,
  pub fallback: Option<String>,
}

/// Pull apart a `var(A, var(B))` value. `None` for anything that does not
/// match the shape, including plain `var(A)`.
pub fn existing_fallback(value: &str) -> Option<FallbackParts> {
  let caps = FALLBACK_RE.captures(value)?;
  let primary = caps[1].to_string();
  let fallback = caps[2].to_string();
  Some(FallbackParts {
    primary,
    fallback: if fallback.is_empty() {
      None
    } else {
      Some(fallback)
    },
  })
}

/// Build the replacement value that routes the declaration through the
/// generated variable, preserving an existing fallback chain.
pub fn compose_replacement(value: &str, generated: &str) -> String {
  match existing_fallback(value) {
    None => format!("var({})", generated),
    Some(FallbackParts {
      primary,
      fallback: Some(fallback),
    }) => format!("var({}, var({}, var({})))", primary, generated, fallback),
    Some(FallbackParts {
      primary,
      fallback: None,
    }) => format!("var({}, var({}))", primary, generated),
  }
}
