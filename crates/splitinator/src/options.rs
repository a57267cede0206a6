//! Option intake. Typed callers use [`SplitinatorOptions`]; build configs
//! arrive as untyped JSON and go through the same normalization, which
//! never fails — invalid fields warn and fall back to the defaults.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::naming::{self, MissingContainerVariable};

/// Synthesizes the flattened variable name for one
/// (compound selector, property, container params) triple.
pub type PropertyNamer =
  Arc<dyn Fn(&str, &str, &str) -> Result<String, MissingContainerVariable> + Send + Sync>;

/// Synthesizes the class selector for a container's params; `None` skips
/// the container.
pub type ClassNamer = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Options as a Rust caller provides them. `None` everywhere means the
/// reference behavior.
#[derive(Clone, Default)]
pub struct SplitinatorOptions {
  pub namespace: Option<String>,
  pub create_property_name: Option<PropertyNamer>,
  pub create_class_from_container_query: Option<ClassNamer>,
  pub no_flat_variables: Option<bool>,
  pub no_selectors: Option<bool>,
  pub no_fallbacks: Option<bool>,
}

/// Options as they arrive from an untyped build config. Every field is an
/// arbitrary JSON value; unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOptions {
  pub namespace: Option<Value>,
  pub create_property_name: Option<Value>,
  pub create_class_from_container_query: Option<Value>,
  pub no_flat_variables: Option<Value>,
  pub no_selectors: Option<Value>,
  pub no_fallbacks: Option<Value>,
}

/// Immutable, fully-resolved configuration shared by every run.
#[derive(Clone)]
pub struct Config {
  pub namespace: Option<String>,
  pub property_namer: PropertyNamer,
  pub class_namer: ClassNamer,
  pub no_flat_variables: bool,
  pub no_selectors: bool,
  pub no_fallbacks: bool,
}

/// A rejected option value. Emitted through the warning channel during
/// `prepare`, so it lands in the run's structured diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionWarning {
  pub option: &'static str,
  pub expected: &'static str,
  pub text: String,
}

impl OptionWarning {
  fn new(option: &'static str, expected: &'static str) -> Self {
    OptionWarning {
      option,
      expected,
      text: format!(
        "Expected a {} for option \"{}\"; using the default instead.",
        expected, option
      ),
    }
  }
}

impl fmt::Display for OptionWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.text)
  }
}

pub(crate) fn reference_property_namer() -> PropertyNamer {
  Arc::new(|selector, prop, params| naming::reference_property_name(selector, prop, params))
}

pub(crate) fn reference_class_namer(namespace: Option<String>) -> ClassNamer {
  Arc::new(move |params| naming::reference_container_class(params, namespace.as_deref()))
}

/// Resolve typed options. Types already rule out every invalid shape, so
/// this path never warns.
pub(crate) fn normalize(options: SplitinatorOptions) -> (Config, Vec<OptionWarning>) {
  let namespace = options.namespace;
  let class_namer = options
    .create_class_from_container_query
    .unwrap_or_else(|| reference_class_namer(namespace.clone()));
  let config = Config {
    namespace,
    property_namer: options
      .create_property_name
      .unwrap_or_else(reference_property_namer),
    class_namer,
    no_flat_variables: options.no_flat_variables.unwrap_or(false),
    no_selectors: options.no_selectors.unwrap_or(false),
    no_fallbacks: options.no_fallbacks.unwrap_or(false),
  };
  (config, Vec::new())
}

fn truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(flag) => *flag,
    Value::Number(number) => number.as_f64().map(|f| f != 0.0).unwrap_or(true),
    Value::String(text) => !text.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

/// Resolve untyped options. A non-string `namespace` always warns and
/// falls back; wrong-typed boolean flags warn only when truthy (falsy
/// values fall back silently, mirroring the truthiness checks build
/// configs historically relied on).
pub(crate) fn normalize_json(value: &Value) -> (Config, Vec<OptionWarning>) {
  let raw: RawOptions = serde_json::from_value(value.clone()).unwrap_or_default();
  let mut warnings = Vec::new();

  let namespace = match raw.namespace {
    Some(Value::String(text)) => Some(text),
    Some(_) => {
      warnings.push(OptionWarning::new("namespace", "string"));
      None
    }
    None => None,
  };

  // Functions cannot cross the JSON boundary; any value there is a mistake.
  for (field, option) in [
    (&raw.create_property_name, "createPropertyName"),
    (
      &raw.create_class_from_container_query,
      "createClassFromContainerQuery",
    ),
  ] {
    if matches!(field, Some(value) if !value.is_null()) {
      warnings.push(OptionWarning::new(option, "function"));
    }
  }

  let mut flag = |value: Option<Value>, option: &'static str| match value {
    Some(Value::Bool(flag)) => flag,
    Some(value) => {
      if truthy(&value) {
        warnings.push(OptionWarning::new(option, "boolean"));
      }
      false
    }
    None => false,
  };

  let no_flat_variables = flag(raw.no_flat_variables, "noFlatVariables");
  let no_selectors = flag(raw.no_selectors, "noSelectors");
  let no_fallbacks = raw.no_fallbacks.as_ref().map(truthy).unwrap_or(false);

  let config = Config {
    namespace: namespace.clone(),
    property_namer: reference_property_namer(),
    class_namer: reference_class_namer(namespace),
    no_flat_variables,
    no_selectors,
    no_fallbacks,
  };
  (config, warnings)
}
