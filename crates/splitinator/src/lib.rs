//! `postcss-splitinator`: flattens container-query-encoded custom-property
//! variants into a synthetic per-variant class rule plus consolidated
//! selector rules that reference the generated variables through `var()`
//! fallback chains.
//!
//! ```
//! use splitinator::{splitinator, SplitinatorOptions};
//! use postcss::Processor;
//!
//! let css = "@container (--density: spacious) {\n  .foo {\n    --gap: 8px;\n  }\n}\n";
//! let mut result = Processor::new()
//!   .plugin(splitinator(SplitinatorOptions::default()))
//!   .process(css)
//!   .unwrap();
//! assert!(result.css().contains(".spacious"));
//! ```

use std::sync::{Arc, Mutex};

use postcss::{BuiltPlugin, Plugin, WarningOptions};

pub mod aggregate;
pub mod fallback;
pub mod naming;
pub mod options;
mod visitor;

pub use naming::MissingContainerVariable;
pub use options::{
  ClassNamer, Config, OptionWarning, PropertyNamer, RawOptions, SplitinatorOptions,
};

pub const PLUGIN_NAME: &str = "postcss-splitinator";

/// Build the plugin from typed options.
pub fn splitinator(options: SplitinatorOptions) -> BuiltPlugin {
  build(options::normalize(options))
}

/// Build the plugin from an untyped options object, as found in build
/// configs. Invalid fields warn and fall back to the defaults.
pub fn splitinator_from_json(value: &serde_json::Value) -> BuiltPlugin {
  build(options::normalize_json(value))
}

fn build((config, warnings): (Config, Vec<OptionWarning>)) -> BuiltPlugin {
  let config = Arc::new(config);
  let warnings = Arc::new(warnings);

  postcss::plugin(PLUGIN_NAME)
    .prepare(move |result| {
      for warning in warnings.iter() {
        result.warn(warning.to_string(), WarningOptions::new());
      }

      let state = Arc::new(Mutex::new(visitor::RunState::new()));
      let hook_state = Arc::clone(&state);
      let hook_config = Arc::clone(&config);
      let instance = postcss::plugin(PLUGIN_NAME)
        .at_rule(move |at_rule, result| {
          let mut state = hook_state.lock().unwrap();
          visitor::process_container(at_rule, &hook_config, &mut state, result)
        })
        .once_exit(move |root, _result| {
          state.lock().unwrap().buckets.emit(root);
          Ok(())
        })
        .build();
      Ok(Some(Arc::new(instance) as Arc<dyn Plugin>))
    })
    .build()
}
