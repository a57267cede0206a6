use std::sync::Arc;

use indoc::indoc;
use postcss::{ProcessOptions, Processor};
use pretty_assertions::assert_eq;
use serde_json::json;
use splitinator::{splitinator, splitinator_from_json, SplitinatorOptions};

fn process(options: SplitinatorOptions, css: &str) -> postcss::Result {
  Processor::new()
    .plugin(splitinator(options))
    .process(css)
    .expect("processing failed")
}

#[test]
fn flattens_a_container_into_class_and_selector_rules() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: spacious) {
        .foo.is-active {
          --color: blue;
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .spacious {
        --spacious-foo-color-active: blue;
      }
        .foo.is-active {
        --color: var(--spacious-foo-color-active);
      }
    "}
  );
  assert!(result.warnings().is_empty());
}

#[test]
fn preserves_existing_fallback_chains() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: spacious) {
        .foo {
          --color: var(--base, var(--mid));
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .spacious {
        --spacious-foo-color: var(--base, var(--mid));
      }
        .foo {
        --color: var(--base, var(--spacious-foo-color, var(--mid)));
      }
    "}
  );
}

#[test]
fn splits_selector_lists_per_compound_selector() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: compact) {
        .a, .b {
          --gap: 4px;
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .compact {
        --compact-a-gap: 4px;
        --compact-b-gap: 4px;
      }
        .a {
        --gap: var(--compact-a-gap);
      }
        .b {
        --gap: var(--compact-b-gap);
      }
    "}
  );
}

#[test]
fn namespace_prefixes_the_class_unless_it_matches_the_value() {
  let mut result = process(
    SplitinatorOptions {
      namespace: Some("theme".into()),
      ..Default::default()
    },
    indoc! {"
      @container (--density: spacious) {
        .foo {
          --color: blue;
        }
      }
    "},
  );
  assert!(result.css().starts_with(".theme--spacious {"));

  let mut result = process(
    SplitinatorOptions {
      namespace: Some("theme".into()),
      ..Default::default()
    },
    indoc! {"
      @container (--theme: theme) {
        .foo {
          --color: blue;
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .theme {
        --theme-foo-color: blue;
      }
        .foo {
        --color: var(--theme-foo-color);
      }
    "}
  );
}

#[test]
fn containers_without_variable_pairs_are_left_untouched() {
  let css = indoc! {"
    @container (min-width: 400px) {
      .a {
        --x: 1;
      }
    }
  "};
  let mut result = process(SplitinatorOptions::default(), css);
  assert_eq!(result.css(), css);
  assert!(result.warnings().is_empty());
}

#[test]
fn other_at_rules_pass_through() {
  let css = indoc! {"
    @media screen {
      .a {
        --x: 1;
      }
    }
  "};
  let mut result = process(SplitinatorOptions::default(), css);
  assert_eq!(result.css(), css);
}

#[test]
fn missing_container_variable_warns_and_leaves_the_container() {
  let css = indoc! {"
    @container (min-width: 400px) {
      .a {
        --x: 1;
      }
    }
  "};
  let mut result = process(
    SplitinatorOptions {
      create_class_from_container_query: Some(Arc::new(|_| Some(".forced".into()))),
      ..Default::default()
    },
    css,
  );
  assert_eq!(result.css(), css);
  assert_eq!(result.warnings().len(), 1);
  let warning = &result.warnings()[0];
  assert_eq!(warning.plugin.as_deref(), Some("postcss-splitinator"));
  assert_eq!(warning.line, Some(1));
  assert!(warning.text.contains("min-width"));
}

#[test]
fn rules_without_custom_properties_are_dropped_with_the_container() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: compact) {
        .a {
          color: red;
        }
        .b {
          --gap: 4px;
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .compact {
        --compact-b-gap: 4px;
      }
        .b {
        --gap: var(--compact-b-gap);
      }
    "}
  );
}

#[test]
fn nested_rule_declarations_are_processed_once_under_their_own_selector() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: compact) {
        .outer {
          .inner {
            --gap: 4px;
          }
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .compact {
        --compact-inner-gap: 4px;
      }
        .inner {
        --gap: var(--compact-inner-gap);
      }
    "}
  );
  let css = result.css().to_string();
  assert_eq!(css.matches("--gap:").count(), 1);
  assert!(!css.contains("--compact-outer-gap"));
}

#[test]
fn rules_with_empty_selectors_are_left_unplanned() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: compact) {
        {
          --gap: 4px;
        }
        .b {
          --x: 1px;
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .compact {
        --compact-b-x: 1px;
      }
        .b {
        --x: var(--compact-b-x);
      }
    "}
  );
  assert!(result.warnings().is_empty());
}

#[test]
fn surrounding_rules_keep_their_place() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      .before {
        color: red;
      }
      @container (--density: compact) {
        .foo {
          --gap: 4px;
        }
      }
      .after {
        color: blue;
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .before {
        color: red;
      }
      .compact {
        --compact-foo-gap: 4px;
      }
      .after {
        color: blue;
      }
        .foo {
        --gap: var(--compact-foo-gap);
      }
    "}
  );
}

#[test]
fn buckets_consolidate_across_containers_in_first_insertion_order() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: spacious) {
        .foo {
          --gap: 8px;
        }
      }
      @container (--density: compact) {
        .foo {
          --gap: 4px;
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .spacious {
        --spacious-foo-gap: 8px;
      }
      .compact {
        --compact-foo-gap: 4px;
      }
        .foo {
        --gap: var(--spacious-foo-gap);
        --gap: var(--compact-foo-gap);
      }
    "}
  );
}

#[test]
fn colliding_generated_names_warn_and_dedupe() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: spacious) {
        .foo {
          --gap: 4px;
        }
      }
      @container (--density: spacious) {
        .foo {
          --gap: 8px;
        }
      }
    "},
  );
  assert_eq!(result.warnings().len(), 1);
  assert!(result.warnings()[0]
    .text
    .contains("--spacious-foo-gap"));
  // The replacement is identical, so the bucket keeps a single entry.
  let css = result.css().to_string();
  assert_eq!(css.matches("--gap: var(--spacious-foo-gap);").count(), 1);
}

#[test]
fn no_flat_variables_keeps_the_empty_class_rule() {
  let mut result = process(
    SplitinatorOptions {
      no_flat_variables: Some(true),
      ..Default::default()
    },
    indoc! {"
      @container (--density: spacious) {
        .foo {
          --color: blue;
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .spacious {}
        .foo {
        --color: var(--spacious-foo-color);
      }
    "}
  );
}

#[test]
fn important_survives_into_flat_and_replacement_declarations() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: compact) {
        .foo {
          --gap: 4px !important;
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .compact {
        --compact-foo-gap: 4px !important;
      }
        .foo {
        --gap: var(--compact-foo-gap) !important;
      }
    "}
  );
}

#[test]
fn multi_pair_params_build_a_compound_class() {
  let mut result = process(
    SplitinatorOptions::default(),
    indoc! {"
      @container (--density: spacious) and (--scale: large) {
        .foo {
          --gap: 8px;
        }
      }
    "},
  );
  assert_eq!(
    result.css(),
    indoc! {"
      .spacious.large {
        --spacious-foo-gap: 8px;
      }
        .foo {
        --gap: var(--spacious-foo-gap);
      }
    "}
  );
}

#[test]
fn json_option_warnings_surface_in_the_result() {
  let plugin = splitinator_from_json(&json!({ "namespace": 5 }));
  let result = Processor::new()
    .plugin(plugin)
    .process("@container (--density: compact) { .a { --x: 1; } }")
    .expect("processing failed");
  assert_eq!(result.warnings().len(), 1);
  let warning = &result.warnings()[0];
  assert_eq!(warning.plugin.as_deref(), Some("postcss-splitinator"));
  assert!(warning.text.contains("namespace"));
}

#[test]
fn json_options_drive_the_reference_behavior() {
  let plugin = splitinator_from_json(&json!({ "namespace": "theme" }));
  let mut result = Processor::new()
    .plugin(plugin)
    .process(indoc! {"
      @container (--density: compact) {
        .foo {
          --gap: 4px;
        }
      }
    "})
    .expect("processing failed");
  assert!(result.css().starts_with(".theme--compact {"));
}

#[test]
fn process_options_carry_the_input_name() {
  let result = Processor::new()
    .plugin(splitinator(SplitinatorOptions::default()))
    .process_with_options(
      ".a { color: red }",
      ProcessOptions {
        from: Some("input.css".into()),
      },
    )
    .expect("processing failed");
  assert_eq!(result.from(), Some("input.css"));
}
