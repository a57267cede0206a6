//! Run-scoped collection of replacement declarations, bucketed per
//! selector, emitted as consolidated rules at the document end.

use indexmap::IndexMap;
use postcss::{declaration_with_raws, rule_with_raws, NodeAccess, RawData, Root};

/// A replacement declaration held as plain data until emission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplacementDecl {
  pub prop: String,
  pub value: String,
  pub important: bool,
  pub raws: RawData,
}

/// Selector-keyed buckets in first-insertion order.
#[derive(Default)]
pub struct SelectorBuckets {
  buckets: IndexMap<String, Vec<ReplacementDecl>>,
}

impl SelectorBuckets {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a replacement for a selector. Identical (property, value)
  /// pairs are deduplicated per selector; returns whether the entry was
  /// actually added.
  pub fn record(&mut self, selector: &str, decl: ReplacementDecl) -> bool {
    let bucket = self.buckets.entry(selector.to_string()).or_default();
    if bucket
      .iter()
      .any(|existing| existing.prop == decl.prop && existing.value == decl.value)
    {
      return false;
    }
    bucket.push(decl);
    true
  }

  pub fn is_empty(&self) -> bool {
    self.buckets.is_empty()
  }

  /// Append one rule per selector to the end of the document, selectors in
  /// first-insertion order, declarations in accumulation order.
  pub fn emit(&self, root: &Root) {
    for (selector, decls) in &self.buckets {
      let mut raws = RawData::default();
      raws.set("before", "\n  ");
      raws.set_flag("semicolon", true);
      let rule = rule_with_raws(selector.clone(), raws);
      rule.borrow_mut().source = root.borrow().source.clone();

      for decl in decls {
        let node = declaration_with_raws(
          decl.prop.clone(),
          decl.value.clone(),
          decl.important,
          decl.raws.clone(),
        );
        postcss::Node::append(&rule, node);
      }
      root.append(rule);
    }
  }
}
