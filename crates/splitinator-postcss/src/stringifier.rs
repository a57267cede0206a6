//! Tree-to-text emission. Formatting comes from each node's raws; missing
//! raws are detected from the rest of the document and cached on the root,
//! falling back to fixed defaults.

use std::rc::Rc;

use crate::ast::nodes::Root;
use crate::ast::{find_root, Node, NodeAccess, NodeData, NodeRef, RawCacheValue};

const DEFAULT_BEFORE_DECL: &str = "\n";
const DEFAULT_BEFORE_RULE: &str = "\n";
const DEFAULT_BEFORE_CLOSE: &str = "\n";
const DEFAULT_BEFORE_OPEN: &str = " ";
const DEFAULT_BEFORE_COMMENT: &str = "\n";
const DEFAULT_COLON: &str = ": ";
const DEFAULT_INDENT: &str = "    ";
const DEFAULT_COMMENT_LEFT: &str = " ";
const DEFAULT_COMMENT_RIGHT: &str = " ";

/// Receives every emitted fragment together with the node it came from and
/// a `"start"`/`"end"` marker for container delimiters.
pub type Builder<'a> = &'a mut dyn FnMut(&str, Option<&NodeRef>, Option<&str>);

pub struct Stringifier<'a> {
  builder: Builder<'a>,
}

/// Stringify a whole document.
pub fn stringify(root: &Root) -> String {
  node_to_string(root.node())
}

/// Stringify a single node (and its subtree).
pub fn node_to_string(node: &NodeRef) -> String {
  let mut out = String::new();
  {
    let mut builder = |part: &str, _: Option<&NodeRef>, _: Option<&str>| {
      out.push_str(part);
    };
    let mut stringifier = Stringifier::new(&mut builder);
    stringifier.stringify(node, false);
  }
  out
}

impl<'a> Stringifier<'a> {
  pub fn new(builder: Builder<'a>) -> Self {
    Stringifier { builder }
  }

  pub fn stringify(&mut self, node: &NodeRef, semicolon: bool) {
    let data = node.borrow().data.clone();
    match data {
      NodeData::Root(_) => self.root(node),
      NodeData::Rule(rule) => self.block(node, &rule.selector),
      NodeData::AtRule(at_rule) => {
        let mut start = format!("@{}", at_rule.name);
        let after_name = match node.borrow().raws.get("afterName") {
          Some(raw) => raw.to_string(),
          None if at_rule.params.is_empty() => String::new(),
          None => " ".to_string(),
        };
        start.push_str(&after_name);
        start.push_str(&at_rule.params);
        if self.raw_flag(node, "selfClosing") {
          if semicolon {
            start.push(';');
          }
          (self.builder)(&start, Some(node), None);
        } else {
          self.block(node, &start);
        }
      }
      NodeData::Declaration(decl) => {
        let between = self.raw(node, "between", "colon");
        let mut text = format!("{}{}{}", decl.prop, between, decl.value);
        if decl.important {
          let important = node
            .borrow()
            .raws
            .get("important")
            .unwrap_or(" !important")
            .to_string();
          text.push_str(&important);
        }
        if semicolon {
          text.push(';');
        }
        (self.builder)(&text, Some(node), None);
      }
      NodeData::Comment(comment) => {
        let left = node
          .borrow()
          .raws
          .get("left")
          .unwrap_or(DEFAULT_COMMENT_LEFT)
          .to_string();
        let right = node
          .borrow()
          .raws
          .get("right")
          .unwrap_or(DEFAULT_COMMENT_RIGHT)
          .to_string();
        let text = format!("/*{}{}{}*/", left, comment.text, right);
        (self.builder)(&text, Some(node), None);
      }
    }
  }

  fn root(&mut self, node: &NodeRef) {
    self.body(node);
    let after = node.borrow().raws.get("after").unwrap_or("").to_string();
    if !after.is_empty() {
      (self.builder)(&after, Some(node), Some("end"));
    }
  }

  fn block(&mut self, node: &NodeRef, start: &str) {
    let between = self.raw(node, "between", "beforeOpen");
    (self.builder)(&format!("{}{}{{", start, between), Some(node), Some("start"));

    let after = if node.borrow().nodes.is_empty() {
      self.raw(node, "after", "emptyBody")
    } else {
      self.body(node);
      self.raw(node, "after", "beforeClose")
    };
    (self.builder)(&format!("{}}}", after), Some(node), Some("end"));
  }

  fn body(&mut self, node: &NodeRef) {
    let semicolon = self.raw_flag(node, "semicolon");
    let children = node.borrow().nodes.clone();
    let last = children.len().saturating_sub(1);
    for (index, child) in children.iter().enumerate() {
      let before = self.raw(child, "before", "");
      if !before.is_empty() {
        (self.builder)(&before, Some(child), None);
      }
      self.stringify(child, index != last || semicolon);
    }
  }

  /// Resolve a formatting raw: the node's own value wins, otherwise the
  /// document is scanned once per key (cached on the root).
  fn raw(&self, node: &NodeRef, own: &str, detect: &str) -> String {
    if let Some(value) = node.borrow().raws.get(own) {
      return value.to_string();
    }

    if own == "before" {
      let parent = Node::parent_ref(node);
      let first_of_root = match &parent {
        None => true,
        Some(parent) => {
          matches!(parent.borrow().data, NodeData::Root(_))
            && parent
              .borrow()
              .nodes
              .first()
              .map_or(false, |first| Rc::ptr_eq(first, node))
        }
      };
      if first_of_root {
        return String::new();
      }
      return self.before_after(node);
    }

    let root = find_root(node);
    let detected = self.detect(&root, detect);
    detected.as_text().unwrap_or_default().to_string()
  }

  fn raw_flag(&self, node: &NodeRef, key: &str) -> bool {
    if let Some(value) = node.borrow().raws.get(key) {
      return value == "true";
    }
    if key != "semicolon" {
      return false;
    }
    let root = find_root(node);
    self.detect(&root, "semicolon").as_flag()
  }

  /// Detected `before` values get re-indented for the node's depth.
  fn before_after(&self, node: &NodeRef) -> String {
    let detect = match node.borrow().data {
      NodeData::Declaration(_) => "beforeDecl",
      NodeData::Comment(_) => "beforeComment",
      _ => "beforeRule",
    };
    let root = find_root(node);
    let mut value = self
      .detect(&root, detect)
      .as_text()
      .unwrap_or_default()
      .to_string();

    if value.contains('\n') {
      let indent = self
        .detect(&root, "indent")
        .as_text()
        .unwrap_or(DEFAULT_INDENT)
        .to_string();
      if !indent.is_empty() {
        let mut depth = 0;
        let mut parent = Node::parent_ref(node);
        while let Some(current) = parent {
          if matches!(current.borrow().data, NodeData::Root(_)) {
            break;
          }
          depth += 1;
          parent = Node::parent_ref(&current);
        }
        for _ in 0..depth {
          value.push_str(&indent);
        }
      }
    }
    value
  }

  fn detect(&self, root: &NodeRef, key: &str) -> RawCacheValue {
    if let Some(cache) = &root.borrow().raw_cache {
      if let Some(value) = cache.get(key) {
        return value.clone();
      }
    }

    let value = match key {
      "beforeDecl" => detect_before(root, |data| matches!(data, NodeData::Declaration(_)))
        .map(strip_to_last_newline)
        .unwrap_or_else(|| DEFAULT_BEFORE_DECL.into()),
      "beforeComment" => detect_before(root, |data| matches!(data, NodeData::Comment(_)))
        .map(strip_to_last_newline)
        .unwrap_or_else(|| DEFAULT_BEFORE_COMMENT.into()),
      "beforeRule" => detect_before_rule(root).unwrap_or_else(|| DEFAULT_BEFORE_RULE.into()),
      "beforeClose" => detect_before_close(root).unwrap_or_else(|| DEFAULT_BEFORE_CLOSE.into()),
      "beforeOpen" => detect_before_open(root).unwrap_or_else(|| DEFAULT_BEFORE_OPEN.into()),
      "colon" => detect_colon(root).unwrap_or_else(|| DEFAULT_COLON.into()),
      "indent" => detect_indent(root).unwrap_or_else(|| DEFAULT_INDENT.into()),
      "emptyBody" => detect_empty_body(root).unwrap_or_default(),
      "semicolon" => {
        let flag = detect_semicolon(root);
        let value = RawCacheValue::Flag(flag);
        cache_raw(root, key, &value);
        return value;
      }
      _ => String::new(),
    };

    let value = RawCacheValue::Text(value);
    cache_raw(root, key, &value);
    value
  }
}

fn cache_raw(root: &NodeRef, key: &str, value: &RawCacheValue) {
  let mut inner = root.borrow_mut();
  inner
    .raw_cache
    .get_or_insert_with(Default::default)
    .insert(key.to_string(), value.clone());
}

/// Keep everything up to and including the last newline, dropping the
/// trailing indentation (it is re-applied per depth).
fn strip_to_last_newline(value: String) -> String {
  match value.rfind('\n') {
    Some(index) => value[..=index].to_string(),
    None => value,
  }
}

fn detect_before<M>(root: &NodeRef, matches_kind: M) -> Option<String>
where
  M: Fn(&NodeData) -> bool,
{
  let mut found = None;
  Node::walk(root, &mut |node, _| {
    let inner = node.borrow();
    if matches_kind(&inner.data) {
      if let Some(before) = inner.raws.get("before") {
        found = Some(before.to_string());
        return false;
      }
    }
    true
  });
  found
}

fn detect_before_rule(root: &NodeRef) -> Option<String> {
  let mut found = None;
  Node::walk(root, &mut |node, _| {
    let inner = node.borrow();
    if !inner.data.is_container() || inner.nodes.is_empty() {
      return true;
    }
    let first_of_root = inner
      .parent()
      .map(|parent| {
        matches!(parent.borrow().data, NodeData::Root(_))
          && parent
            .borrow()
            .nodes
            .first()
            .map_or(false, |first| Rc::ptr_eq(first, &node))
      })
      .unwrap_or(false);
    if first_of_root {
      return true;
    }
    if let Some(before) = inner.raws.get("before") {
      found = Some(strip_to_last_newline(before.to_string()));
      return false;
    }
    true
  });
  found
}

fn detect_before_close(root: &NodeRef) -> Option<String> {
  let mut found = None;
  Node::walk(root, &mut |node, _| {
    let inner = node.borrow();
    if inner.data.is_container() && !inner.nodes.is_empty() {
      if let Some(after) = inner.raws.get("after") {
        found = Some(strip_to_last_newline(after.to_string()));
        return false;
      }
    }
    true
  });
  found
}

fn detect_before_open(root: &NodeRef) -> Option<String> {
  let mut found = None;
  Node::walk(root, &mut |node, _| {
    let inner = node.borrow();
    if matches!(inner.data, NodeData::Rule(_) | NodeData::AtRule(_)) {
      if let Some(between) = inner.raws.get("between") {
        found = Some(between.to_string());
        return false;
      }
    }
    true
  });
  found
}

fn detect_colon(root: &NodeRef) -> Option<String> {
  let mut found = None;
  Node::walk(root, &mut |node, _| {
    let inner = node.borrow();
    if matches!(inner.data, NodeData::Declaration(_)) {
      if let Some(between) = inner.raws.get("between") {
        // Keep only whitespace and the colon itself.
        found = Some(
          between
            .chars()
            .filter(|c| c.is_whitespace() || *c == ':')
            .collect(),
        );
        return false;
      }
    }
    true
  });
  found
}

fn detect_indent(root: &NodeRef) -> Option<String> {
  let mut found = None;
  Node::walk(root, &mut |node, _| {
    let parent = match Node::parent_ref(&node) {
      Some(parent) => parent,
      None => return true,
    };
    let depth_one = !matches!(parent.borrow().data, NodeData::Root(_))
      && parent
        .borrow()
        .parent()
        .map(|grand| matches!(grand.borrow().data, NodeData::Root(_)))
        .unwrap_or(false);
    if !depth_one {
      return true;
    }
    let inner = node.borrow();
    if let Some(before) = inner.raws.get("before") {
      if let Some(index) = before.rfind('\n') {
        found = Some(before[index + 1..].to_string());
        return false;
      }
    }
    true
  });
  found
}

fn detect_empty_body(root: &NodeRef) -> Option<String> {
  let mut found = None;
  Node::walk(root, &mut |node, _| {
    let inner = node.borrow();
    if inner.data.is_container() && inner.nodes.is_empty() {
      if let Some(after) = inner.raws.get("after") {
        found = Some(after.to_string());
        return false;
      }
    }
    true
  });
  found
}

/// Unlike the other detectors this one keeps scanning past containers
/// without an explicit flag, so freshly created rules pick up the
/// document-wide trailing-semicolon habit.
fn detect_semicolon(root: &NodeRef) -> bool {
  let mut found = false;
  Node::walk(root, &mut |node, _| {
    let inner = node.borrow();
    if !inner.data.is_container() || inner.nodes.is_empty() {
      return true;
    }
    let last_is_decl = inner
      .nodes
      .last()
      .map_or(false, |last| matches!(last.borrow().data, NodeData::Declaration(_)));
    if !last_is_decl {
      return true;
    }
    if let Some(flag) = inner.raws.get("semicolon") {
      found = flag == "true";
      return false;
    }
    true
  });
  found
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::ast::nodes::{Declaration, Rule};
  use crate::ast::NodeAccess;

  #[test]
  fn created_tree_uses_default_raws() {
    let root = Root::new();
    let rule = Rule::new(".a");
    rule.append(Declaration::new("color", "red").node().clone());
    root.append(rule.node().clone());
    assert_eq!(stringify(&root), ".a {\n    color: red\n}");
  }

  #[test]
  fn created_rule_inherits_document_formatting() {
    let parsed = crate::parse::parse(".a {\n  color: red;\n}\n").unwrap();
    let rule = Rule::new(".b");
    rule.append(Declaration::new("color", "blue").node().clone());
    parsed.append(rule.node().clone());
    assert_eq!(
      stringify(&parsed),
      ".a {\n  color: red;\n}\n.b {\n  color: blue;\n}\n"
    );
  }

  #[test]
  fn semicolon_detection_scans_past_unflagged_containers() {
    let parsed = crate::parse::parse(".a {\n  color: red;\n}\n").unwrap();
    // A created empty rule in front must not stop semicolon detection.
    let empty = Rule::new(".z");
    Node::insert(parsed.node(), 0, empty.node().clone());
    let created = Rule::new(".b");
    created.append(Declaration::new("color", "blue").node().clone());
    parsed.append(created.node().clone());
    let css = stringify(&parsed);
    assert!(css.contains("color: blue;"));
  }

  #[test]
  fn detection_cache_is_invalidated_by_mutation() {
    let parsed = crate::parse::parse(".a {\n  color: red;\n}\n").unwrap();
    let first = stringify(&parsed);
    assert_eq!(first, ".a {\n  color: red;\n}\n");
    let rule = Rule::new(".b");
    rule.append(Declaration::new("margin", "0").node().clone());
    parsed.append(rule.node().clone());
    let second = stringify(&parsed);
    assert!(second.ends_with(".b {\n  margin: 0;\n}\n"));
  }

  #[test]
  fn empty_rule_stringifies_with_empty_body() {
    let root = Root::new();
    root.append(Rule::new(".empty").node().clone());
    assert_eq!(stringify(&root), ".empty {}");
  }

  #[test]
  fn node_to_string_emits_a_single_declaration() {
    let decl = Declaration::new("--gap", "4px");
    assert_eq!(node_to_string(decl.node()), "--gap: 4px");
  }

  #[test]
  fn comment_round_trip() {
    let css = indoc! {"
      /* note */
      .a {
        color: red;
      }
    "};
    let parsed = crate::parse::parse(css).unwrap();
    assert_eq!(stringify(&parsed), css);
  }
}
