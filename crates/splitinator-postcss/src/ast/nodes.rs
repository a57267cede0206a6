use std::fmt;

use super::{Node, NodeAccess, NodeData, NodeRef, RawData};

/// Discriminant for the payload stored in a [`Node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
  Root,
  Rule,
  AtRule,
  Declaration,
  Comment,
}

#[derive(Clone, Debug, Default)]
pub struct RootData;

#[derive(Clone, Debug, Default)]
pub struct RuleData {
  pub selector: String,
}

#[derive(Clone, Debug, Default)]
pub struct AtRuleData {
  pub name: String,
  pub params: String,
}

#[derive(Clone, Debug, Default)]
pub struct DeclarationData {
  pub prop: String,
  pub value: String,
  pub important: bool,
}

#[derive(Clone, Debug, Default)]
pub struct CommentData {
  pub text: String,
}

impl Node {
  pub fn as_rule_mut(&mut self) -> Option<&mut RuleData> {
    match &mut self.data {
      NodeData::Rule(data) => Some(data),
      _ => None,
    }
  }

  pub fn as_at_rule_mut(&mut self) -> Option<&mut AtRuleData> {
    match &mut self.data {
      NodeData::AtRule(data) => Some(data),
      _ => None,
    }
  }

  pub fn as_declaration_mut(&mut self) -> Option<&mut DeclarationData> {
    match &mut self.data {
      NodeData::Declaration(data) => Some(data),
      _ => None,
    }
  }

  pub fn as_comment_mut(&mut self) -> Option<&mut CommentData> {
    match &mut self.data {
      NodeData::Comment(data) => Some(data),
      _ => None,
    }
  }
}

fn walk_kind<F, M>(node: &NodeRef, matcher: &M, callback: &mut F) -> bool
where
  F: FnMut(NodeRef, usize) -> bool,
  M: Fn(&NodeData) -> bool,
{
  Node::walk(node, &mut |child, index| {
    let matched = matcher(&child.borrow().data);
    if matched {
      callback(child, index)
    } else {
      true
    }
  })
}

/// Root of one parsed stylesheet. Exactly one per processing run.
#[derive(Clone, Debug)]
pub struct Root {
  node: NodeRef,
}

impl Root {
  #[allow(clippy::new_without_default)]
  pub fn new() -> Self {
    Root {
      node: Node::new(NodeData::Root(RootData)),
    }
  }

  pub(crate) fn from_node(node: NodeRef) -> Self {
    Root { node }
  }

  pub fn append(&self, child: NodeRef) {
    Node::append(&self.node, child);
  }

  pub fn nodes(&self) -> Vec<NodeRef> {
    self.node.borrow().nodes.clone()
  }

  pub fn is_empty(&self) -> bool {
    self.node.borrow().nodes.is_empty()
  }

  pub fn each<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    Node::each(&self.node, &mut callback)
  }

  pub fn walk<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    Node::walk(&self.node, &mut callback)
  }

  pub fn walk_rules<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    walk_kind(
      &self.node,
      &|data| matches!(data, NodeData::Rule(_)),
      &mut callback,
    )
  }

  pub fn walk_at_rules<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    walk_kind(
      &self.node,
      &|data| matches!(data, NodeData::AtRule(_)),
      &mut callback,
    )
  }

  pub fn walk_decls<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    walk_kind(
      &self.node,
      &|data| matches!(data, NodeData::Declaration(_)),
      &mut callback,
    )
  }

  pub fn walk_comments<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    walk_kind(
      &self.node,
      &|data| matches!(data, NodeData::Comment(_)),
      &mut callback,
    )
  }
}

impl NodeAccess for Root {
  fn node(&self) -> &NodeRef {
    &self.node
  }
}

impl fmt::Display for Root {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&crate::stringifier::stringify(self))
  }
}

/// Rule wrapper: a selector plus a declaration block.
#[derive(Clone, Debug)]
pub struct Rule {
  node: NodeRef,
}

impl Rule {
  pub fn new(selector: impl Into<String>) -> Self {
    Rule {
      node: Node::new(NodeData::Rule(RuleData {
        selector: selector.into(),
      })),
    }
  }

  pub(crate) fn from_node(node: NodeRef) -> Self {
    Rule { node }
  }

  pub fn selector(&self) -> String {
    match &self.node.borrow().data {
      NodeData::Rule(data) => data.selector.clone(),
      _ => String::new(),
    }
  }

  pub fn set_selector(&self, selector: impl Into<String>) {
    if let Some(data) = self.node.borrow_mut().as_rule_mut() {
      data.selector = selector.into();
    }
  }

  pub fn append(&self, child: NodeRef) {
    Node::append(&self.node, child);
  }

  pub fn nodes(&self) -> Vec<NodeRef> {
    self.node.borrow().nodes.clone()
  }

  pub fn is_empty(&self) -> bool {
    self.node.borrow().nodes.is_empty()
  }

  pub fn each<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    Node::each(&self.node, &mut callback)
  }

  pub fn walk_decls<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    walk_kind(
      &self.node,
      &|data| matches!(data, NodeData::Declaration(_)),
      &mut callback,
    )
  }
}

impl NodeAccess for Rule {
  fn node(&self) -> &NodeRef {
    &self.node
  }
}

/// At-rule wrapper: `@name params` with an optional block.
#[derive(Clone, Debug)]
pub struct AtRule {
  node: NodeRef,
}

impl AtRule {
  pub fn new(name: impl Into<String>, params: impl Into<String>) -> Self {
    AtRule {
      node: Node::new(NodeData::AtRule(AtRuleData {
        name: name.into(),
        params: params.into(),
      })),
    }
  }

  pub(crate) fn from_node(node: NodeRef) -> Self {
    AtRule { node }
  }

  pub fn name(&self) -> String {
    match &self.node.borrow().data {
      NodeData::AtRule(data) => data.name.clone(),
      _ => String::new(),
    }
  }

  pub fn params(&self) -> String {
    match &self.node.borrow().data {
      NodeData::AtRule(data) => data.params.clone(),
      _ => String::new(),
    }
  }

  pub fn set_params(&self, params: impl Into<String>) {
    if let Some(data) = self.node.borrow_mut().as_at_rule_mut() {
      data.params = params.into();
    }
  }

  pub fn append(&self, child: NodeRef) {
    Node::append(&self.node, child);
  }

  pub fn nodes(&self) -> Vec<NodeRef> {
    self.node.borrow().nodes.clone()
  }

  pub fn each<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    Node::each(&self.node, &mut callback)
  }

  pub fn walk_rules<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    walk_kind(
      &self.node,
      &|data| matches!(data, NodeData::Rule(_)),
      &mut callback,
    )
  }

  pub fn walk_decls<F>(&self, mut callback: F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    walk_kind(
      &self.node,
      &|data| matches!(data, NodeData::Declaration(_)),
      &mut callback,
    )
  }
}

impl NodeAccess for AtRule {
  fn node(&self) -> &NodeRef {
    &self.node
  }
}

/// Declaration wrapper: `prop: value` with an optional `!important`.
#[derive(Clone, Debug)]
pub struct Declaration {
  node: NodeRef,
}

impl Declaration {
  pub fn new(prop: impl Into<String>, value: impl Into<String>) -> Self {
    Declaration {
      node: Node::new(NodeData::Declaration(DeclarationData {
        prop: prop.into(),
        value: value.into(),
        important: false,
      })),
    }
  }

  pub(crate) fn from_node(node: NodeRef) -> Self {
    Declaration { node }
  }

  pub fn prop(&self) -> String {
    match &self.node.borrow().data {
      NodeData::Declaration(data) => data.prop.clone(),
      _ => String::new(),
    }
  }

  pub fn set_prop(&self, prop: impl Into<String>) {
    if let Some(data) = self.node.borrow_mut().as_declaration_mut() {
      data.prop = prop.into();
    }
  }

  pub fn value(&self) -> String {
    match &self.node.borrow().data {
      NodeData::Declaration(data) => data.value.clone(),
      _ => String::new(),
    }
  }

  pub fn set_value(&self, value: impl Into<String>) {
    if let Some(data) = self.node.borrow_mut().as_declaration_mut() {
      data.value = value.into();
    }
  }

  pub fn important(&self) -> bool {
    matches!(&self.node.borrow().data, NodeData::Declaration(data) if data.important)
  }

  pub fn set_important(&self, important: bool) {
    if let Some(data) = self.node.borrow_mut().as_declaration_mut() {
      data.important = important;
    }
  }
}

impl NodeAccess for Declaration {
  fn node(&self) -> &NodeRef {
    &self.node
  }
}

#[derive(Clone, Debug)]
pub struct Comment {
  node: NodeRef,
}

impl Comment {
  pub fn new(text: impl Into<String>) -> Self {
    Comment {
      node: Node::new(NodeData::Comment(CommentData { text: text.into() })),
    }
  }

  pub(crate) fn from_node(node: NodeRef) -> Self {
    Comment { node }
  }

  pub fn text(&self) -> String {
    match &self.node.borrow().data {
      NodeData::Comment(data) => data.text.clone(),
      _ => String::new(),
    }
  }
}

impl NodeAccess for Comment {
  fn node(&self) -> &NodeRef {
    &self.node
  }
}

/// Cast a node reference to a [`Rule`] wrapper when it stores rule data.
pub fn as_rule(node: &NodeRef) -> Option<Rule> {
  if matches!(node.borrow().data, NodeData::Rule(_)) {
    Some(Rule::from_node(node.clone()))
  } else {
    None
  }
}

/// Cast a node reference to an [`AtRule`] wrapper when it stores at-rule data.
pub fn as_at_rule(node: &NodeRef) -> Option<AtRule> {
  if matches!(node.borrow().data, NodeData::AtRule(_)) {
    Some(AtRule::from_node(node.clone()))
  } else {
    None
  }
}

/// Cast a node reference to a [`Declaration`] wrapper when possible.
pub fn as_declaration(node: &NodeRef) -> Option<Declaration> {
  if matches!(node.borrow().data, NodeData::Declaration(_)) {
    Some(Declaration::from_node(node.clone()))
  } else {
    None
  }
}

/// Cast a node reference to a [`Comment`] wrapper when possible.
pub fn as_comment(node: &NodeRef) -> Option<Comment> {
  if matches!(node.borrow().data, NodeData::Comment(_)) {
    Some(Comment::from_node(node.clone()))
  } else {
    None
  }
}

/// Build a rule node carrying explicit raw metadata.
pub fn rule_with_raws(selector: String, raws: RawData) -> NodeRef {
  let node = Node::new(NodeData::Rule(RuleData { selector }));
  node.borrow_mut().raws = raws;
  node
}

/// Build an at-rule node carrying explicit raw metadata.
pub fn at_rule_with_raws(name: String, params: String, raws: RawData) -> NodeRef {
  let node = Node::new(NodeData::AtRule(AtRuleData { name, params }));
  node.borrow_mut().raws = raws;
  node
}

/// Build a declaration node carrying explicit raw metadata.
pub fn declaration_with_raws(
  prop: String,
  value: String,
  important: bool,
  raws: RawData,
) -> NodeRef {
  let node = Node::new(NodeData::Declaration(DeclarationData {
    prop,
    value,
    important,
  }));
  node.borrow_mut().raws = raws;
  node
}

/// Build a comment node carrying explicit raw metadata.
pub fn comment_with_raws(text: String, raws: RawData) -> NodeRef {
  let node = Node::new(NodeData::Comment(CommentData { text }));
  node.borrow_mut().raws = raws;
  node
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn walk_decls_only_visits_declarations() {
    let root = Root::new();
    let rule = Rule::new(".a");
    rule.append(Declaration::new("color", "red").node().clone());
    rule.append(Comment::new("note").node().clone());
    root.append(rule.node().clone());

    let mut props = Vec::new();
    root.walk_decls(|decl, _| {
      props.push(as_declaration(&decl).unwrap().prop());
      true
    });
    assert_eq!(props, vec!["color"]);
  }

  #[test]
  fn casts_reject_other_kinds() {
    let rule = Rule::new(".a");
    assert!(as_rule(rule.node()).is_some());
    assert!(as_at_rule(rule.node()).is_none());
    assert!(as_declaration(rule.node()).is_none());
  }

  #[test]
  fn at_rule_walk_rules_finds_nested_rules() {
    let container = AtRule::new("container", "(--density: spacious)");
    let rule = Rule::new(".inner");
    rule.append(Declaration::new("--gap", "8px").node().clone());
    container.append(rule.node().clone());

    let mut selectors = Vec::new();
    container.walk_rules(|node, _| {
      selectors.push(as_rule(&node).unwrap().selector());
      true
    });
    assert_eq!(selectors, vec![".inner"]);
  }
}
