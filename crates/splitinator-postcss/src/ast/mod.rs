use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::result::{Result as ProcessResult, Warning, WarningOptions};
use crate::stringifier;

pub mod nodes;

/// Shared pointer to a node in the CSS tree.
pub type NodeRef = Rc<RefCell<Node>>;

/// Weak pointer used for parent links so subtrees never form reference cycles.
pub type WeakNodeRef = Weak<RefCell<Node>>;

/// Location of a character in the original source text. Lines and columns are
/// one-based; the offset counts characters from the start of the input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
  pub line: u32,
  pub column: u32,
  pub offset: usize,
}

/// Span of the source text a node was parsed from. Nodes created by plugins
/// have no positions unless the plugin copies them from an existing node.
#[derive(Clone, Debug, Default)]
pub struct Source {
  pub start: Option<Position>,
  pub end: Option<Position>,
}

/// A resolved raw used by the stringifier. Most raws are literal text; the
/// trailing-semicolon raw is a boolean.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawCacheValue {
  Text(String),
  Flag(bool),
}

impl RawCacheValue {
  pub fn as_text(&self) -> Option<&str> {
    match self {
      RawCacheValue::Text(text) => Some(text.as_str()),
      RawCacheValue::Flag(_) => None,
    }
  }

  pub fn as_flag(&self) -> bool {
    match self {
      RawCacheValue::Flag(flag) => *flag,
      RawCacheValue::Text(text) => !text.is_empty() && text != "false",
    }
  }
}

pub type RawCache = BTreeMap<String, RawCacheValue>;

/// Formatting fragments preserved from the source text, keyed the way the
/// stringifier resolves them: `before`, `between`, `after`, `afterName`,
/// `semicolon`, `important`, `left`, `right`, `indent`. Flags are stored as
/// the strings `"true"` / `"false"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawData {
  values: BTreeMap<String, String>,
}

impl RawData {
  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }

  pub fn set(&mut self, key: &str, value: impl Into<String>) {
    self.values.insert(key.to_string(), value.into());
  }

  pub fn set_flag(&mut self, key: &str, value: bool) {
    self
      .values
      .insert(key.to_string(), if value { "true" } else { "false" }.into());
  }

  pub fn remove(&mut self, key: &str) {
    self.values.remove(key);
  }

  pub fn merge(&mut self, other: &RawData) {
    for (key, value) in &other.values {
      self.values.insert(key.clone(), value.clone());
    }
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
    self.values.iter()
  }
}

/// Strongly-typed payload stored inside each [`Node`].
#[derive(Clone, Debug)]
pub enum NodeData {
  Root(nodes::RootData),
  Rule(nodes::RuleData),
  AtRule(nodes::AtRuleData),
  Declaration(nodes::DeclarationData),
  Comment(nodes::CommentData),
}

impl NodeData {
  pub fn is_container(&self) -> bool {
    matches!(
      self,
      NodeData::Root(_) | NodeData::Rule(_) | NodeData::AtRule(_)
    )
  }
}

/// Core mutable node. The tree is single-threaded; plugins mutate it through
/// shared `NodeRef` handles during a processing run.
#[derive(Clone, Debug)]
pub struct Node {
  pub data: NodeData,
  pub parent: Option<WeakNodeRef>,
  pub source: Source,
  pub raws: RawData,
  pub nodes: Vec<NodeRef>,
  pub raw_cache: Option<RawCache>,
}

impl Node {
  pub fn new(data: NodeData) -> NodeRef {
    Rc::new(RefCell::new(Self {
      data,
      parent: None,
      source: Source::default(),
      raws: RawData::default(),
      nodes: Vec::new(),
      raw_cache: None,
    }))
  }

  pub fn kind(&self) -> nodes::NodeKind {
    match &self.data {
      NodeData::Root(_) => nodes::NodeKind::Root,
      NodeData::Rule(_) => nodes::NodeKind::Rule,
      NodeData::AtRule(_) => nodes::NodeKind::AtRule,
      NodeData::Declaration(_) => nodes::NodeKind::Declaration,
      NodeData::Comment(_) => nodes::NodeKind::Comment,
    }
  }

  pub fn type_name(&self) -> &'static str {
    match &self.data {
      NodeData::Root(_) => "root",
      NodeData::Rule(_) => "rule",
      NodeData::AtRule(_) => "atrule",
      NodeData::Declaration(_) => "decl",
      NodeData::Comment(_) => "comment",
    }
  }

  pub fn parent(&self) -> Option<NodeRef> {
    self.parent.as_ref().and_then(Weak::upgrade)
  }

  pub fn parent_ref(node: &NodeRef) -> Option<NodeRef> {
    node.borrow().parent()
  }

  pub fn set_parent(node: &NodeRef, parent: Option<&NodeRef>) {
    node.borrow_mut().parent = parent.map(Rc::downgrade);
  }

  pub fn index(node: &NodeRef) -> Option<usize> {
    Node::parent_and_index(node).map(|(_, index)| index)
  }

  pub fn index_of(parent: &NodeRef, child: &NodeRef) -> Option<usize> {
    parent
      .borrow()
      .nodes
      .iter()
      .position(|node| Rc::ptr_eq(node, child))
  }

  fn parent_and_index(node: &NodeRef) -> Option<(NodeRef, usize)> {
    let parent = node.borrow().parent()?;
    let index = Node::index_of(&parent, node)?;
    Some((parent, index))
  }

  fn detach(node: &NodeRef) {
    if let Some((parent, index)) = Node::parent_and_index(node) {
      Node::remove(&parent, index);
    }
  }

  /// Clear cached raw-detection results on this node and every ancestor.
  /// Mutations call this so the stringifier re-detects formatting.
  fn invalidate_raw_caches(node: &NodeRef) {
    let mut current = Some(node.clone());
    while let Some(step) = current {
      step.borrow_mut().raw_cache = None;
      current = step.borrow().parent();
    }
  }

  pub fn append(parent: &NodeRef, child: NodeRef) {
    Node::detach(&child);
    child.borrow_mut().parent = Some(Rc::downgrade(parent));
    parent.borrow_mut().nodes.push(child);
    Node::invalidate_raw_caches(parent);
  }

  pub fn insert(parent: &NodeRef, index: usize, child: NodeRef) {
    Node::detach(&child);
    child.borrow_mut().parent = Some(Rc::downgrade(parent));
    parent.borrow_mut().nodes.insert(index, child);
    Node::invalidate_raw_caches(parent);
  }

  pub fn remove(parent: &NodeRef, index: usize) -> NodeRef {
    let child = parent.borrow_mut().nodes.remove(index);
    child.borrow_mut().parent = None;
    Node::invalidate_raw_caches(parent);
    child
  }

  pub fn remove_self(node: &NodeRef) {
    Node::detach(node);
  }

  pub fn remove_all(parent: &NodeRef) {
    let nodes = std::mem::take(&mut parent.borrow_mut().nodes);
    for child in nodes {
      child.borrow_mut().parent = None;
    }
    Node::invalidate_raw_caches(parent);
  }

  pub fn insert_before<I>(node: &NodeRef, new_nodes: I)
  where
    I: IntoIterator<Item = NodeRef>,
  {
    let (parent, index) = match Node::parent_and_index(node) {
      Some(value) => value,
      None => return,
    };
    for (offset, child) in new_nodes.into_iter().enumerate() {
      Node::insert(&parent, index + offset, child);
    }
  }

  pub fn insert_after<I>(node: &NodeRef, new_nodes: I)
  where
    I: IntoIterator<Item = NodeRef>,
  {
    let (parent, index) = match Node::parent_and_index(node) {
      Some(value) => value,
      None => return,
    };
    for (offset, child) in new_nodes.into_iter().enumerate() {
      Node::insert(&parent, index + 1 + offset, child);
    }
  }

  pub fn replace_with<I>(node: &NodeRef, new_nodes: I)
  where
    I: IntoIterator<Item = NodeRef>,
  {
    let (parent, index) = match Node::parent_and_index(node) {
      Some(value) => value,
      None => return,
    };
    Node::remove(&parent, index);
    for (offset, child) in new_nodes.into_iter().enumerate() {
      Node::insert(&parent, index + offset, child);
    }
  }

  fn sibling(node: &NodeRef, offset: isize) -> Option<NodeRef> {
    let (parent, index) = Node::parent_and_index(node)?;
    let target = index as isize + offset;
    if target < 0 {
      return None;
    }
    let inner = parent.borrow();
    inner.nodes.get(target as usize).cloned()
  }

  pub fn next(node: &NodeRef) -> Option<NodeRef> {
    Node::sibling(node, 1)
  }

  pub fn prev(node: &NodeRef) -> Option<NodeRef> {
    Node::sibling(node, -1)
  }

  /// Deep copy. The clone is detached unless a parent is supplied; children
  /// are cloned recursively and re-parented onto the new node.
  pub fn clone_node(node: &NodeRef, parent: Option<&NodeRef>) -> NodeRef {
    let cloned_inner = {
      let inner = node.borrow();
      Node {
        data: inner.data.clone(),
        parent: None,
        source: inner.source.clone(),
        raws: inner.raws.clone(),
        nodes: inner
          .nodes
          .iter()
          .map(|child| Node::clone_node(child, None))
          .collect(),
        raw_cache: None,
      }
    };

    let result = Rc::new(RefCell::new(cloned_inner));
    for child in &result.borrow().nodes {
      Node::set_parent(child, Some(&result));
    }
    if let Some(parent_ref) = parent {
      Node::set_parent(&result, Some(parent_ref));
    }
    result
  }

  /// Visit direct children in order. The child list is snapshotted first, so
  /// the callback may detach nodes (including the one being visited); nodes
  /// detached before their turn are skipped. Returning `false` stops the
  /// iteration and is reported to the caller.
  pub fn each<F>(node: &NodeRef, callback: &mut F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    let children = node.borrow().nodes.clone();
    for (index, child) in children.into_iter().enumerate() {
      let attached = child
        .borrow()
        .parent()
        .map(|parent| Rc::ptr_eq(&parent, node))
        .unwrap_or(false);
      if !attached {
        continue;
      }
      if !callback(child, index) {
        return false;
      }
    }
    true
  }

  /// Depth-first traversal of the subtree below `node`, enter order only.
  pub fn walk<F>(node: &NodeRef, callback: &mut F) -> bool
  where
    F: FnMut(NodeRef, usize) -> bool,
  {
    Node::each(node, &mut |child, index| {
      if !callback(child.clone(), index) {
        return false;
      }
      if child.borrow().data.is_container() {
        Node::walk(&child, callback)
      } else {
        true
      }
    })
  }

  pub fn to_css(node: &NodeRef) -> String {
    stringifier::node_to_string(node)
  }
}

impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.data {
      NodeData::Root(_) => write!(f, "<root>"),
      NodeData::Rule(data) => write!(f, "<rule {}>", data.selector),
      NodeData::AtRule(data) => write!(f, "<atrule @{}>", data.name),
      NodeData::Declaration(data) => write!(f, "<decl {}: {}>", data.prop, data.value),
      NodeData::Comment(data) => write!(f, "<comment {}>", data.text),
    }
  }
}

/// Read/write access shared by the strongly typed wrappers in [`nodes`].
pub trait NodeAccess {
  fn node(&self) -> &NodeRef;

  fn borrow(&self) -> Ref<'_, Node> {
    self.node().borrow()
  }

  fn borrow_mut(&self) -> RefMut<'_, Node> {
    self.node().borrow_mut()
  }

  fn parent(&self) -> Option<NodeRef> {
    Node::parent_ref(self.node())
  }

  fn root(&self) -> NodeRef {
    find_root(self.node())
  }

  fn index(&self) -> Option<usize> {
    Node::index(self.node())
  }

  fn next(&self) -> Option<NodeRef> {
    Node::next(self.node())
  }

  fn prev(&self) -> Option<NodeRef> {
    Node::prev(self.node())
  }

  fn before<I>(&self, nodes: I)
  where
    I: IntoIterator<Item = NodeRef>,
  {
    Node::insert_before(self.node(), nodes);
  }

  fn after<I>(&self, nodes: I)
  where
    I: IntoIterator<Item = NodeRef>,
  {
    Node::insert_after(self.node(), nodes);
  }

  fn replace_with<I>(&self, nodes: I)
  where
    I: IntoIterator<Item = NodeRef>,
  {
    Node::replace_with(self.node(), nodes);
  }

  fn remove(&self) {
    Node::remove_self(self.node());
  }

  fn clone_node(&self) -> NodeRef {
    Node::clone_node(self.node(), None)
  }

  fn clone_with<F>(&self, callback: F) -> NodeRef
  where
    F: FnOnce(&NodeRef),
  {
    let clone = self.clone_node();
    callback(&clone);
    clone
  }

  fn to_css(&self) -> String {
    Node::to_css(self.node())
  }

  /// Record a warning attached to this node in the run's result.
  fn warn(
    &self,
    result: &mut ProcessResult,
    text: impl Into<String>,
    mut opts: WarningOptions,
  ) -> Warning {
    if opts.node.is_none() {
      opts.node = Some(self.node().clone());
    }
    result.warn(text, opts)
  }
}

/// Walk parent links up to the tree root.
pub fn find_root(node: &NodeRef) -> NodeRef {
  let mut current = node.clone();
  loop {
    let parent = current.borrow().parent();
    match parent {
      Some(next) => current = next,
      None => return current,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::nodes::{Declaration, Root, Rule};
  use super::*;

  #[test]
  fn append_sets_parent_and_order() {
    let root = Root::new();
    let first = Rule::new(".a");
    let second = Rule::new(".b");
    root.append(first.node().clone());
    root.append(second.node().clone());

    let children = root.borrow().nodes.clone();
    assert_eq!(children.len(), 2);
    assert!(Rc::ptr_eq(
      &children[0].borrow().parent().unwrap(),
      root.node()
    ));
    assert_eq!(Node::index(second.node()), Some(1));
  }

  #[test]
  fn insert_after_places_node_between_siblings() {
    let root = Root::new();
    let first = Rule::new(".a");
    let last = Rule::new(".c");
    root.append(first.node().clone());
    root.append(last.node().clone());

    let middle = Rule::new(".b");
    Node::insert_after(first.node(), std::iter::once(middle.node().clone()));

    let order: Vec<String> = root
      .borrow()
      .nodes
      .iter()
      .map(|node| node.borrow().to_string())
      .collect();
    assert_eq!(order, vec!["<rule .a>", "<rule .b>", "<rule .c>"]);
  }

  #[test]
  fn remove_self_detaches_node() {
    let root = Root::new();
    let rule = Rule::new(".a");
    root.append(rule.node().clone());
    rule.remove();

    assert!(root.borrow().nodes.is_empty());
    assert!(rule.parent().is_none());
  }

  #[test]
  fn clone_node_is_deep_and_detached() {
    let rule = Rule::new(".a");
    let decl = Declaration::new("color", "red");
    rule.append(decl.node().clone());

    let clone = NodeAccess::clone_node(&rule);
    assert!(clone.borrow().parent().is_none());
    assert_eq!(clone.borrow().nodes.len(), 1);
    assert!(!Rc::ptr_eq(&clone.borrow().nodes[0], decl.node()));
    assert!(Rc::ptr_eq(
      &clone.borrow().nodes[0].borrow().parent().unwrap(),
      &clone
    ));
  }

  #[test]
  fn each_skips_nodes_detached_by_the_callback() {
    let root = Root::new();
    for selector in [".a", ".b", ".c"] {
      root.append(Rule::new(selector).node().clone());
    }

    let mut seen = Vec::new();
    Node::each(root.node(), &mut |child, _| {
      seen.push(child.borrow().to_string());
      // Detaching the next sibling must keep it out of the iteration.
      if let Some(next) = Node::next(&child) {
        Node::remove_self(&next);
      }
      true
    });
    assert_eq!(seen, vec!["<rule .a>", "<rule .c>"]);
  }
}
