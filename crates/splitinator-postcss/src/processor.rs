//! Plugin host: parses the input, runs every plugin's `prepare`, then for
//! each plugin `once` → depth-first walk → `once_exit`, collecting
//! diagnostics in the run's [`ProcessResult`].
//!
//! Set `SPLITINATOR_TRACE` in the environment to get phase tracing on
//! stderr.

use std::error::Error;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::ast::nodes::{as_at_rule, as_comment, as_declaration, as_rule, AtRule, Comment, Declaration, Root, Rule};
use crate::ast::{Node, NodeAccess, NodeData, NodeRef};
use crate::parse::{parse, ParseError};
use crate::result::Result as ProcessResult;

#[derive(Debug)]
pub enum ProcessorError {
  Parse(ParseError),
  Message(String),
}

impl fmt::Display for ProcessorError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ProcessorError::Parse(error) => write!(f, "parse error: {}", error),
      ProcessorError::Message(message) => f.write_str(message),
    }
  }
}

impl Error for ProcessorError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      ProcessorError::Parse(error) => Some(error),
      ProcessorError::Message(_) => None,
    }
  }
}

impl From<ParseError> for ProcessorError {
  fn from(error: ParseError) -> Self {
    ProcessorError::Parse(error)
  }
}

pub type HookResult = Result<(), ProcessorError>;

/// One transform. `prepare` runs at the start of every processing run and
/// may return a per-run instance whose hooks close over fresh state; the
/// remaining hooks are then called on that instance.
pub trait Plugin: Send + Sync {
  fn name(&self) -> &str;

  fn prepare(&self, _result: &mut ProcessResult) -> Result<Option<Arc<dyn Plugin>>, ProcessorError> {
    Ok(None)
  }

  fn once(&self, _root: &Root, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn once_exit(&self, _root: &Root, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn root(&self, _root: &Root, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn root_exit(&self, _root: &Root, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn rule(&self, _rule: &Rule, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn rule_exit(&self, _rule: &Rule, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn at_rule(&self, _at_rule: &AtRule, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn at_rule_exit(&self, _at_rule: &AtRule, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn decl(&self, _decl: &Declaration, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn decl_exit(&self, _decl: &Declaration, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn comment(&self, _comment: &Comment, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }

  fn comment_exit(&self, _comment: &Comment, _result: &mut ProcessResult) -> HookResult {
    Ok(())
  }
}

pub trait IntoPlugin {
  fn into_plugin(self) -> Arc<dyn Plugin>;
}

impl<P: Plugin + 'static> IntoPlugin for P {
  fn into_plugin(self) -> Arc<dyn Plugin> {
    Arc::new(self)
  }
}

impl IntoPlugin for Arc<dyn Plugin> {
  fn into_plugin(self) -> Arc<dyn Plugin> {
    self
  }
}

#[derive(Clone, Debug, Default)]
pub struct ProcessOptions {
  /// Name of the input, carried into the result for diagnostics.
  pub from: Option<String>,
}

fn trace(plugin: &str, phase: &str) {
  if std::env::var_os("SPLITINATOR_TRACE").is_some() {
    eprintln!("[postcss] plugin {}: {}", plugin, phase);
  }
}

#[derive(Default)]
pub struct Processor {
  plugins: Vec<Arc<dyn Plugin>>,
}

impl Processor {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn plugin(mut self, plugin: impl IntoPlugin) -> Self {
    self.plugins.push(plugin.into_plugin());
    self
  }

  pub fn process(&self, css: &str) -> Result<ProcessResult, ProcessorError> {
    self.process_with_options(css, ProcessOptions::default())
  }

  pub fn process_with_options(
    &self,
    css: &str,
    options: ProcessOptions,
  ) -> Result<ProcessResult, ProcessorError> {
    let root = parse(css)?;
    let mut result = ProcessResult::new(root, options.from);

    let mut prepared = Vec::with_capacity(self.plugins.len());
    for plugin in &self.plugins {
      result.set_last_plugin(Some(plugin.name().to_string()));
      trace(plugin.name(), "prepare");
      let instance = match plugin.prepare(&mut result)? {
        Some(instance) => instance,
        None => Arc::clone(plugin),
      };
      prepared.push(instance);
    }

    for plugin in &prepared {
      result.set_last_plugin(Some(plugin.name().to_string()));
      let root = result.root().clone();
      trace(plugin.name(), "once");
      plugin.once(&root, &mut result)?;
      trace(plugin.name(), "walk");
      walk_plugin_node(plugin.as_ref(), root.node(), &mut result)?;
      trace(plugin.name(), "once_exit");
      plugin.once_exit(&root, &mut result)?;
    }

    result.set_last_plugin(None);
    Ok(result)
  }
}

fn enter(plugin: &dyn Plugin, node: &NodeRef, result: &mut ProcessResult) -> HookResult {
  let kind = node.borrow().kind();
  match kind {
    crate::ast::nodes::NodeKind::Root => plugin.root(&root_of(node), result),
    crate::ast::nodes::NodeKind::Rule => match as_rule(node) {
      Some(rule) => plugin.rule(&rule, result),
      None => Ok(()),
    },
    crate::ast::nodes::NodeKind::AtRule => match as_at_rule(node) {
      Some(at_rule) => plugin.at_rule(&at_rule, result),
      None => Ok(()),
    },
    crate::ast::nodes::NodeKind::Declaration => match as_declaration(node) {
      Some(decl) => plugin.decl(&decl, result),
      None => Ok(()),
    },
    crate::ast::nodes::NodeKind::Comment => match as_comment(node) {
      Some(comment) => plugin.comment(&comment, result),
      None => Ok(()),
    },
  }
}

fn exit(plugin: &dyn Plugin, node: &NodeRef, result: &mut ProcessResult) -> HookResult {
  let kind = node.borrow().kind();
  match kind {
    crate::ast::nodes::NodeKind::Root => plugin.root_exit(&root_of(node), result),
    crate::ast::nodes::NodeKind::Rule => match as_rule(node) {
      Some(rule) => plugin.rule_exit(&rule, result),
      None => Ok(()),
    },
    crate::ast::nodes::NodeKind::AtRule => match as_at_rule(node) {
      Some(at_rule) => plugin.at_rule_exit(&at_rule, result),
      None => Ok(()),
    },
    crate::ast::nodes::NodeKind::Declaration => match as_declaration(node) {
      Some(decl) => plugin.decl_exit(&decl, result),
      None => Ok(()),
    },
    crate::ast::nodes::NodeKind::Comment => match as_comment(node) {
      Some(comment) => plugin.comment_exit(&comment, result),
      None => Ok(()),
    },
  }
}

fn root_of(node: &NodeRef) -> Root {
  Root::from_node(node.clone())
}

/// Depth-first enter/exit dispatch. The child list is snapshotted before
/// descending; children detached by an earlier hook are skipped, and a node
/// detached during its own enter visit is not descended into.
fn walk_plugin_node(
  plugin: &dyn Plugin,
  node: &NodeRef,
  result: &mut ProcessResult,
) -> HookResult {
  enter(plugin, node, result)?;

  let is_root = matches!(node.borrow().data, NodeData::Root(_));
  if !is_root && Node::parent_ref(node).is_none() {
    return Ok(());
  }

  if node.borrow().data.is_container() {
    let children = node.borrow().nodes.clone();
    for child in children {
      let attached = Node::parent_ref(&child)
        .map(|parent| Rc::ptr_eq(&parent, node))
        .unwrap_or(false);
      if !attached {
        continue;
      }
      walk_plugin_node(plugin, &child, result)?;
    }
  }

  exit(plugin, node, result)
}

type PrepareHook =
  Box<dyn Fn(&mut ProcessResult) -> Result<Option<Arc<dyn Plugin>>, ProcessorError> + Send + Sync>;
type RootHook = Box<dyn Fn(&Root, &mut ProcessResult) -> HookResult + Send + Sync>;
type RuleHook = Box<dyn Fn(&Rule, &mut ProcessResult) -> HookResult + Send + Sync>;
type AtRuleHook = Box<dyn Fn(&AtRule, &mut ProcessResult) -> HookResult + Send + Sync>;
type DeclHook = Box<dyn Fn(&Declaration, &mut ProcessResult) -> HookResult + Send + Sync>;
type CommentHook = Box<dyn Fn(&Comment, &mut ProcessResult) -> HookResult + Send + Sync>;

/// Start building a closure-based plugin.
pub fn plugin(name: impl Into<String>) -> PluginBuilder {
  PluginBuilder {
    name: name.into(),
    prepare: None,
    once: None,
    once_exit: None,
    root: None,
    root_exit: None,
    rule: None,
    rule_exit: None,
    at_rule: None,
    at_rule_exit: None,
    decl: None,
    decl_exit: None,
    comment: None,
    comment_exit: None,
  }
}

pub struct PluginBuilder {
  name: String,
  prepare: Option<PrepareHook>,
  once: Option<RootHook>,
  once_exit: Option<RootHook>,
  root: Option<RootHook>,
  root_exit: Option<RootHook>,
  rule: Option<RuleHook>,
  rule_exit: Option<RuleHook>,
  at_rule: Option<AtRuleHook>,
  at_rule_exit: Option<AtRuleHook>,
  decl: Option<DeclHook>,
  decl_exit: Option<DeclHook>,
  comment: Option<CommentHook>,
  comment_exit: Option<CommentHook>,
}

impl PluginBuilder {
  pub fn prepare<F>(mut self, hook: F) -> Self
  where
    F: Fn(&mut ProcessResult) -> Result<Option<Arc<dyn Plugin>>, ProcessorError>
      + Send
      + Sync
      + 'static,
  {
    self.prepare = Some(Box::new(hook));
    self
  }

  pub fn once<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Root, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.once = Some(Box::new(hook));
    self
  }

  pub fn once_exit<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Root, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.once_exit = Some(Box::new(hook));
    self
  }

  pub fn root<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Root, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.root = Some(Box::new(hook));
    self
  }

  pub fn root_exit<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Root, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.root_exit = Some(Box::new(hook));
    self
  }

  pub fn rule<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Rule, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.rule = Some(Box::new(hook));
    self
  }

  pub fn rule_exit<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Rule, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.rule_exit = Some(Box::new(hook));
    self
  }

  pub fn at_rule<F>(mut self, hook: F) -> Self
  where
    F: Fn(&AtRule, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.at_rule = Some(Box::new(hook));
    self
  }

  pub fn at_rule_exit<F>(mut self, hook: F) -> Self
  where
    F: Fn(&AtRule, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.at_rule_exit = Some(Box::new(hook));
    self
  }

  pub fn decl<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Declaration, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.decl = Some(Box::new(hook));
    self
  }

  pub fn decl_exit<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Declaration, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.decl_exit = Some(Box::new(hook));
    self
  }

  pub fn comment<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Comment, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.comment = Some(Box::new(hook));
    self
  }

  pub fn comment_exit<F>(mut self, hook: F) -> Self
  where
    F: Fn(&Comment, &mut ProcessResult) -> HookResult + Send + Sync + 'static,
  {
    self.comment_exit = Some(Box::new(hook));
    self
  }

  pub fn build(self) -> BuiltPlugin {
    BuiltPlugin { inner: self }
  }
}

/// A plugin assembled from closures. Hooks that were not registered are
/// no-ops.
pub struct BuiltPlugin {
  inner: PluginBuilder,
}

impl Plugin for BuiltPlugin {
  fn name(&self) -> &str {
    &self.inner.name
  }

  fn prepare(&self, result: &mut ProcessResult) -> Result<Option<Arc<dyn Plugin>>, ProcessorError> {
    match &self.inner.prepare {
      Some(hook) => hook(result),
      None => Ok(None),
    }
  }

  fn once(&self, root: &Root, result: &mut ProcessResult) -> HookResult {
    match &self.inner.once {
      Some(hook) => hook(root, result),
      None => Ok(()),
    }
  }

  fn once_exit(&self, root: &Root, result: &mut ProcessResult) -> HookResult {
    match &self.inner.once_exit {
      Some(hook) => hook(root, result),
      None => Ok(()),
    }
  }

  fn root(&self, root: &Root, result: &mut ProcessResult) -> HookResult {
    match &self.inner.root {
      Some(hook) => hook(root, result),
      None => Ok(()),
    }
  }

  fn root_exit(&self, root: &Root, result: &mut ProcessResult) -> HookResult {
    match &self.inner.root_exit {
      Some(hook) => hook(root, result),
      None => Ok(()),
    }
  }

  fn rule(&self, rule: &Rule, result: &mut ProcessResult) -> HookResult {
    match &self.inner.rule {
      Some(hook) => hook(rule, result),
      None => Ok(()),
    }
  }

  fn rule_exit(&self, rule: &Rule, result: &mut ProcessResult) -> HookResult {
    match &self.inner.rule_exit {
      Some(hook) => hook(rule, result),
      None => Ok(()),
    }
  }

  fn at_rule(&self, at_rule: &AtRule, result: &mut ProcessResult) -> HookResult {
    match &self.inner.at_rule {
      Some(hook) => hook(at_rule, result),
      None => Ok(()),
    }
  }

  fn at_rule_exit(&self, at_rule: &AtRule, result: &mut ProcessResult) -> HookResult {
    match &self.inner.at_rule_exit {
      Some(hook) => hook(at_rule, result),
      None => Ok(()),
    }
  }

  fn decl(&self, decl: &Declaration, result: &mut ProcessResult) -> HookResult {
    match &self.inner.decl {
      Some(hook) => hook(decl, result),
      None => Ok(()),
    }
  }

  fn decl_exit(&self, decl: &Declaration, result: &mut ProcessResult) -> HookResult {
    match &self.inner.decl_exit {
      Some(hook) => hook(decl, result),
      None => Ok(()),
    }
  }

  fn comment(&self, comment: &Comment, result: &mut ProcessResult) -> HookResult {
    match &self.inner.comment {
      Some(hook) => hook(comment, result),
      None => Ok(()),
    }
  }

  fn comment_exit(&self, comment: &Comment, result: &mut ProcessResult) -> HookResult {
    match &self.inner.comment_exit {
      Some(hook) => hook(comment, result),
      None => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn builder_plugin_rewrites_selectors() {
    let renamer = crate::processor::plugin("postcss-renamer")
      .rule(|rule, _result| {
        let selector = rule.selector();
        if let Some(rest) = selector.strip_prefix(".old") {
          rule.set_selector(format!(".new{}", rest));
        }
        Ok(())
      })
      .build();

    let mut result = Processor::new()
      .plugin(renamer)
      .process(".old { color: red }")
      .unwrap();
    assert_eq!(result.css(), ".new { color: red }");
  }

  #[test]
  fn removed_at_rule_subtree_is_not_visited() {
    let visited = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&visited);
    let dropper = crate::processor::plugin("postcss-dropper")
      .at_rule(|at_rule, _result| {
        if at_rule.name() == "media" {
          at_rule.remove();
        }
        Ok(())
      })
      .decl(move |_decl, _result| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
      })
      .build();

    let mut result = Processor::new()
      .plugin(dropper)
      .process("@media screen { .a { color: red } }\n.b { margin: 0 }")
      .unwrap();
    assert_eq!(result.css(), "\n.b { margin: 0 }");
    assert_eq!(visited.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn prepare_returns_a_fresh_instance_per_run() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let collector = crate::processor::plugin("postcss-collector")
      .prepare(move |_result| {
        let decls = Arc::new(Mutex::new(Vec::new()));
        let hook_decls = Arc::clone(&decls);
        let run_sink = Arc::clone(&sink);
        let instance = crate::processor::plugin("postcss-collector")
          .decl(move |decl, _result| {
            hook_decls.lock().unwrap().push(decl.prop());
            Ok(())
          })
          .once_exit(move |_root, _result| {
            run_sink
              .lock()
              .unwrap()
              .push(decls.lock().unwrap().clone());
            Ok(())
          })
          .build();
        Ok(Some(Arc::new(instance) as Arc<dyn Plugin>))
      })
      .build();

    let processor = Processor::new().plugin(collector);
    processor.process(".a { color: red }").unwrap();
    processor.process(".b { margin: 0 }").unwrap();

    let runs = seen.lock().unwrap().clone();
    assert_eq!(runs, vec![vec!["color".to_string()], vec!["margin".to_string()]]);
  }

  #[test]
  fn parse_errors_surface_as_processor_errors() {
    let error = Processor::new().process(".a {").unwrap_err();
    assert!(matches!(error, ProcessorError::Parse(_)));
    assert!(error.to_string().contains("Unclosed block"));
  }

  #[test]
  fn hooks_see_the_plugin_name_on_warnings() {
    let warner = crate::processor::plugin("postcss-warner")
      .rule(|rule, result| {
        rule.warn(result, "suspicious selector", Default::default());
        Ok(())
      })
      .build();

    let result = Processor::new()
      .plugin(warner)
      .process(".a { color: red }")
      .unwrap();
    assert_eq!(result.warnings().len(), 1);
    assert_eq!(
      result.warnings()[0].plugin.as_deref(),
      Some("postcss-warner")
    );
    assert_eq!(result.warnings()[0].line, Some(1));
  }
}
