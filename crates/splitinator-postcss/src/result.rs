use std::fmt;

use crate::ast::nodes::Root;
use crate::ast::NodeRef;

/// Optional context attached to a warning.
#[derive(Clone, Debug, Default)]
pub struct WarningOptions {
  /// Node the warning refers to; its source span is copied into the warning.
  pub node: Option<NodeRef>,
  /// Override for the plugin name; defaults to the plugin currently running.
  pub plugin: Option<String>,
}

impl WarningOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_node(mut self, node: NodeRef) -> Self {
    self.node = Some(node);
    self
  }

  pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
    self.plugin = Some(plugin.into());
    self
  }
}

/// One diagnostic produced during a processing run.
#[derive(Clone, Debug)]
pub struct Warning {
  pub text: String,
  pub plugin: Option<String>,
  pub node: Option<NodeRef>,
  pub line: Option<u32>,
  pub column: Option<u32>,
  pub end_line: Option<u32>,
  pub end_column: Option<u32>,
}

impl Warning {
  fn new(text: String, last_plugin: Option<&str>, opts: WarningOptions) -> Self {
    let plugin = opts
      .plugin
      .or_else(|| last_plugin.map(|name| name.to_string()));
    let (line, column, end_line, end_column) = match &opts.node {
      Some(node) => {
        let source = node.borrow().source.clone();
        (
          source.start.map(|p| p.line),
          source.start.map(|p| p.column),
          source.end.map(|p| p.line),
          source.end.map(|p| p.column),
        )
      }
      None => (None, None, None, None),
    };
    Warning {
      text,
      plugin,
      node: opts.node,
      line,
      column,
      end_line,
      end_column,
    }
  }
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(plugin) = &self.plugin {
      write!(f, "{}: ", plugin)?;
    }
    if let (Some(line), Some(column)) = (self.line, self.column) {
      write!(f, "{}:{}: ", line, column)?;
    }
    f.write_str(&self.text)
  }
}

/// Non-warning message recorded by a plugin (dependencies, notes).
#[derive(Clone, Debug)]
pub struct Message {
  pub message_type: String,
  pub plugin: Option<String>,
  pub text: String,
}

/// Outcome of one processing run: the (possibly mutated) tree, the
/// stringified output, and every diagnostic the plugins recorded.
#[derive(Debug)]
pub struct Result {
  root: Root,
  from: Option<String>,
  css: Option<String>,
  warnings: Vec<Warning>,
  messages: Vec<Message>,
  last_plugin: Option<String>,
}

impl Result {
  pub fn new(root: Root, from: Option<String>) -> Self {
    Result {
      root,
      from,
      css: None,
      warnings: Vec::new(),
      messages: Vec::new(),
      last_plugin: None,
    }
  }

  pub fn root(&self) -> &Root {
    &self.root
  }

  pub fn from(&self) -> Option<&str> {
    self.from.as_deref()
  }

  /// Stringify the tree, caching the text. Mutation after the first call is
  /// a plugin-ordering bug; the processor only stringifies once all plugins
  /// have run.
  pub fn css(&mut self) -> &str {
    if self.css.is_none() {
      self.css = Some(crate::stringifier::stringify(&self.root));
    }
    self.css.as_deref().unwrap_or_default()
  }

  pub fn warnings(&self) -> &[Warning] {
    &self.warnings
  }

  pub fn messages(&self) -> &[Message] {
    &self.messages
  }

  pub fn last_plugin(&self) -> Option<&str> {
    self.last_plugin.as_deref()
  }

  pub fn set_last_plugin(&mut self, plugin: Option<String>) {
    self.last_plugin = plugin;
  }

  /// Record a warning. Prefer [`NodeAccess::warn`] from hook code so the
  /// node's span is attached automatically.
  pub fn warn(&mut self, text: impl Into<String>, opts: WarningOptions) -> Warning {
    let warning = Warning::new(text.into(), self.last_plugin.as_deref(), opts);
    self.messages.push(Message {
      message_type: "warning".into(),
      plugin: warning.plugin.clone(),
      text: warning.text.clone(),
    });
    self.warnings.push(warning.clone());
    warning
  }
}
