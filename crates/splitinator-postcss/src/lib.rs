//! A compact, synchronous PostCSS-style CSS tree: parser, mutable AST,
//! stringifier with raw-formatting detection, selector-list splitting, a
//! structured warning channel, and a plugin/processor host.

pub mod ast;
pub mod list;
pub mod parse;
pub mod processor;
pub mod result;
pub mod stringifier;

pub use ast::nodes::{
  as_at_rule, as_comment, as_declaration, as_rule, at_rule_with_raws, comment_with_raws,
  declaration_with_raws, rule_with_raws, AtRule, Comment, Declaration, NodeKind, Root, Rule,
};
pub use ast::{find_root, Node, NodeAccess, NodeData, NodeRef, Position, RawData, Source};
pub use parse::{parse, ParseError};
pub use processor::{
  plugin, BuiltPlugin, HookResult, IntoPlugin, Plugin, PluginBuilder, ProcessOptions, Processor,
  ProcessorError,
};
pub use result::{Message, Result, Warning, WarningOptions};
pub use stringifier::{node_to_string, stringify};
