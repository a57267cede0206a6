//! CSS parser: a tokenizer feeding a recursive-descent tree builder. Raw
//! formatting fragments (`before`, `between`, `after`, `afterName`,
//! `semicolon`, `important`) are recorded on every node so an untouched
//! tree restringifies the way it was written.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::ast::nodes::{self, Root};
use crate::ast::{Node, NodeData, NodeRef, Position};

mod tokenizer;

use tokenizer::{LineIndex, Token, TokenKind, Tokenizer};

/// Syntax error with a one-based source position.
#[derive(Clone, Debug)]
pub struct ParseError {
  pub message: String,
  pub line: u32,
  pub column: u32,
}

impl ParseError {
  pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
    ParseError {
      message: message.into(),
      line,
      column,
    }
  }
}

impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}: {}", self.line, self.column, self.message)
  }
}

impl Error for ParseError {}

/// Parse a stylesheet into a [`Root`].
pub fn parse(css: &str) -> Result<Root, ParseError> {
  let mut parser = Parser::new(css);
  parser.run()?;
  Ok(Root::from_node(parser.root))
}

struct Parser {
  tokenizer: Tokenizer,
  index: LineIndex,
  input_len: usize,
  root: NodeRef,
  current: NodeRef,
  spaces: String,
  semicolon: bool,
}

impl Parser {
  fn new(css: &str) -> Self {
    let root = Node::new(NodeData::Root(nodes::RootData));
    root.borrow_mut().source.start = Some(Position {
      line: 1,
      column: 1,
      offset: 0,
    });
    Parser {
      tokenizer: Tokenizer::new(css),
      index: LineIndex::new(css),
      input_len: css.len(),
      root: root.clone(),
      current: root,
      spaces: String::new(),
      semicolon: false,
    }
  }

  fn run(&mut self) -> Result<(), ParseError> {
    while let Some(token) = self.tokenizer.next()? {
      match token.kind {
        TokenKind::Space => self.spaces.push_str(&token.value),
        TokenKind::Semicolon => self.spaces.push_str(&token.value),
        TokenKind::CloseCurly => self.end(&token)?,
        TokenKind::Comment => self.comment(&token),
        TokenKind::AtWord => self.atrule(token)?,
        TokenKind::OpenCurly => self.empty_rule(&token),
        _ => self.other(token)?,
      }
    }
    self.end_file()
  }

  fn position(&self, offset: usize) -> Position {
    let (line, column) = self.index.line_column(offset);
    Position {
      line,
      column,
      offset,
    }
  }

  fn error_at(&self, message: &str, offset: usize) -> ParseError {
    let (line, column) = self.index.line_column(offset);
    ParseError::new(message, line, column)
  }

  /// Attach a freshly built node to the current container, consuming the
  /// pending whitespace as its `before` raw.
  fn init(&mut self, node: &NodeRef, start_offset: usize) {
    let before = std::mem::take(&mut self.spaces);
    {
      let mut inner = node.borrow_mut();
      inner.raws.set("before", before);
      inner.source.start = Some(self.position(start_offset));
    }
    Node::append(&self.current, node.clone());
    self.semicolon = false;
  }

  fn set_end(&self, node: &NodeRef, end_offset: usize) {
    node.borrow_mut().source.end = Some(self.position(end_offset.saturating_sub(1)));
  }

  fn comment(&mut self, token: &Token) {
    let body = &token.value[2..token.value.len() - 2];
    let text = body.trim();
    let left_len = body.len() - body.trim_start().len();
    let left = &body[..left_len];
    let right = &body[body.trim_end().len()..];

    let node = Node::new(NodeData::Comment(nodes::CommentData {
      text: text.to_string(),
    }));
    {
      let mut inner = node.borrow_mut();
      inner.raws.set("left", left);
      inner.raws.set("right", right);
    }
    self.init(&node, token.start);
    self.set_end(&node, token.end);
  }

  fn empty_rule(&mut self, token: &Token) {
    let node = Node::new(NodeData::Rule(nodes::RuleData {
      selector: String::new(),
    }));
    self.init(&node, token.start);
    node.borrow_mut().raws.set("between", "");
    self.current = node;
  }

  fn atrule(&mut self, first: Token) -> Result<(), ParseError> {
    let name = first.value[1..].to_string();
    let node = Node::new(NodeData::AtRule(nodes::AtRuleData {
      name,
      params: String::new(),
    }));
    self.init(&node, first.start);

    let mut params_tokens: Vec<Token> = Vec::new();
    let mut open = false;
    let mut end_offset = first.end;
    loop {
      match self.tokenizer.next()? {
        None => break,
        Some(token) => match token.kind {
          TokenKind::Semicolon => {
            end_offset = token.end;
            break;
          }
          TokenKind::OpenCurly => {
            open = true;
            break;
          }
          TokenKind::CloseCurly => {
            self.tokenizer.back(token);
            break;
          }
          _ => {
            end_offset = token.end;
            params_tokens.push(token);
          }
        },
      }
    }

    let mut after_name = String::new();
    while params_tokens
      .first()
      .map_or(false, |t| t.kind == TokenKind::Space)
    {
      after_name.push_str(&params_tokens.remove(0).value);
    }
    let mut between = String::new();
    while params_tokens
      .last()
      .map_or(false, |t| t.kind == TokenKind::Space)
    {
      let token = params_tokens.pop().unwrap_or_else(|| unreachable!());
      between.insert_str(0, &token.value);
    }
    let params: String = params_tokens.iter().map(|t| t.value.as_str()).collect();

    {
      let mut inner = node.borrow_mut();
      if let Some(data) = inner.as_at_rule_mut() {
        data.params = params;
      }
      inner.raws.set("afterName", after_name);
      if open {
        inner.raws.set("between", between);
      } else {
        inner.raws.set_flag("selfClosing", true);
      }
    }
    self.set_end(&node, end_offset);
    if open {
      self.current = node;
    }
    Ok(())
  }

  fn rule(&mut self, mut tokens: Vec<Token>) -> Result<(), ParseError> {
    let start = tokens[0].start;
    let mut between = String::new();
    while tokens.last().map_or(false, |t| t.kind == TokenKind::Space) {
      let token = tokens.pop().unwrap_or_else(|| unreachable!());
      between.insert_str(0, &token.value);
    }
    let selector: String = tokens.iter().map(|t| t.value.as_str()).collect();

    let node = Node::new(NodeData::Rule(nodes::RuleData { selector }));
    self.init(&node, start);
    node.borrow_mut().raws.set("between", between);
    self.current = node;
    Ok(())
  }

  fn decl(&mut self, mut tokens: Vec<Token>, with_semicolon: bool) -> Result<(), ParseError> {
    let start = tokens[0].start;
    let mut end_offset = tokens.last().map(|t| t.end).unwrap_or(start);

    let first = tokens.remove(0);
    if first.kind != TokenKind::Word {
      return Err(self.error_at("Unknown word", first.start));
    }
    let prop = first.value;
    let custom_property = prop.starts_with("--");

    let mut between = String::new();
    let mut found_colon = false;
    while !tokens.is_empty() {
      let token = tokens.remove(0);
      match token.kind {
        TokenKind::Colon => {
          between.push(':');
          found_colon = true;
          break;
        }
        TokenKind::Space | TokenKind::Comment => between.push_str(&token.value),
        _ => return Err(self.error_at("Unknown word", token.start)),
      }
    }
    if !found_colon {
      return Err(self.error_at("Unknown word", start));
    }
    while tokens.first().map_or(false, |t| t.kind == TokenKind::Space) {
      between.push_str(&tokens.remove(0).value);
    }

    // `!important`, possibly separated from the value by whitespace.
    let mut important = false;
    let mut important_raw: Option<String> = None;
    let mut last = tokens.len();
    while last > 0 && tokens[last - 1].kind == TokenKind::Space {
      last -= 1;
    }
    if last > 0
      && tokens[last - 1].kind == TokenKind::Word
      && tokens[last - 1].value.eq_ignore_ascii_case("!important")
    {
      important = true;
      let mut cut = last - 1;
      while cut > 0 && tokens[cut - 1].kind == TokenKind::Space {
        cut -= 1;
      }
      let raw: String = tokens[cut..last].iter().map(|t| t.value.as_str()).collect();
      if raw != " !important" {
        important_raw = Some(raw);
      }
      tokens.truncate(cut);
    }

    if !custom_property {
      while tokens.last().map_or(false, |t| t.kind == TokenKind::Space) {
        tokens.pop();
      }
    }
    if let Some(token) = tokens.last() {
      end_offset = end_offset.max(token.end);
    }
    let value: String = tokens.iter().map(|t| t.value.as_str()).collect();

    let node = Node::new(NodeData::Declaration(nodes::DeclarationData {
      prop,
      value,
      important,
    }));
    self.init(&node, start);
    {
      let mut inner = node.borrow_mut();
      inner.raws.set("between", between);
      if let Some(raw) = important_raw {
        inner.raws.set("important", raw);
      }
    }
    self.set_end(&node, end_offset);
    if with_semicolon {
      self.semicolon = true;
    }
    Ok(())
  }

  /// Accumulate tokens until the construct reveals itself as a declaration
  /// (`;` or block end) or a rule (`{`).
  fn other(&mut self, first: Token) -> Result<(), ParseError> {
    let mut tokens = vec![first];
    let mut brackets: Vec<TokenKind> = Vec::new();
    let mut colon = false;

    loop {
      let token = match self.tokenizer.next()? {
        Some(token) => token,
        None => break,
      };
      if brackets.is_empty() {
        match token.kind {
          TokenKind::Semicolon => return self.decl(tokens, true),
          TokenKind::OpenCurly => return self.rule(tokens),
          TokenKind::CloseCurly => {
            self.tokenizer.back(token);
            break;
          }
          TokenKind::Colon => colon = true,
          TokenKind::OpenParen | TokenKind::OpenSquare => brackets.push(token.kind),
          _ => {}
        }
      } else {
        match token.kind {
          TokenKind::CloseParen if brackets.last() == Some(&TokenKind::OpenParen) => {
            brackets.pop();
          }
          TokenKind::CloseSquare if brackets.last() == Some(&TokenKind::OpenSquare) => {
            brackets.pop();
          }
          _ => {}
        }
      }
      tokens.push(token);
    }

    if colon {
      let custom_property = tokens
        .first()
        .map_or(false, |t| t.value.starts_with("--"));
      if !custom_property {
        while tokens
          .last()
          .map_or(false, |t| matches!(t.kind, TokenKind::Space | TokenKind::Comment))
        {
          let token = tokens.pop().unwrap_or_else(|| unreachable!());
          self.tokenizer.back(token);
        }
      }
      self.decl(tokens, false)
    } else {
      let offset = tokens[0].start;
      Err(self.error_at("Unknown word", offset))
    }
  }

  fn end(&mut self, token: &Token) -> Result<(), ParseError> {
    if Rc::ptr_eq(&self.current, &self.root) {
      return Err(self.error_at("Unexpected }", token.start));
    }
    let after = std::mem::take(&mut self.spaces);
    {
      let mut inner = self.current.borrow_mut();
      inner.raws.set("after", after);
      inner.raws.set_flag("semicolon", self.semicolon);
    }
    self.semicolon = false;
    self.set_end(&self.current, token.end);
    let parent = Node::parent_ref(&self.current);
    self.current = parent.unwrap_or_else(|| self.root.clone());
    Ok(())
  }

  fn end_file(&mut self) -> Result<(), ParseError> {
    if !Rc::ptr_eq(&self.current, &self.root) {
      let offset = self
        .current
        .borrow()
        .source
        .start
        .map(|p| p.offset)
        .unwrap_or(0);
      return Err(self.error_at("Unclosed block", offset));
    }
    let after = std::mem::take(&mut self.spaces);
    self.root.borrow_mut().raws.set("after", after);
    self.root.borrow_mut().source.end = Some(self.position(self.input_len.saturating_sub(1)));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::ast::nodes::{as_at_rule, as_declaration, as_rule};
  use crate::ast::NodeAccess;

  #[test]
  fn parses_a_rule_with_declarations() {
    let root = parse(".a { color: red; --gap: 4px }").unwrap();
    let nodes = root.nodes();
    assert_eq!(nodes.len(), 1);
    let rule = as_rule(&nodes[0]).unwrap();
    assert_eq!(rule.selector(), ".a");
    let decls = rule.nodes();
    assert_eq!(decls.len(), 2);
    let first = as_declaration(&decls[0]).unwrap();
    assert_eq!(first.prop(), "color");
    assert_eq!(first.value(), "red");
    let second = as_declaration(&decls[1]).unwrap();
    assert_eq!(second.prop(), "--gap");
    assert_eq!(second.value(), "4px");
  }

  #[test]
  fn parses_container_at_rule_params() {
    let root = parse("@container (--density: spacious) { .a { --x: 1px; } }").unwrap();
    let at_rule = as_at_rule(&root.nodes()[0]).unwrap();
    assert_eq!(at_rule.name(), "container");
    assert_eq!(at_rule.params(), "(--density: spacious)");
    assert_eq!(at_rule.nodes().len(), 1);
  }

  #[test]
  fn records_positions() {
    let root = parse(".a {\n  color: red;\n}\n").unwrap();
    let rule = root.nodes()[0].clone();
    let start = rule.borrow().source.start.unwrap();
    assert_eq!((start.line, start.column), (1, 1));
    let decl = rule.borrow().nodes[0].clone();
    let start = decl.borrow().source.start.unwrap();
    assert_eq!((start.line, start.column), (2, 3));
  }

  #[test]
  fn parses_important_with_nonstandard_spacing() {
    let root = parse(".a { color: red  !IMPORTANT; }").unwrap();
    let rule = as_rule(&root.nodes()[0]).unwrap();
    let decl = as_declaration(&rule.nodes()[0]).unwrap();
    assert!(decl.important());
    assert_eq!(decl.value(), "red");
    assert_eq!(
      decl.borrow().raws.get("important"),
      Some("  !IMPORTANT")
    );
  }

  #[test]
  fn unexpected_close_brace_errors() {
    let error = parse("}").unwrap_err();
    assert!(error.to_string().contains("Unexpected }"));
    assert_eq!((error.line, error.column), (1, 1));
  }

  #[test]
  fn unclosed_block_errors() {
    let error = parse(".a { color: red;").unwrap_err();
    assert!(error.to_string().contains("Unclosed block"));
  }

  #[test]
  fn word_without_colon_errors() {
    let error = parse(".a { red }").unwrap_err();
    assert!(error.to_string().contains("Unknown word"));
  }

  #[test]
  fn untouched_tree_restringifies_identically() {
    let css = indoc! {"
      /* header */
      @container (--density: spacious) {
        .foo.is-active {
          --color: var(--base, var(--fallback));
          --spacing: 8px;
        }
      }

      .plain { color: red }
    "};
    let root = parse(css).unwrap();
    assert_eq!(crate::stringifier::stringify(&root), css);
  }

  #[test]
  fn bodyless_at_rule_round_trips() {
    let css = "@layer base;\n.a {\n  color: red;\n}\n";
    let root = parse(css).unwrap();
    assert_eq!(crate::stringifier::stringify(&root), css);
  }
}
