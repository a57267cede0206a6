use super::ParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
  Space,
  Word,
  AtWord,
  String,
  Brackets,
  Comment,
  OpenCurly,
  CloseCurly,
  OpenParen,
  CloseParen,
  OpenSquare,
  CloseSquare,
  Colon,
  Semicolon,
}

/// One lexical token. `start`/`end` are byte offsets into the input;
/// `end` is exclusive.
#[derive(Clone, Debug)]
pub struct Token {
  pub kind: TokenKind,
  pub value: String,
  pub start: usize,
  pub end: usize,
}

/// Byte-offset to line/column conversion table.
#[derive(Clone, Debug)]
pub struct LineIndex {
  line_starts: Vec<usize>,
}

impl LineIndex {
  pub fn new(css: &str) -> Self {
    let mut line_starts = vec![0];
    for (offset, byte) in css.bytes().enumerate() {
      if byte == b'\n' {
        line_starts.push(offset + 1);
      }
    }
    LineIndex { line_starts }
  }

  /// One-based line and column for a byte offset.
  pub fn line_column(&self, offset: usize) -> (u32, u32) {
    let line = self.line_starts.partition_point(|start| *start <= offset) - 1;
    let column = offset - self.line_starts[line] + 1;
    (line as u32 + 1, column as u32)
  }
}

fn is_space(byte: u8) -> bool {
  matches!(byte, b' ' | b'\n' | b'\t' | b'\r' | b'\x0c')
}

fn is_word_end(byte: u8) -> bool {
  matches!(
    byte,
    b'(' | b')' | b'{' | b'}' | b'[' | b']' | b':' | b';' | b'@' | b'!' | b'\'' | b'"' | b'\\'
  ) || is_space(byte)
}

pub struct Tokenizer {
  bytes: Vec<u8>,
  pos: usize,
  returned: Vec<Token>,
  index: LineIndex,
}

impl Tokenizer {
  pub fn new(css: &str) -> Self {
    Tokenizer {
      bytes: css.as_bytes().to_vec(),
      pos: 0,
      returned: Vec::new(),
      index: LineIndex::new(css),
    }
  }

  /// Push a token back so the next call returns it again.
  pub fn back(&mut self, token: Token) {
    self.returned.push(token);
  }

  fn error(&self, message: &str, offset: usize) -> ParseError {
    let (line, column) = self.index.line_column(offset);
    ParseError::new(message, line, column)
  }

  fn slice(&self, start: usize, end: usize) -> String {
    String::from_utf8_lossy(&self.bytes[start..end]).into_owned()
  }

  fn token(&self, kind: TokenKind, start: usize, end: usize) -> Token {
    Token {
      kind,
      value: self.slice(start, end),
      start,
      end,
    }
  }

  pub fn next(&mut self) -> Result<Option<Token>, ParseError> {
    if let Some(token) = self.returned.pop() {
      return Ok(Some(token));
    }
    let start = self.pos;
    let byte = match self.bytes.get(start) {
      Some(byte) => *byte,
      None => return Ok(None),
    };

    let token = match byte {
      _ if is_space(byte) => {
        let mut end = start + 1;
        while self.bytes.get(end).copied().map_or(false, is_space) {
          end += 1;
        }
        self.pos = end;
        self.token(TokenKind::Space, start, end)
      }
      b'{' => self.punct(TokenKind::OpenCurly, start),
      b'}' => self.punct(TokenKind::CloseCurly, start),
      b')' => self.punct(TokenKind::CloseParen, start),
      b'[' => self.punct(TokenKind::OpenSquare, start),
      b']' => self.punct(TokenKind::CloseSquare, start),
      b':' => self.punct(TokenKind::Colon, start),
      b';' => self.punct(TokenKind::Semicolon, start),
      b'\'' | b'"' => self.string(start, byte)?,
      b'/' if self.bytes.get(start + 1) == Some(&b'*') => self.comment(start)?,
      b'(' => self.brackets(start),
      b'@' => {
        let end = self.word_end(start + 1);
        self.pos = end;
        self.token(TokenKind::AtWord, start, end)
      }
      _ => {
        let end = self.word_end(start + 1);
        self.pos = end;
        self.token(TokenKind::Word, start, end)
      }
    };
    Ok(Some(token))
  }

  fn punct(&mut self, kind: TokenKind, start: usize) -> Token {
    self.pos = start + 1;
    self.token(kind, start, start + 1)
  }

  fn word_end(&self, mut pos: usize) -> usize {
    while let Some(byte) = self.bytes.get(pos).copied() {
      if byte == b'\\' {
        pos += 2;
        continue;
      }
      if byte == b'/' && self.bytes.get(pos + 1) == Some(&b'*') {
        break;
      }
      if is_word_end(byte) {
        break;
      }
      pos += 1;
    }
    pos.min(self.bytes.len())
  }

  fn string(&mut self, start: usize, quote: u8) -> Result<Token, ParseError> {
    let mut pos = start + 1;
    loop {
      match self.bytes.get(pos).copied() {
        Some(b'\\') => pos += 2,
        Some(byte) if byte == quote => {
          pos += 1;
          break;
        }
        Some(_) => pos += 1,
        None => return Err(self.error("Unclosed string", start)),
      }
    }
    self.pos = pos.min(self.bytes.len());
    Ok(self.token(TokenKind::String, start, self.pos))
  }

  fn comment(&mut self, start: usize) -> Result<Token, ParseError> {
    let mut pos = start + 2;
    loop {
      match self.bytes.get(pos).copied() {
        Some(b'*') if self.bytes.get(pos + 1) == Some(&b'/') => {
          pos += 2;
          break;
        }
        Some(_) => pos += 1,
        None => return Err(self.error("Unclosed comment", start)),
      }
    }
    self.pos = pos;
    Ok(self.token(TokenKind::Comment, start, pos))
  }

  /// A parenthesized run with no nested quotes, parens, comments, escapes,
  /// or newlines is emitted as one `Brackets` token; anything trickier
  /// falls back to a plain open-paren token.
  fn brackets(&mut self, start: usize) -> Token {
    let mut pos = start + 1;
    while let Some(byte) = self.bytes.get(pos).copied() {
      match byte {
        b')' => {
          self.pos = pos + 1;
          return self.token(TokenKind::Brackets, start, pos + 1);
        }
        b'\'' | b'"' | b'(' | b'/' | b'\\' | b'\n' => break,
        _ => pos += 1,
      }
    }
    self.punct(TokenKind::OpenParen, start)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(css: &str) -> Vec<TokenKind> {
    let mut tokenizer = Tokenizer::new(css);
    let mut out = Vec::new();
    while let Some(token) = tokenizer.next().unwrap() {
      out.push(token.kind);
    }
    out
  }

  fn values(css: &str) -> Vec<String> {
    let mut tokenizer = Tokenizer::new(css);
    let mut out = Vec::new();
    while let Some(token) = tokenizer.next().unwrap() {
      out.push(token.value);
    }
    out
  }

  #[test]
  fn tokenizes_a_simple_rule() {
    assert_eq!(
      kinds(".a { color: red; }"),
      vec![
        TokenKind::Word,
        TokenKind::Space,
        TokenKind::OpenCurly,
        TokenKind::Space,
        TokenKind::Word,
        TokenKind::Colon,
        TokenKind::Space,
        TokenKind::Word,
        TokenKind::Semicolon,
        TokenKind::Space,
        TokenKind::CloseCurly,
      ]
    );
  }

  #[test]
  fn container_query_params_form_one_brackets_token() {
    assert_eq!(
      values("@container (--density: spacious)"),
      vec!["@container", " ", "(--density: spacious)"]
    );
  }

  #[test]
  fn nested_var_calls_fall_back_to_paren_tokens() {
    let kinds = kinds("var(--a, var(--b))");
    assert!(kinds.contains(&TokenKind::OpenParen));
    assert!(kinds.contains(&TokenKind::Brackets));
  }

  #[test]
  fn comma_stays_inside_words() {
    assert_eq!(values(".a,.b"), vec![".a,.b"]);
  }

  #[test]
  fn unclosed_string_reports_position() {
    let mut tokenizer = Tokenizer::new(".a { content: \"x");
    let mut error = None;
    loop {
      match tokenizer.next() {
        Ok(Some(_)) => continue,
        Ok(None) => break,
        Err(e) => {
          error = Some(e);
          break;
        }
      }
    }
    let error = error.expect("expected a tokenizer error");
    assert_eq!(error.line, 1);
    assert_eq!(error.column, 15);
    assert!(error.to_string().contains("Unclosed string"));
  }

  #[test]
  fn unclosed_comment_is_an_error() {
    let mut tokenizer = Tokenizer::new("/* never ends");
    assert!(tokenizer.next().is_err());
  }

  #[test]
  fn line_index_maps_offsets() {
    let index = LineIndex::new("ab\ncd\n");
    assert_eq!(index.line_column(0), (1, 1));
    assert_eq!(index.line_column(4), (2, 2));
  }
}
