//! Indentation-aware tokenizer for Python model sources.
//!
//! Produces `Newline`/`Indent`/`Dedent` tokens the way the Python tokenizer
//! does, so the parser can recover block structure. Only the lexical
//! features that appear in real model files are handled precisely; anything
//! else is still tokenized well enough to be skipped.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Number(String),
    Str {
        value: String,
        /// f-strings and byte strings have no plain string value.
        plain: bool,
    },
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        matches!(self.kind, TokenKind::Op(o) if o == op)
    }

    pub fn is_name(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Name(n) if n == name)
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn opens(&self) -> bool {
        self.is_op("(") || self.is_op("[") || self.is_op("{")
    }

    pub fn closes(&self) -> bool {
        self.is_op(")") || self.is_op("]") || self.is_op("}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LexError {}

const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "->", ":=", "==", "!=", "<=", ">=", "**", "//", "<<",
    ">>", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "(", ")", "[", "]", "{", "}",
    ",", ":", ";", ".", "=", "+", "-", "*", "/", "%", "&", "|", "^", "~", "<", ">", "@", "!",
];

const TAB_SIZE: usize = 8;

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    brackets: Vec<(char, usize)>,
    at_line_start: bool,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        tokens: Vec::new(),
        indents: vec![0],
        brackets: Vec::new(),
        at_line_start: true,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            line: self.line,
            message: message.into(),
        }
    }

    fn push(&mut self, kind: TokenKind, line: usize) {
        self.tokens.push(Token { kind, line });
    }

    fn last_is_newline(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline) | Some(TokenKind::Indent) | Some(TokenKind::Dedent)
        )
    }

    fn run(&mut self) -> Result<(), LexError> {
        // a UTF-8 BOM is not part of the first line's indentation
        if self.peek() == Some('\u{feff}') {
            self.pos += 1;
        }
        while self.pos < self.chars.len() {
            if self.at_line_start && self.brackets.is_empty() {
                self.at_line_start = false;
                if self.handle_indentation()? {
                    continue;
                }
            }
            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\x0c' | '\r' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' if matches!(self.peek_at(1), Some('\n')) || self.crlf_continuation() => {
                    self.pos += if self.peek_at(1) == Some('\r') { 3 } else { 2 };
                    self.line += 1;
                }
                '\n' => {
                    if self.brackets.is_empty() && !self.last_is_newline() {
                        self.push(TokenKind::Newline, self.line);
                    }
                    self.pos += 1;
                    self.line += 1;
                    self.at_line_start = self.brackets.is_empty();
                }
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) =>
                {
                    self.lex_number()
                }
                c if c == '_' || c.is_alphabetic() => self.lex_name_or_string()?,
                '"' | '\'' => self.lex_string(String::new())?,
                _ => self.lex_operator()?,
            }
        }

        if let Some((open, line)) = self.brackets.last() {
            return Err(LexError {
                line: *line,
                message: format!("'{}' was never closed", open),
            });
        }
        if !self.last_is_newline() {
            self.push(TokenKind::Newline, self.line);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, self.line);
        }
        self.push(TokenKind::EndMarker, self.line);
        Ok(())
    }

    fn crlf_continuation(&self) -> bool {
        self.peek_at(1) == Some('\r') && self.peek_at(2) == Some('\n')
    }

    /// Measures leading whitespace and emits indent/dedent tokens.
    ///
    /// Returns true when the whole line was blank or a comment.
    fn handle_indentation(&mut self) -> Result<bool, LexError> {
        let mut width = 0usize;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / TAB_SIZE + 1) * TAB_SIZE,
                '\x0c' => width = 0,
                _ => break,
            }
            self.pos += 1;
        }
        match self.peek() {
            None => return Ok(true),
            Some('#') => {
                self.skip_comment();
                return Ok(true);
            }
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                self.at_line_start = true;
                return Ok(true);
            }
            Some('\r') if self.peek_at(1) == Some('\n') => {
                self.pos += 2;
                self.line += 1;
                self.at_line_start = true;
                return Ok(true);
            }
            _ => {}
        }

        let current = *self.indents.last().unwrap_or(&0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, self.line);
        } else if width < current {
            while self.indents.last().is_some_and(|&w| w > width) {
                self.indents.pop();
                self.push(TokenKind::Dedent, self.line);
            }
            if self.indents.last() != Some(&width) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(false)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn lex_number(&mut self) {
        let line = self.line;
        let start = self.pos;
        let radix_prefix = self.peek() == Some('0')
            && matches!(self.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'));
        if radix_prefix {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit() || c == '_') {
                self.pos += 1;
            }
        } else {
            while let Some(c) = self.peek() {
                let exponent_sign = matches!(c, '+' | '-')
                    && matches!(self.chars.get(self.pos - 1), Some('e' | 'E'));
                if c.is_ascii_digit() || c == '_' || c == '.' || matches!(c, 'e' | 'E') || exponent_sign
                {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if matches!(self.peek(), Some('j' | 'J')) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Number(text), line);
    }

    fn lex_name_or_string(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c == '_' || c.is_alphanumeric())
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let is_prefix = word.len() <= 2
            && word
                .chars()
                .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'u' | 'f'));
        if is_prefix && matches!(self.peek(), Some('"' | '\'')) {
            return self.lex_string(word.to_ascii_lowercase());
        }
        self.push(TokenKind::Name(word), self.line);
        Ok(())
    }

    fn lex_string(&mut self, prefix: String) -> Result<(), LexError> {
        let line = self.line;
        let Some(quote) = self.peek() else {
            return Err(self.error("unexpected end of input"));
        };
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };
        let raw = prefix.contains('r');
        let mut value = String::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(LexError {
                    line,
                    message: "unterminated string literal".to_string(),
                });
            };
            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }
            if c == '\n' {
                if !triple {
                    return Err(LexError {
                        line,
                        message: "unterminated string literal".to_string(),
                    });
                }
                self.line += 1;
            }
            if c == '\\' {
                let Some(next) = self.peek_at(1) else {
                    return Err(LexError {
                        line,
                        message: "unterminated string literal".to_string(),
                    });
                };
                self.pos += 2;
                if next == '\n' {
                    self.line += 1;
                }
                if raw {
                    value.push('\\');
                    value.push(next);
                } else {
                    self.unescape(next, &mut value);
                }
                continue;
            }
            value.push(c);
            self.pos += 1;
        }

        let plain = !prefix.contains('f') && !prefix.contains('b');
        // adjacent literals concatenate
        if let Some(Token {
            kind: TokenKind::Str { value: prev, plain: prev_plain },
            ..
        }) = self.tokens.last_mut()
        {
            prev.push_str(&value);
            *prev_plain = *prev_plain && plain;
            return Ok(());
        }
        self.push(TokenKind::Str { value, plain }, line);
        Ok(())
    }

    fn unescape(&mut self, next: char, out: &mut String) {
        match next {
            '\n' => {}
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'x' => self.unescape_hex(2, out, 'x'),
            'u' => self.unescape_hex(4, out, 'u'),
            'U' => self.unescape_hex(8, out, 'U'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    fn unescape_hex(&mut self, digits: usize, out: &mut String, marker: char) {
        let end = (self.pos + digits).min(self.chars.len());
        let hex: String = self.chars[self.pos..end].iter().collect();
        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
            Some(ch) if hex.len() == digits => {
                out.push(ch);
                self.pos = end;
            }
            _ => {
                out.push('\\');
                out.push(marker);
            }
        }
    }

    fn lex_operator(&mut self) -> Result<(), LexError> {
        let line = self.line;
        let rest = self.src_from_pos();
        let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
            return Err(self.error(format!(
                "invalid character '{}'",
                self.peek().unwrap_or_default()
            )));
        };
        self.pos += op.chars().count();

        match *op {
            "(" | "[" | "{" => {
                let open = op.chars().next().unwrap_or('(');
                self.brackets.push((open, line));
            }
            ")" | "]" | "}" => {
                let expected = match *op {
                    ")" => '(',
                    "]" => '[',
                    _ => '{',
                };
                match self.brackets.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, _)) => {
                        return Err(LexError {
                            line,
                            message: format!(
                                "closing '{}' does not match opening '{}'",
                                op, open
                            ),
                        })
                    }
                    None => {
                        return Err(LexError {
                            line,
                            message: format!("unmatched '{}'", op),
                        })
                    }
                }
            }
            _ => {}
        }
        self.push(TokenKind::Op(op), line);
        Ok(())
    }

    fn src_from_pos(&self) -> String {
        // operators are at most three characters
        self.chars[self.pos..(self.pos + 3).min(self.chars.len())]
            .iter()
            .collect()
    }
}
