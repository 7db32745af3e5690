//! Grammar check for logical lines.
//!
//! The statement tree in [`super::syntax`] keeps only what attribute
//! extraction needs. Every logical line is also run through this
//! recognizer for Python's statement and expression grammar, so a file with
//! a statement Python would reject fails as a whole instead of yielding
//! classes. Nothing is built here.
//!
//! `case` patterns are not checked. Type parameter lists (`def f[T]`) are
//! only matched for brackets.

use super::lexer::{LexError, Token, TokenKind};
use super::syntax::KEYWORDS;

/// Keywords that still start an expression.
const EXPRESSION_KEYWORDS: &[&str] = &["True", "False", "None", "not", "lambda", "await"];

const AUGMENTED: &[&str] = &[
    "+=", "-=", "*=", "/=", "//=", "%=", "@=", "&=", "|=", "^=", ">>=", "<<=", "**=",
];

/// Keywords that open a compound statement or one of its clauses.
const CLAUSES: &[&str] = &[
    "if", "elif", "else", "while", "for", "try", "except", "finally", "with", "def", "class",
];

/// What an expression can stand for on the left of `=`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Name,
    /// Attribute access or subscript.
    Member,
    /// Tuple or list whose elements are all targets.
    Sequence,
    Starred,
    Value,
}

impl Shape {
    fn assignable(self) -> bool {
        matches!(self, Shape::Name | Shape::Member | Shape::Sequence)
    }
}

fn sequence(shapes: &[Shape]) -> Shape {
    if shapes.iter().all(|s| s.assignable() || *s == Shape::Starred) {
        Shape::Sequence
    } else {
        Shape::Value
    }
}

type Parsed = Result<Shape, LexError>;

/// Checks one logical line. `opens_block` is set when the line ends with the
/// `:` of a block header.
pub fn check_line(tokens: &[Token], opens_block: bool) -> Result<(), LexError> {
    let mut checker = Checker { tokens, pos: 0 };
    let soft_header = opens_block
        && tokens
            .first()
            .is_some_and(|t| t.is_name("match") || t.is_name("case"));
    if clause_keyword(tokens).is_some() || soft_header {
        checker.compound_header()?;
        if opens_block {
            return checker.finish();
        }
    }
    checker.simple_statements()
}

/// The clause keyword a line starts with, looking through `async`.
pub fn clause_keyword(tokens: &[Token]) -> Option<&'static str> {
    let first = tokens.first()?;
    let first = if first.is_name("async") {
        tokens.get(1)?
    } else {
        first
    };
    CLAUSES.iter().copied().find(|k| first.is_name(k))
}

/// Clause sequencing inside one block: `elif` after `if`, `except` after
/// `try`, and so on.
#[derive(Debug, Default)]
pub struct ClauseOrder {
    previous: Option<&'static str>,
    line: usize,
}

impl ClauseOrder {
    pub fn next(&mut self, tokens: &[Token], line: usize) -> Result<(), LexError> {
        let clause = clause_keyword(tokens);
        if self.previous == Some("try") && !matches!(clause, Some("except" | "finally")) {
            return Err(LexError {
                line,
                message: "expected 'except' or 'finally' block".to_string(),
            });
        }
        let follows: &[&str] = match clause {
            Some("elif") => &["if", "elif"],
            Some("else") => &["if", "elif", "for", "while", "except"],
            Some("except") => &["try", "except"],
            Some("finally") => &["try", "except", "else"],
            _ => &[],
        };
        if !follows.is_empty() && !self.previous.is_some_and(|p| follows.contains(&p)) {
            return Err(LexError {
                line,
                message: format!("'{}' without a matching clause", clause.unwrap_or_default()),
            });
        }
        self.previous = clause;
        self.line = line;
        Ok(())
    }

    /// Called when the block ends.
    pub fn finish(&self) -> Result<(), LexError> {
        if self.previous == Some("try") {
            return Err(LexError {
                line: self.line,
                message: "expected 'except' or 'finally' block".to_string(),
            });
        }
        Ok(())
    }
}

fn describe(token: &Token) -> String {
    match &token.kind {
        TokenKind::Name(n) => format!("'{}'", n),
        TokenKind::Number(n) => n.clone(),
        TokenKind::Str { .. } => "string literal".to_string(),
        TokenKind::Op(op) => format!("'{}'", op),
        _ => "end of line".to_string(),
    }
}

struct Checker<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Checker<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn at_op(&self, op: &str) -> bool {
        self.peek().is_some_and(|t| t.is_op(op))
    }

    fn at_name(&self, name: &str) -> bool {
        self.peek().is_some_and(|t| t.is_name(name))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn eat_op(&mut self, op: &str) -> bool {
        let hit = self.at_op(op);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn eat_any_op(&mut self, ops: &[&str]) -> bool {
        let hit = ops.iter().any(|op| self.at_op(op));
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn eat_name(&mut self, name: &str) -> bool {
        let hit = self.at_name(name);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn error(&self) -> LexError {
        match self.peek() {
            Some(tok) => LexError {
                line: tok.line,
                message: format!("invalid syntax at {}", describe(tok)),
            },
            None => LexError {
                line: self.tokens.last().map_or(0, |t| t.line),
                message: "invalid syntax at end of line".to_string(),
            },
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), LexError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn expect_name(&mut self, name: &str) -> Result<(), LexError> {
        if self.eat_name(name) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn finish(&self) -> Result<(), LexError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn identifier(&mut self) -> Result<(), LexError> {
        match self.peek().and_then(Token::name) {
            Some(n) if !KEYWORDS.contains(&n) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error()),
        }
    }

    /// `single` targets are what augmented and annotated assignment accept.
    fn check_target(&self, shape: Shape, single: bool) -> Result<(), LexError> {
        let ok = if single {
            matches!(shape, Shape::Name | Shape::Member)
        } else {
            shape.assignable()
        };
        if ok {
            return Ok(());
        }
        Err(LexError {
            line: self
                .tokens
                .get(self.pos.saturating_sub(1))
                .map_or(0, |t| t.line),
            message: "cannot assign to expression".to_string(),
        })
    }

    fn starts_expression(&self) -> bool {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Name(n)) => {
                !KEYWORDS.contains(&n.as_str()) || EXPRESSION_KEYWORDS.contains(&n.as_str())
            }
            Some(TokenKind::Number(_)) | Some(TokenKind::Str { .. }) => true,
            Some(TokenKind::Op(op)) => ["(", "[", "{", "-", "+", "~", "*", "..."].contains(op),
            _ => false,
        }
    }

    fn skip_brackets(&mut self) -> Result<(), LexError> {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            self.pos += 1;
            if tok.opens() {
                depth += 1;
            } else if tok.closes() {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(self.error())
    }

    // ---- statements ----

    fn simple_statements(&mut self) -> Result<(), LexError> {
        loop {
            self.simple_statement()?;
            if !self.eat_op(";") || self.at_end() {
                break;
            }
        }
        self.finish()
    }

    fn simple_statement(&mut self) -> Result<(), LexError> {
        let Some(first) = self.peek() else {
            return Err(self.error());
        };
        if first.is_op("@") {
            self.pos += 1;
            self.named_expression()?;
            return Ok(());
        }
        match first.name() {
            Some("pass" | "break" | "continue") => self.pos += 1,
            Some("return") => {
                self.pos += 1;
                if self.starts_expression() {
                    self.star_expressions()?;
                }
            }
            Some("raise") => {
                self.pos += 1;
                if self.starts_expression() {
                    self.expression()?;
                    if self.eat_name("from") {
                        self.expression()?;
                    }
                }
            }
            Some("global" | "nonlocal") => {
                self.pos += 1;
                self.identifier()?;
                while self.eat_op(",") {
                    self.identifier()?;
                }
            }
            Some("del") => {
                self.pos += 1;
                let target = self.star_expressions()?;
                self.check_target(target, false)?;
            }
            Some("assert") => {
                self.pos += 1;
                self.expression()?;
                if self.eat_op(",") {
                    self.expression()?;
                }
            }
            Some("import") => {
                self.pos += 1;
                self.dotted_as_names()?;
            }
            Some("from") => {
                self.pos += 1;
                self.import_from()?;
            }
            Some("type") if self.at_type_alias() => {
                self.pos += 2;
                if self.at_op("[") {
                    self.skip_brackets()?;
                }
                self.expect_op("=")?;
                self.expression()?;
            }
            _ => self.expression_statement()?,
        }
        Ok(())
    }

    fn at_type_alias(&self) -> bool {
        self.peek_at(1)
            .and_then(Token::name)
            .is_some_and(|n| !KEYWORDS.contains(&n))
            && self
                .peek_at(2)
                .is_some_and(|t| t.is_op("=") || t.is_op("["))
    }

    fn expression_statement(&mut self) -> Result<(), LexError> {
        let target = self.yield_or_star_expressions()?;
        if self.eat_op(":") {
            self.check_target(target, true)?;
            self.expression()?;
            if self.eat_op("=") {
                self.yield_or_star_expressions()?;
            }
        } else if self.eat_any_op(AUGMENTED) {
            self.check_target(target, true)?;
            self.yield_or_star_expressions()?;
        } else {
            let mut last = target;
            while self.eat_op("=") {
                self.check_target(last, false)?;
                last = self.yield_or_star_expressions()?;
            }
        }
        Ok(())
    }

    fn dotted_name(&mut self) -> Result<(), LexError> {
        self.identifier()?;
        while self.eat_op(".") {
            self.identifier()?;
        }
        Ok(())
    }

    fn dotted_as_names(&mut self) -> Result<(), LexError> {
        loop {
            self.dotted_name()?;
            if self.eat_name("as") {
                self.identifier()?;
            }
            if !self.eat_op(",") {
                return Ok(());
            }
        }
    }

    fn import_from(&mut self) -> Result<(), LexError> {
        let mut relative = false;
        while self.eat_op(".") || self.eat_op("...") {
            relative = true;
        }
        if !self.at_name("import") {
            self.dotted_name()?;
        } else if !relative {
            return Err(self.error());
        }
        self.expect_name("import")?;
        if self.eat_op("*") {
            return Ok(());
        }
        let parenthesized = self.eat_op("(");
        loop {
            self.identifier()?;
            if self.eat_name("as") {
                self.identifier()?;
            }
            if !self.eat_op(",") || (parenthesized && self.at_op(")")) {
                break;
            }
        }
        if parenthesized {
            self.expect_op(")")?;
        }
        Ok(())
    }

    // ---- compound statement headers ----

    fn compound_header(&mut self) -> Result<(), LexError> {
        let keyword = self.peek().and_then(Token::name).unwrap_or_default();
        self.pos += 1;
        match keyword {
            "if" | "elif" | "while" => {
                self.named_expression()?;
            }
            "else" | "try" | "finally" => {}
            "for" => {
                let target = self.target_list()?;
                self.check_target(target, false)?;
                self.expect_name("in")?;
                self.star_expressions()?;
            }
            "except" => {
                self.eat_op("*");
                if !self.at_op(":") {
                    self.expression()?;
                    while self.eat_op(",") {
                        self.expression()?;
                    }
                    if self.eat_name("as") {
                        self.identifier()?;
                    }
                }
            }
            "with" => self.with_items()?,
            "def" => {
                self.identifier()?;
                if self.at_op("[") {
                    self.skip_brackets()?;
                }
                self.expect_op("(")?;
                self.parameters(")", true)?;
                self.expect_op(")")?;
                if self.eat_op("->") {
                    self.expression()?;
                }
            }
            "class" => {
                self.identifier()?;
                if self.at_op("[") {
                    self.skip_brackets()?;
                }
                if self.eat_op("(") {
                    self.arguments()?;
                }
            }
            "async" => {
                if !(self.at_name("def") || self.at_name("for") || self.at_name("with")) {
                    return Err(self.error());
                }
                return self.compound_header();
            }
            "match" => {
                self.list_of(Self::star_named_expression)?;
            }
            "case" => {
                if self.at_op(":") {
                    return Err(self.error());
                }
                while self.peek_at(1).is_some() {
                    self.pos += 1;
                }
            }
            _ => {
                self.pos -= 1;
                return Err(self.error());
            }
        }
        self.expect_op(":")
    }

    fn with_items(&mut self) -> Result<(), LexError> {
        if self.at_op("(") {
            let start = self.pos;
            if self.parenthesized_with_items().is_ok() && self.at_op(":") {
                return Ok(());
            }
            self.pos = start;
        }
        loop {
            self.with_item()?;
            if !self.eat_op(",") {
                return Ok(());
            }
        }
    }

    fn parenthesized_with_items(&mut self) -> Result<(), LexError> {
        self.expect_op("(")?;
        loop {
            self.with_item()?;
            if !self.eat_op(",") || self.at_op(")") {
                break;
            }
        }
        self.expect_op(")")
    }

    fn with_item(&mut self) -> Result<(), LexError> {
        self.expression()?;
        if self.eat_name("as") {
            let target = self.star_target()?;
            self.check_target(target, false)?;
        }
        Ok(())
    }

    /// Parameter list up to (not including) `close`.
    fn parameters(&mut self, close: &str, annotated: bool) -> Result<(), LexError> {
        while !self.at_op(close) {
            if self.eat_op("/") {
            } else if self.eat_op("**") {
                self.identifier()?;
                self.annotation(annotated)?;
            } else if self.eat_op("*") {
                if !self.at_op(",") && !self.at_op(close) {
                    self.identifier()?;
                    self.annotation(annotated)?;
                }
            } else {
                self.identifier()?;
                self.annotation(annotated)?;
                if self.eat_op("=") {
                    self.expression()?;
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(())
    }

    fn annotation(&mut self, annotated: bool) -> Result<(), LexError> {
        if annotated && self.eat_op(":") {
            self.eat_op("*");
            self.expression()?;
        }
        Ok(())
    }

    // ---- expressions ----

    fn list_of(&mut self, element: fn(&mut Self) -> Parsed) -> Parsed {
        let first = element(self)?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut shapes = vec![first];
        while self.eat_op(",") {
            if !self.starts_expression() {
                break;
            }
            shapes.push(element(self)?);
        }
        Ok(sequence(&shapes))
    }

    fn star_expressions(&mut self) -> Parsed {
        self.list_of(Self::star_expression)
    }

    fn yield_or_star_expressions(&mut self) -> Parsed {
        if self.at_name("yield") {
            return self.yield_expression();
        }
        self.star_expressions()
    }

    fn yield_expression(&mut self) -> Parsed {
        self.pos += 1;
        if self.eat_name("from") {
            self.expression()?;
        } else if self.starts_expression() {
            self.star_expressions()?;
        }
        Ok(Shape::Value)
    }

    fn target_list(&mut self) -> Parsed {
        self.list_of(Self::star_target)
    }

    fn star_target(&mut self) -> Parsed {
        if self.eat_op("*") {
            return self.starred();
        }
        self.bitwise_or()
    }

    fn star_expression(&mut self) -> Parsed {
        if self.eat_op("*") {
            return self.starred();
        }
        self.expression()
    }

    fn star_named_expression(&mut self) -> Parsed {
        if self.eat_op("*") {
            return self.starred();
        }
        self.named_expression()
    }

    fn starred(&mut self) -> Parsed {
        let inner = self.bitwise_or()?;
        Ok(if inner.assignable() {
            Shape::Starred
        } else {
            Shape::Value
        })
    }

    fn named_expression(&mut self) -> Parsed {
        let walrus = self
            .peek()
            .and_then(Token::name)
            .is_some_and(|n| !KEYWORDS.contains(&n))
            && self.peek_at(1).is_some_and(|t| t.is_op(":="));
        if walrus {
            self.pos += 2;
            self.expression()?;
            return Ok(Shape::Value);
        }
        self.expression()
    }

    fn expression(&mut self) -> Parsed {
        if self.eat_name("lambda") {
            self.parameters(":", false)?;
            self.expect_op(":")?;
            self.expression()?;
            return Ok(Shape::Value);
        }
        let shape = self.disjunction()?;
        if self.eat_name("if") {
            self.disjunction()?;
            self.expect_name("else")?;
            self.expression()?;
            return Ok(Shape::Value);
        }
        Ok(shape)
    }

    fn disjunction(&mut self) -> Parsed {
        let mut shape = self.conjunction()?;
        while self.eat_name("or") {
            self.conjunction()?;
            shape = Shape::Value;
        }
        Ok(shape)
    }

    fn conjunction(&mut self) -> Parsed {
        let mut shape = self.inversion()?;
        while self.eat_name("and") {
            self.inversion()?;
            shape = Shape::Value;
        }
        Ok(shape)
    }

    fn inversion(&mut self) -> Parsed {
        if self.eat_name("not") {
            self.inversion()?;
            return Ok(Shape::Value);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Parsed {
        let mut shape = self.bitwise_or()?;
        while self.comparison_operator() {
            self.bitwise_or()?;
            shape = Shape::Value;
        }
        Ok(shape)
    }

    fn comparison_operator(&mut self) -> bool {
        if self.eat_any_op(&["==", "!=", "<", ">", "<=", ">="]) || self.eat_name("in") {
            return true;
        }
        if self.eat_name("is") {
            self.eat_name("not");
            return true;
        }
        if self.at_name("not") && self.peek_at(1).is_some_and(|t| t.is_name("in")) {
            self.pos += 2;
            return true;
        }
        false
    }

    fn binary(&mut self, ops: &[&str], operand: fn(&mut Self) -> Parsed) -> Parsed {
        let mut shape = operand(self)?;
        while self.eat_any_op(ops) {
            operand(self)?;
            shape = Shape::Value;
        }
        Ok(shape)
    }

    fn bitwise_or(&mut self) -> Parsed {
        self.binary(&["|"], Self::bitwise_xor)
    }

    fn bitwise_xor(&mut self) -> Parsed {
        self.binary(&["^"], Self::bitwise_and)
    }

    fn bitwise_and(&mut self) -> Parsed {
        self.binary(&["&"], Self::shift)
    }

    fn shift(&mut self) -> Parsed {
        self.binary(&["<<", ">>"], Self::sum)
    }

    fn sum(&mut self) -> Parsed {
        self.binary(&["+", "-"], Self::term)
    }

    fn term(&mut self) -> Parsed {
        self.binary(&["*", "/", "//", "%", "@"], Self::factor)
    }

    fn factor(&mut self) -> Parsed {
        if self.eat_any_op(&["+", "-", "~"]) {
            self.factor()?;
            return Ok(Shape::Value);
        }
        let shape = if self.eat_name("await") {
            self.primary()?;
            Shape::Value
        } else {
            self.primary()?
        };
        if self.eat_op("**") {
            self.factor()?;
            return Ok(Shape::Value);
        }
        Ok(shape)
    }

    fn primary(&mut self) -> Parsed {
        let mut shape = self.atom()?;
        loop {
            if self.eat_op(".") {
                self.identifier()?;
                shape = Shape::Member;
            } else if self.eat_op("(") {
                self.arguments()?;
                shape = Shape::Value;
            } else if self.eat_op("[") {
                self.slices()?;
                shape = Shape::Member;
            } else {
                return Ok(shape);
            }
        }
    }

    fn atom(&mut self) -> Parsed {
        let Some(tok) = self.peek() else {
            return Err(self.error());
        };
        match &tok.kind {
            TokenKind::Name(n) if matches!(n.as_str(), "True" | "False" | "None") => {
                self.pos += 1;
                Ok(Shape::Value)
            }
            TokenKind::Name(n) if !KEYWORDS.contains(&n.as_str()) => {
                self.pos += 1;
                Ok(Shape::Name)
            }
            TokenKind::Number(_) | TokenKind::Str { .. } | TokenKind::Op("...") => {
                self.pos += 1;
                Ok(Shape::Value)
            }
            TokenKind::Op("(") => {
                self.pos += 1;
                self.parenthesized()
            }
            TokenKind::Op("[") => {
                self.pos += 1;
                self.list_display()
            }
            TokenKind::Op("{") => {
                self.pos += 1;
                self.brace_display()
            }
            _ => Err(self.error()),
        }
    }

    fn parenthesized(&mut self) -> Parsed {
        if self.eat_op(")") {
            return Ok(Shape::Sequence);
        }
        if self.at_name("yield") {
            self.yield_expression()?;
            self.expect_op(")")?;
            return Ok(Shape::Value);
        }
        let first = self.star_named_expression()?;
        if self.at_comprehension() {
            self.comprehension()?;
            self.expect_op(")")?;
            return Ok(Shape::Value);
        }
        if !self.at_op(",") {
            self.expect_op(")")?;
            return Ok(if first == Shape::Starred {
                Shape::Value
            } else {
                first
            });
        }
        self.rest_of_sequence(first, ")")
    }

    fn list_display(&mut self) -> Parsed {
        if self.eat_op("]") {
            return Ok(Shape::Sequence);
        }
        let first = self.star_named_expression()?;
        if self.at_comprehension() {
            self.comprehension()?;
            self.expect_op("]")?;
            return Ok(Shape::Value);
        }
        self.rest_of_sequence(first, "]")
    }

    fn rest_of_sequence(&mut self, first: Shape, close: &str) -> Parsed {
        let mut shapes = vec![first];
        while self.eat_op(",") {
            if self.at_op(close) {
                break;
            }
            shapes.push(self.star_named_expression()?);
        }
        self.expect_op(close)?;
        Ok(sequence(&shapes))
    }

    fn brace_display(&mut self) -> Parsed {
        if self.eat_op("}") {
            return Ok(Shape::Value);
        }
        let dict = if self.eat_op("**") {
            self.bitwise_or()?;
            true
        } else {
            self.star_named_expression()?;
            if self.eat_op(":") {
                self.expression()?;
                true
            } else {
                false
            }
        };
        if self.at_comprehension() {
            self.comprehension()?;
        } else {
            while self.eat_op(",") {
                if self.at_op("}") {
                    break;
                }
                if !dict {
                    self.star_named_expression()?;
                } else if self.eat_op("**") {
                    self.bitwise_or()?;
                } else {
                    self.expression()?;
                    self.expect_op(":")?;
                    self.expression()?;
                }
            }
        }
        self.expect_op("}")?;
        Ok(Shape::Value)
    }

    fn at_comprehension(&self) -> bool {
        self.at_name("for")
            || (self.at_name("async") && self.peek_at(1).is_some_and(|t| t.is_name("for")))
    }

    fn comprehension(&mut self) -> Result<(), LexError> {
        while self.at_comprehension() {
            self.eat_name("async");
            self.pos += 1;
            let target = self.target_list()?;
            self.check_target(target, false)?;
            self.expect_name("in")?;
            self.disjunction()?;
            while self.eat_name("if") {
                self.disjunction()?;
            }
        }
        Ok(())
    }

    /// Call arguments after `(`, through the closing `)`.
    fn arguments(&mut self) -> Result<(), LexError> {
        while !self.at_op(")") {
            if self.eat_op("*") || self.eat_op("**") {
                self.expression()?;
            } else if self.peek().and_then(Token::name).is_some()
                && self.peek_at(1).is_some_and(|t| t.is_op("="))
            {
                self.identifier()?;
                self.pos += 1;
                self.expression()?;
            } else {
                self.named_expression()?;
                if self.at_comprehension() {
                    self.comprehension()?;
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")
    }

    /// Subscript contents after `[`, through the closing `]`.
    fn slices(&mut self) -> Result<(), LexError> {
        loop {
            if self.eat_op("*") {
                self.bitwise_or()?;
            } else {
                if !self.at_op(":") {
                    self.named_expression()?;
                }
                if self.eat_op(":") {
                    if self.starts_expression() {
                        self.expression()?;
                    }
                    if self.eat_op(":") && self.starts_expression() {
                        self.expression()?;
                    }
                }
            }
            if !self.eat_op(",") || self.at_op("]") {
                break;
            }
        }
        self.expect_op("]")
    }
}
