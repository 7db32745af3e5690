//! Statement and expression parsing on top of the lexer.
//!
//! Statements are recovered as logical lines nested by indentation. Only the
//! expression forms that matter for attribute declarations get a real
//! [`Expr`] shape (names, literals, calls, subscripts, attribute access,
//! lists, tuples, `|` unions); everything else becomes [`Expr::Opaque`].

use super::grammar::{self, ClauseOrder};
use super::lexer::{LexError, Token, TokenKind};
use crate::models::Literal;

/// Python's hard keywords.
pub(super) const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub tokens: Vec<Token>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Simple(Line),
    Compound { header: Line, body: Vec<Stmt> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Literal(Literal),
    Attribute(Box<Expr>, String),
    Call { func: Box<Expr>, args: Vec<Arg> },
    Subscript { value: Box<Expr>, index: Box<Expr> },
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Union(Vec<Expr>),
    Negate(Box<Expr>),
    Opaque,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// `None` for positional and starred arguments.
    pub name: Option<String>,
    pub value: Expr,
}

/// Groups tokens into statements nested by `Indent`/`Dedent`.
pub fn parse_module(tokens: &[Token]) -> Result<Vec<Stmt>, LexError> {
    let mut pos = 0;
    let body = parse_block(tokens, &mut pos, false)?;
    Ok(body)
}

fn parse_block(tokens: &[Token], pos: &mut usize, nested: bool) -> Result<Vec<Stmt>, LexError> {
    let mut stmts = Vec::new();
    let mut clauses = ClauseOrder::default();
    loop {
        let Some(tok) = tokens.get(*pos) else {
            clauses.finish()?;
            return Ok(stmts);
        };
        match tok.kind {
            TokenKind::EndMarker => {
                clauses.finish()?;
                return Ok(stmts);
            }
            TokenKind::Dedent if nested => {
                *pos += 1;
                clauses.finish()?;
                return Ok(stmts);
            }
            TokenKind::Dedent | TokenKind::Newline => {
                *pos += 1;
                continue;
            }
            TokenKind::Indent => {
                return Err(LexError {
                    line: tok.line,
                    message: "unexpected indent".to_string(),
                })
            }
            _ => {}
        }

        let start_line = tok.line;
        let mut line_tokens = Vec::new();
        while let Some(t) = tokens.get(*pos) {
            if matches!(t.kind, TokenKind::Newline | TokenKind::EndMarker) {
                break;
            }
            line_tokens.push(t.clone());
            *pos += 1;
        }
        if tokens.get(*pos).is_some_and(|t| t.kind == TokenKind::Newline) {
            *pos += 1;
        }

        let opens_block = line_tokens.last().is_some_and(|t| t.is_op(":"));
        let indented = tokens
            .get(*pos)
            .is_some_and(|t| t.kind == TokenKind::Indent);
        grammar::check_line(&line_tokens, opens_block)?;
        clauses.next(&line_tokens, start_line)?;

        if opens_block {
            if !indented {
                return Err(LexError {
                    line: start_line,
                    message: "expected an indented block".to_string(),
                });
            }
            *pos += 1;
            let body = parse_block(tokens, pos, true)?;
            stmts.push(Stmt::Compound {
                header: Line {
                    tokens: line_tokens,
                    line: start_line,
                },
                body,
            });
        } else {
            if indented {
                return Err(LexError {
                    line: tokens[*pos].line,
                    message: "unexpected indent".to_string(),
                });
            }
            // `;` after an inline clause header separates body statements
            if grammar::clause_keyword(&line_tokens).is_some() {
                stmts.push(Stmt::Simple(Line {
                    line: start_line,
                    tokens: line_tokens,
                }));
                continue;
            }
            for part in split_top_level(&line_tokens, ";") {
                if !part.is_empty() {
                    stmts.push(Stmt::Simple(Line {
                        line: part[0].line,
                        tokens: part.to_vec(),
                    }));
                }
            }
        }
    }
}

/// Splits on `sep` where it appears outside any brackets.
pub fn split_top_level<'t>(tokens: &'t [Token], sep: &str) -> Vec<&'t [Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, t) in tokens.iter().enumerate() {
        if t.opens() {
            depth += 1;
        } else if t.closes() {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && t.is_op(sep) {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

fn find_top_level(tokens: &[Token], pred: impl Fn(&Token) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate() {
        if t.opens() {
            depth += 1;
        } else if t.closes() {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && pred(t) {
            return Some(i);
        }
    }
    None
}

/// Index of the bracket closing the one at `open`.
fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        if t.opens() {
            depth += 1;
        } else if t.closes() {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// `class Name(...):` header, with any inline body after the colon.
pub struct ClassHeader<'t> {
    pub name: String,
    pub inline_body: &'t [Token],
}

pub fn class_header(line: &Line) -> Option<ClassHeader<'_>> {
    let toks = &line.tokens;
    if !toks.first()?.is_name("class") {
        return None;
    }
    let name = toks.get(1)?.name()?.to_string();
    let mut colon = 2;
    if toks.get(2)?.is_op("(") || toks.get(2)?.is_op("[") {
        colon = matching_close(toks, 2)? + 1;
        // PEP 695 type parameters may precede the bases
        if toks.get(colon)?.is_op("(") {
            colon = matching_close(toks, colon)? + 1;
        }
    }
    if !toks.get(colon)?.is_op(":") {
        return None;
    }
    Some(ClassHeader {
        name,
        inline_body: &toks[colon + 1..],
    })
}

/// `target: annotation = value` with a plain name target.
pub struct AnnAssign {
    pub target: String,
    pub annotation: Expr,
    pub value: Expr,
}

pub fn annotated_assignment(tokens: &[Token]) -> Option<AnnAssign> {
    let target = tokens.first()?.name()?;
    if KEYWORDS.contains(&target) || !tokens.get(1)?.is_op(":") {
        return None;
    }
    let rest = &tokens[2..];
    let eq = find_top_level(rest, |t| t.is_op("="))?;
    Some(AnnAssign {
        target: target.to_string(),
        annotation: parse_expr(&rest[..eq]),
        value: parse_expr(&rest[eq + 1..]),
    })
}

/// Parses a complete expression. Unsupported forms yield [`Expr::Opaque`].
pub fn parse_expr(tokens: &[Token]) -> Expr {
    if tokens.is_empty() {
        return Expr::Opaque;
    }
    let opaque_keyword = find_top_level(tokens, |t| {
        ["if", "lambda", "for", "and", "or", "not", "await", "yield"]
            .iter()
            .any(|k| t.is_name(k))
    });
    if opaque_keyword.is_some() {
        return Expr::Opaque;
    }

    let items = split_top_level(tokens, ",");
    if items.len() > 1 {
        let trailing = items.last().is_some_and(|p| p.is_empty());
        let items = if trailing { &items[..items.len() - 1] } else { &items[..] };
        return Expr::Tuple(items.iter().map(|p| parse_expr(p)).collect());
    }

    let members = split_top_level(tokens, "|");
    if members.len() > 1 {
        return Expr::Union(members.iter().map(|p| parse_expr(p)).collect());
    }

    if tokens[0].is_op("-") {
        return match parse_expr(&tokens[1..]) {
            Expr::Opaque => Expr::Opaque,
            inner => Expr::Negate(Box::new(inner)),
        };
    }
    if tokens[0].is_op("+") {
        return parse_expr(&tokens[1..]);
    }
    parse_postfix(tokens).unwrap_or(Expr::Opaque)
}

fn parse_postfix(tokens: &[Token]) -> Option<Expr> {
    let (mut expr, mut pos) = parse_atom(tokens)?;
    while pos < tokens.len() {
        let t = &tokens[pos];
        if t.is_op("(") {
            let close = matching_close(tokens, pos)?;
            let args = parse_args(&tokens[pos + 1..close]);
            expr = Expr::Call {
                func: Box::new(expr),
                args,
            };
            pos = close + 1;
        } else if t.is_op("[") {
            let close = matching_close(tokens, pos)?;
            expr = Expr::Subscript {
                value: Box::new(expr),
                index: Box::new(parse_expr(&tokens[pos + 1..close])),
            };
            pos = close + 1;
        } else if t.is_op(".") {
            let attr = tokens.get(pos + 1)?.name()?.to_string();
            expr = Expr::Attribute(Box::new(expr), attr);
            pos += 2;
        } else {
            // binary operators and anything else we do not model
            return None;
        }
    }
    Some(expr)
}

fn parse_atom(tokens: &[Token]) -> Option<(Expr, usize)> {
    let first = tokens.first()?;
    let expr = match &first.kind {
        TokenKind::Name(n) => match n.as_str() {
            "None" => Expr::Literal(Literal::Null),
            "True" => Expr::Literal(Literal::Bool(true)),
            "False" => Expr::Literal(Literal::Bool(false)),
            _ => Expr::Name(n.clone()),
        },
        TokenKind::Number(text) => parse_number(text).map(Expr::Literal).unwrap_or(Expr::Opaque),
        TokenKind::Str { value, plain } => {
            if *plain {
                Expr::Literal(Literal::Str(value.clone()))
            } else {
                Expr::Opaque
            }
        }
        TokenKind::Op("(") => {
            let close = matching_close(tokens, 0)?;
            let inner = &tokens[1..close];
            let expr = if inner.is_empty() {
                Expr::Tuple(Vec::new())
            } else {
                parse_expr(inner)
            };
            return Some((expr, close + 1));
        }
        TokenKind::Op("[") => {
            let close = matching_close(tokens, 0)?;
            let inner = &tokens[1..close];
            let expr = if inner.is_empty() {
                Expr::List(Vec::new())
            } else if find_top_level(inner, |t| t.is_name("for")).is_some() {
                Expr::Opaque
            } else {
                Expr::List(
                    split_top_level(inner, ",")
                        .into_iter()
                        .filter(|p| !p.is_empty())
                        .map(parse_expr)
                        .collect(),
                )
            };
            return Some((expr, close + 1));
        }
        TokenKind::Op("{") => {
            let close = matching_close(tokens, 0)?;
            return Some((Expr::Opaque, close + 1));
        }
        _ => return None,
    };
    Some((expr, 1))
}

fn parse_args(tokens: &[Token]) -> Vec<Arg> {
    split_top_level(tokens, ",")
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(|p| {
            let keyword = p.len() > 2 && p[1].is_op("=");
            match p[0].name() {
                Some(name) if keyword => Arg {
                    name: Some(name.to_string()),
                    value: parse_expr(&p[2..]),
                },
                _ => Arg {
                    name: None,
                    value: parse_expr(p),
                },
            }
        })
        .collect()
}

fn parse_number(text: &str) -> Option<Literal> {
    let clean: String = text.chars().filter(|c| *c != '_').collect();
    let lower = clean.to_ascii_lowercase();
    if lower.ends_with('j') {
        return None;
    }
    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return i64::from_str_radix(&lower[2..], radix).ok().map(Literal::Int);
    }
    if lower.contains(['.', 'e']) {
        return lower.parse::<f64>().ok().map(Literal::Float);
    }
    lower.parse::<i64>().ok().map(Literal::Int)
}

impl Expr {
    /// Literal value, if the expression is made only of literals.
    pub fn literal(&self) -> Option<Literal> {
        match self {
            Expr::Literal(lit) => Some(lit.clone()),
            Expr::Negate(inner) => match inner.literal()? {
                Literal::Int(i) => i.checked_neg().map(Literal::Int),
                Literal::Float(f) => Some(Literal::Float(-f)),
                _ => None,
            },
            Expr::List(items) | Expr::Tuple(items) => items
                .iter()
                .map(Expr::literal)
                .collect::<Option<Vec<_>>>()
                .map(Literal::List),
            _ => None,
        }
    }

    /// Final identifier of a name or dotted attribute (`typing.Optional` → `Optional`).
    pub fn tail_name(&self) -> Option<&str> {
        match self {
            Expr::Name(n) => Some(n),
            Expr::Attribute(_, attr) => Some(attr),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Null))
            || matches!(self, Expr::Name(n) if n == "NoneType")
    }
}
