//! Source scanner: finds model classes and their attribute declarations.
//!
//! Walks a directory (or reads a single file), tokenizes each Python source,
//! and for every class that is not part of the attribute library itself
//! collects the annotated fields whose initializer calls a known declarator:
//!
//! ```python
//! class UserProfile(Model):
//!     bio: Optional[str] = StringAttribute(size=500)
//!     age: int = IntegerAttribute(min=0, max=150, required=True)
//! ```
//!
//! A file that fails to tokenize or parse is recorded as a [`SyncError::Parse`] and
//! skipped; the other files still contribute their classes.

mod grammar;
pub mod lexer;
pub mod syntax;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::catalog;
use crate::config::ScanConfig;
use crate::error::SyncError;
use crate::models::{RawArgument, RawAttribute, RawClass};
use crate::progress::{ProgressEvent, ProgressReporter};
use syntax::{Expr, Stmt};

/// Cooperative cancellation, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of scanning a tree or a single file.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub classes: Vec<RawClass>,
    /// Files that were skipped, with the reason.
    pub errors: Vec<SyncError>,
    pub files_scanned: usize,
    pub cancelled: bool,
}

pub struct Scanner<'a> {
    config: &'a ScanConfig,
    cancel: Option<CancelFlag>,
    reporter: Option<&'a dyn ProgressReporter>,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a ScanConfig) -> Self {
        Self {
            config,
            cancel: None,
            reporter: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn ProgressReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Scans `root`, which may be a directory or a single file.
    ///
    /// Only an unreadable root is fatal.
    pub fn scan_tree(&self, root: &Path) -> Result<ScanOutcome, SyncError> {
        let files = self.collect_files(root)?;
        let total = files.len() as u64;
        let mut outcome = ScanOutcome::default();

        for (i, path) in files.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                tracing::info!(scanned = i, total, "scan cancelled");
                outcome.cancelled = true;
                break;
            }
            if let Some(reporter) = self.reporter {
                reporter.report(ProgressEvent::Scanning {
                    path: path.display().to_string(),
                    n: i as u64 + 1,
                    total,
                });
            }
            outcome.files_scanned += 1;
            match scan_file(path) {
                Ok(classes) => outcome.classes.extend(classes),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unparseable file");
                    outcome.errors.push(err);
                }
            }
        }
        Ok(outcome)
    }

    fn collect_files(&self, root: &Path) -> Result<Vec<PathBuf>, SyncError> {
        let unreadable = |message: String| SyncError::RootUnreadable {
            path: root.to_path_buf(),
            message,
        };
        let meta = std::fs::metadata(root).map_err(|e| unreadable(e.to_string()))?;
        if meta.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }

        let include_set = build_globset(&self.config.include_globs).map_err(unreadable)?;
        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
            "**/__pycache__/**".to_string(),
            "**/.venv/**".to_string(),
            "**/venv/**".to_string(),
        ];
        excludes.extend(self.config.exclude_globs.iter().cloned());
        let exclude_set = build_globset(&excludes).map_err(unreadable)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(unreadable(e.to_string())),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, String> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|e| e.to_string())?);
    }
    builder.build().map_err(|e| e.to_string())
}

/// Reads and scans one file.
pub fn scan_file(path: &Path) -> Result<Vec<RawClass>, SyncError> {
    let text = std::fs::read_to_string(path).map_err(|e| SyncError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    scan_source(path, &text)
}

/// Scans source text; `path` is only recorded on the results.
pub fn scan_source(path: &Path, text: &str) -> Result<Vec<RawClass>, SyncError> {
    let parse_error = |e: lexer::LexError| SyncError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let tokens = lexer::tokenize(text).map_err(parse_error)?;
    let module = syntax::parse_module(&tokens).map_err(parse_error)?;

    let mut classes = Vec::new();
    visit_block(&module, path, &mut classes);
    Ok(classes)
}

/// Pre-order walk: a class is emitted before the classes nested in it.
fn visit_block(stmts: &[Stmt], path: &Path, out: &mut Vec<RawClass>) {
    for stmt in stmts {
        match stmt {
            Stmt::Compound { header, body } => {
                if let Some(class) = syntax::class_header(header) {
                    let simple: Vec<&[lexer::Token]> = body
                        .iter()
                        .filter_map(|s| match s {
                            Stmt::Simple(line) => Some(line.tokens.as_slice()),
                            Stmt::Compound { .. } => None,
                        })
                        .collect();
                    push_class(&class.name, header.line, &simple, path, out);
                }
                visit_block(body, path, out);
            }
            Stmt::Simple(line) => {
                // `class A: field: T = Decl()` keeps its body on the header line
                if let Some(class) = syntax::class_header(line) {
                    let parts = syntax::split_top_level(class.inline_body, ";");
                    push_class(&class.name, line.line, &parts, path, out);
                }
            }
        }
    }
}

fn push_class(
    name: &str,
    line: usize,
    body: &[&[lexer::Token]],
    path: &Path,
    out: &mut Vec<RawClass>,
) {
    if catalog::is_marker_class(name) {
        return;
    }
    let attributes: Vec<RawAttribute> = body
        .iter()
        .filter_map(|tokens| extract_attribute(tokens))
        .collect();
    if attributes.is_empty() {
        tracing::debug!(class = name, "no attribute declarations");
        return;
    }
    out.push(RawClass {
        name: name.to_string(),
        source: path.to_path_buf(),
        line,
        attributes,
    });
}

fn extract_attribute(tokens: &[lexer::Token]) -> Option<RawAttribute> {
    let line = tokens.first()?.line;
    let assign = syntax::annotated_assignment(tokens)?;
    let Expr::Call { func, args } = assign.value else {
        return None;
    };
    let Expr::Name(declarator) = *func else {
        return None;
    };
    if !catalog::looks_like_declarator(&declarator) {
        return None;
    }

    let args: Vec<RawArgument> = args
        .into_iter()
        .filter_map(|arg| {
            Some(RawArgument {
                name: arg.name?,
                value: arg.value.literal(),
            })
        })
        .collect();

    let key = args
        .iter()
        .rev()
        .find(|a| a.name == "attribute_key")
        .and_then(|a| a.value.as_ref())
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| to_camel_case(&assign.target));

    Some(RawAttribute {
        optional: is_optional(&assign.annotation),
        field: assign.target,
        key,
        declarator,
        args,
        line,
    })
}

/// True for `Optional[T]`, `Union[..., None]`, `T | None`, and the same
/// forms written as a string forward reference.
pub fn is_optional(annotation: &Expr) -> bool {
    match annotation {
        Expr::Subscript { value, index } => match value.tail_name() {
            Some("Optional") => true,
            Some("Union") => match index.as_ref() {
                Expr::Tuple(members) => members.iter().any(|m| m.is_none() || is_optional(m)),
                other => other.is_none(),
            },
            Some("Annotated") => match index.as_ref() {
                Expr::Tuple(members) => members.first().is_some_and(is_optional),
                other => is_optional(other),
            },
            _ => false,
        },
        Expr::Union(members) => members.iter().any(|m| m.is_none() || is_optional(m)),
        Expr::Literal(crate::models::Literal::Str(forward)) => lexer::tokenize(forward)
            .ok()
            .map(|toks| {
                let body: Vec<lexer::Token> = toks
                    .into_iter()
                    .filter(|t| {
                        !matches!(
                            t.kind,
                            lexer::TokenKind::Newline | lexer::TokenKind::EndMarker
                        )
                    })
                    .collect();
                is_optional(&syntax::parse_expr(&body))
            })
            .unwrap_or(false),
        _ => false,
    }
}

/// `user_profile` → `userProfile`; the first word is kept verbatim and the
/// rest are capitalized with their tails lower-cased.
pub fn to_camel_case(name: &str) -> String {
    let mut words = name.split('_');
    let mut out = words.next().unwrap_or_default().to_string();
    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Literal;

    fn scan(src: &str) -> Vec<RawClass> {
        scan_source(Path::new("models.py"), src).unwrap()
    }

    const USER_PROFILE: &str = r#"
from typing import Optional

class UserProfile(Model):
    """A user's public profile."""

    bio: Optional[str] = StringAttribute(size=500)
    age: int = IntegerAttribute(min=0, max=150, required=True)

    def display(self) -> str:
        return self.bio or ""
"#;

    #[test]
    fn extracts_user_profile() {
        let classes = scan(USER_PROFILE);
        assert_eq!(classes.len(), 1);
        let class = &classes[0];
        assert_eq!(class.name, "UserProfile");
        assert_eq!(class.attributes.len(), 2);

        let bio = &class.attributes[0];
        assert_eq!(bio.key, "bio");
        assert_eq!(bio.declarator, "StringAttribute");
        assert!(bio.optional);
        assert_eq!(bio.arg("size"), Some(&Literal::Int(500)));

        let age = &class.attributes[1];
        assert!(!age.optional);
        assert_eq!(age.arg("min"), Some(&Literal::Int(0)));
        assert_eq!(age.arg("max"), Some(&Literal::Int(150)));
        assert_eq!(age.arg("required"), Some(&Literal::Bool(true)));
    }

    #[test]
    fn classes_without_declarations_are_omitted() {
        let classes = scan("class Plain:\n    x: int = 5\n    y = StringAttribute()\n");
        assert!(classes.is_empty());
    }

    #[test]
    fn marker_classes_are_not_models() {
        let src = "class StringAttribute:\n    size: int = IntegerAttribute()\n";
        assert!(scan(src).is_empty());
    }

    #[test]
    fn optional_forms() {
        let src = r#"
class Opt:
    a: Optional[str] = StringAttribute()
    b: typing.Optional[str] = StringAttribute()
    c: Union[str, None] = StringAttribute()
    d: str | None = StringAttribute()
    e: "Optional[str]" = StringAttribute()
    f: Union[str, int] = StringAttribute()
    g: str = StringAttribute()
"#;
        let attrs = &scan(src)[0].attributes;
        let flags: Vec<bool> = attrs.iter().map(|a| a.optional).collect();
        assert_eq!(flags, vec![true, true, true, true, true, false, false]);
    }

    #[test]
    fn key_override_and_camel_case() {
        let src = r#"
class Post:
    created_at: datetime = DatetimeAttribute(default="Now")
    body_text: str = StringAttribute(attribute_key="content")
"#;
        let attrs = &scan(src)[0].attributes;
        assert_eq!(attrs[0].key, "createdAt");
        assert_eq!(attrs[1].key, "content");
    }

    #[test]
    fn non_literal_arguments_are_absent() {
        let src = "class Post:\n    title: str = StringAttribute(size=MAX_TITLE, required=True)\n";
        let attr = &scan(src)[0].attributes[0];
        assert_eq!(attr.arg("size"), None);
        assert_eq!(attr.arg("required"), Some(&Literal::Bool(true)));
    }

    #[test]
    fn nested_classes_are_visited_independently() {
        let src = r#"
class Outer:
    name: str = StringAttribute()

    class Inner:
        count: int = IntegerAttribute()

def factory():
    class Local:
        flag: bool = BooleanAttribute()
    return Local
"#;
        let names: Vec<String> = scan(src).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Outer", "Inner", "Local"]);
    }

    #[test]
    fn duplicate_keys_are_preserved() {
        let src = "class Dup:\n    a: str = StringAttribute(size=1)\n    a: str = StringAttribute(size=2)\n";
        let attrs = &scan(src)[0].attributes;
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].arg("size"), Some(&Literal::Int(2)));
    }

    #[test]
    fn unknown_declarators_are_captured_for_the_builder() {
        let src = "class Place:\n    location: tuple = GeoAttribute()\n    name: str = Field()\n";
        let attrs = &scan(src)[0].attributes;
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].declarator, "GeoAttribute");
    }

    #[test]
    fn attribute_access_callee_is_not_a_declarator() {
        let src = "class M:\n    a: str = attrs.StringAttribute()\n";
        assert!(scan(src).is_empty());
    }

    #[test]
    fn multiline_declarations() {
        let src = r#"
class Article:
    status: str = EnumAttribute(
        elements=["draft", "published"],  # lifecycle
        default="draft",
    )
"#;
        let attr = &scan(src)[0].attributes[0];
        assert_eq!(
            attr.arg("elements"),
            Some(&Literal::List(vec![
                Literal::Str("draft".into()),
                Literal::Str("published".into())
            ]))
        );
        assert_eq!(attr.arg("default"), Some(&Literal::Str("draft".into())));
    }

    #[test]
    fn deterministic() {
        assert_eq!(scan(USER_PROFILE), scan(USER_PROFILE));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = scan_source(Path::new("bad.py"), "class A:\n    x: str = StringAttribute(\n")
            .unwrap_err();
        assert!(matches!(err, SyncError::Parse { ref path, .. } if path == Path::new("bad.py")));
    }

    #[test]
    fn inline_class_body_keeps_every_declaration() {
        let src = "class Tag: label: str = StringAttribute(); rank: int = IntegerAttribute()\n";
        let classes = scan(src);
        let keys: Vec<&str> = classes[0].attributes.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["label", "rank"]);
    }

    #[test]
    fn invalid_statements_fail_the_whole_file() {
        let src = "class A:\n    x: str = StringAttribute()\n\nx = = 1\nimport import\n";
        let err = scan_source(Path::new("bad.py"), src).unwrap_err();
        let SyncError::Parse { path, message } = err else {
            panic!("expected a parse error");
        };
        assert_eq!(path, Path::new("bad.py"));
        assert!(message.starts_with("line 4:"), "{}", message);
    }

    #[test]
    fn camel_case() {
        assert_eq!(to_camel_case("created_at"), "createdAt");
        assert_eq!(to_camel_case("UserProfile"), "UserProfile");
        assert_eq!(to_camel_case("user_ID_value"), "userIdValue");
        assert_eq!(to_camel_case("_private"), "Private");
        assert_eq!(to_camel_case("name"), "name");
    }
}
