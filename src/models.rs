//! Core data models that flow through the pipeline.
//!
//! Raw scanner output ([`RawClass`], [`RawAttribute`]) is normalized by the
//! builder into [`ClassDescriptor`]s and [`AttributeDescriptor`]s. The remote
//! side is represented by [`ExistingSchemaSnapshot`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{AttributeKind, Constraint};

/// A literal value recovered from source code or read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Converts a JSON value from the store. Objects have no literal form.
    pub fn from_json(value: &serde_json::Value) -> Option<Literal> {
        use serde_json::Value;
        Some(match value {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Literal::Int(i),
                None => Literal::Float(n.as_f64()?),
            },
            Value::String(s) => Literal::Str(s.clone()),
            Value::Array(items) => Literal::List(
                items
                    .iter()
                    .map(Literal::from_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Object(_) => return None,
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::from(*i),
            Literal::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::Str(s) => Value::String(s.clone()),
            Literal::List(items) => Value::Array(items.iter().map(Literal::to_json).collect()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Default value of an attribute.
///
/// `Now` is a sentinel: it stays symbolic through scanning and planning and
/// is only turned into a timestamp when an operation is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Literal(Literal),
    Now,
}

impl DefaultValue {
    pub fn resolve(&self, now: DateTime<Utc>) -> serde_json::Value {
        match self {
            DefaultValue::Literal(lit) => lit.to_json(),
            DefaultValue::Now => {
                serde_json::Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

/// Typed constraint map, keyed by catalog constraint names.
pub type Constraints = BTreeMap<Constraint, Literal>;

/// One keyword argument of a declarator call. `None` means the argument was
/// present but not a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArgument {
    pub name: String,
    pub value: Option<Literal>,
}

/// An annotated field whose initializer calls a recognized declarator.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    /// Python field name as written.
    pub field: String,
    /// `attribute_key=` override, else the camel-cased field name.
    pub key: String,
    /// Declarator name, e.g. `StringAttribute`.
    pub declarator: String,
    pub args: Vec<RawArgument>,
    pub optional: bool,
    pub line: usize,
}

impl RawAttribute {
    /// Last literal value for `name`, mirroring keyword-dict semantics.
    pub fn arg(&self, name: &str) -> Option<&Literal> {
        self.args
            .iter()
            .rev()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_ref())
    }
}

/// A class found by the scanner with at least one raw attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClass {
    /// Class name as written in source.
    pub name: String,
    pub source: PathBuf,
    pub line: usize,
    pub attributes: Vec<RawAttribute>,
}

/// Canonical attribute, independent of source syntax.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeDescriptor {
    pub key: String,
    pub kind: AttributeKind,
    pub required: bool,
    /// Whether `required` was written in the declaration rather than filled in.
    #[serde(skip)]
    pub required_explicit: bool,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    pub constraints: Constraints,
}

impl AttributeDescriptor {
    pub fn new(key: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            key: key.into(),
            kind,
            required: false,
            required_explicit: false,
            optional: false,
            default: None,
            constraints: Constraints::new(),
        }
    }

    pub fn constraint(&self, c: Constraint) -> Option<&Literal> {
        self.constraints.get(&c)
    }
}

/// Attribute with every value concrete, ready to be sent to the store.
///
/// Produced at apply time, so sentinel defaults are already resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAttribute {
    pub key: String,
    pub kind: AttributeKind,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub constraints: Constraints,
}

impl ResolvedAttribute {
    pub fn from_descriptor(attr: &AttributeDescriptor, now: DateTime<Utc>) -> Self {
        Self {
            key: attr.key.clone(),
            kind: attr.kind,
            required: attr.required,
            default: attr.default.as_ref().map(|d| d.resolve(now)),
            constraints: attr.constraints.clone(),
        }
    }
}

/// Canonical collection derived from one scanned class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDescriptor {
    pub name: String,
    pub source: PathBuf,
    pub attributes: Vec<AttributeDescriptor>,
}

/// An attribute as the store currently reports it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExistingAttribute {
    pub key: String,
    /// `None` when the remote type has no catalog counterpart.
    pub kind: Option<AttributeKind>,
    /// The store's raw type label, kept for diagnostics.
    pub remote_type: String,
    pub required: bool,
    pub default: Option<Literal>,
    pub constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExistingCollection {
    pub id: String,
    pub name: String,
    pub attributes: Vec<ExistingAttribute>,
}

impl ExistingCollection {
    pub fn attribute(&self, key: &str) -> Option<&ExistingAttribute> {
        self.attributes.iter().find(|a| a.key == key)
    }
}

/// Read-only view of the store's schema, fetched once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExistingSchemaSnapshot {
    pub collections: Vec<ExistingCollection>,
}

impl ExistingSchemaSnapshot {
    pub fn collections_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a ExistingCollection> + 'a {
        self.collections.iter().filter(move |c| c.name == name)
    }
}
