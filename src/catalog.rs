//! Attribute type catalog.
//!
//! A closed [`AttributeKind`] enum mapped through the static [`CATALOG`] table
//! to everything the rest of the pipeline needs per kind: the declarator name
//! used in model classes, the REST route segment, the legal constraint keys,
//! and the payload handlers for create and update requests.
//!
//! Adding a kind is one enum variant plus one table row.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Result, SyncError};
use crate::models::{Literal, ResolvedAttribute};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    String,
    Integer,
    Float,
    Boolean,
    Datetime,
    Email,
    Ip,
    Enum,
    Relationship,
}

/// Constraint keys an attribute may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Constraint {
    Size,
    Min,
    Max,
    Elements,
    Array,
    RelatedCollection,
    RelationKind,
    TwoWay,
    TwoWayKey,
    OnDelete,
}

impl Constraint {
    pub const ALL: [Constraint; 10] = [
        Constraint::Size,
        Constraint::Min,
        Constraint::Max,
        Constraint::Elements,
        Constraint::Array,
        Constraint::RelatedCollection,
        Constraint::RelationKind,
        Constraint::TwoWay,
        Constraint::TwoWayKey,
        Constraint::OnDelete,
    ];

    /// Name used in store payloads and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            Constraint::Size => "size",
            Constraint::Min => "min",
            Constraint::Max => "max",
            Constraint::Elements => "elements",
            Constraint::Array => "array",
            Constraint::RelatedCollection => "relatedCollection",
            Constraint::RelationKind => "relationType",
            Constraint::TwoWay => "twoWay",
            Constraint::TwoWayKey => "twoWayKey",
            Constraint::OnDelete => "onDelete",
        }
    }

    /// Maps a declarator keyword argument to a constraint key.
    pub fn from_keyword(name: &str) -> Option<Constraint> {
        Some(match name {
            "size" => Constraint::Size,
            "min" => Constraint::Min,
            "max" => Constraint::Max,
            "elements" => Constraint::Elements,
            "array" => Constraint::Array,
            "related_collection" | "related_collection_id" => Constraint::RelatedCollection,
            "relation_type" | "type" => Constraint::RelationKind,
            "two_way" => Constraint::TwoWay,
            "two_way_key" => Constraint::TwoWayKey,
            "on_delete" => Constraint::OnDelete,
            _ => return None,
        })
    }
}

impl fmt::Display for Constraint {
    /// Canonical name, the same one descriptors serialize with.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Constraint::RelationKind => "relationKind",
            other => other.as_str(),
        };
        f.write_str(name)
    }
}

/// Per-kind catalog entry.
pub struct KindSpec {
    pub kind: AttributeKind,
    /// Class name used to declare the attribute in model source.
    pub declarator: &'static str,
    /// Lower-cased labels accepted after stripping the `Attribute` suffix.
    pub aliases: &'static [&'static str],
    /// REST route segment under `/attributes/`.
    pub route: &'static str,
    pub constraints: &'static [Constraint],
    pub accepts_default: bool,
    pub create_payload: fn(&ResolvedAttribute) -> Map<String, Value>,
    pub update_payload: fn(&ResolvedAttribute) -> Map<String, Value>,
    pub update_path: fn(&str) -> String,
}

impl KindSpec {
    pub fn allows(&self, constraint: Constraint) -> bool {
        self.constraints.contains(&constraint)
    }
}

const SCALAR: &[Constraint] = &[Constraint::Array];
const SIZED: &[Constraint] = &[Constraint::Size, Constraint::Array];
const RANGED: &[Constraint] = &[Constraint::Min, Constraint::Max, Constraint::Array];
const ENUMERATED: &[Constraint] = &[Constraint::Elements, Constraint::Array];
const RELATION: &[Constraint] = &[
    Constraint::RelatedCollection,
    Constraint::RelationKind,
    Constraint::TwoWay,
    Constraint::TwoWayKey,
    Constraint::OnDelete,
];

pub static CATALOG: &[KindSpec] = &[
    KindSpec {
        kind: AttributeKind::String,
        declarator: "StringAttribute",
        aliases: &["string", "str"],
        route: "string",
        constraints: SIZED,
        accepts_default: true,
        create_payload: create_string,
        update_payload: update_string,
        update_path: update_path_string,
    },
    KindSpec {
        kind: AttributeKind::Integer,
        declarator: "IntegerAttribute",
        aliases: &["integer", "int"],
        route: "integer",
        constraints: RANGED,
        accepts_default: true,
        create_payload: create_ranged,
        update_payload: update_ranged,
        update_path: update_path_integer,
    },
    KindSpec {
        kind: AttributeKind::Float,
        declarator: "FloatAttribute",
        aliases: &["float", "double"],
        route: "float",
        constraints: RANGED,
        accepts_default: true,
        create_payload: create_ranged,
        update_payload: update_ranged,
        update_path: update_path_float,
    },
    KindSpec {
        kind: AttributeKind::Boolean,
        declarator: "BooleanAttribute",
        aliases: &["boolean", "bool"],
        route: "boolean",
        constraints: SCALAR,
        accepts_default: true,
        create_payload: create_scalar,
        update_payload: update_scalar,
        update_path: update_path_boolean,
    },
    KindSpec {
        kind: AttributeKind::Datetime,
        declarator: "DatetimeAttribute",
        aliases: &["datetime"],
        route: "datetime",
        constraints: SCALAR,
        accepts_default: true,
        create_payload: create_scalar,
        update_payload: update_scalar,
        update_path: update_path_datetime,
    },
    KindSpec {
        kind: AttributeKind::Email,
        declarator: "EmailAttribute",
        aliases: &["email"],
        route: "email",
        constraints: SCALAR,
        accepts_default: true,
        create_payload: create_scalar,
        update_payload: update_scalar,
        update_path: update_path_email,
    },
    KindSpec {
        kind: AttributeKind::Ip,
        declarator: "IPAddressAttribute",
        aliases: &["ipaddress", "ip"],
        route: "ip",
        constraints: SCALAR,
        accepts_default: true,
        create_payload: create_scalar,
        update_payload: update_scalar,
        update_path: update_path_ip,
    },
    KindSpec {
        kind: AttributeKind::Enum,
        declarator: "EnumAttribute",
        aliases: &["enum"],
        route: "enum",
        constraints: ENUMERATED,
        accepts_default: true,
        create_payload: create_enum,
        update_payload: update_enum,
        update_path: update_path_enum,
    },
    KindSpec {
        kind: AttributeKind::Relationship,
        declarator: "RelationshipAttribute",
        aliases: &["relationship"],
        route: "relationship",
        constraints: RELATION,
        accepts_default: false,
        create_payload: create_relationship,
        update_payload: update_relationship,
        update_path: update_path_relationship,
    },
];

/// Names of classes that declare attributes rather than models.
const EXTRA_MARKERS: &[&str] = &["AttributeValidationError"];

impl AttributeKind {
    pub fn spec(self) -> &'static KindSpec {
        // row order of CATALOG
        let row = match self {
            AttributeKind::String => 0,
            AttributeKind::Integer => 1,
            AttributeKind::Float => 2,
            AttributeKind::Boolean => 3,
            AttributeKind::Datetime => 4,
            AttributeKind::Email => 5,
            AttributeKind::Ip => 6,
            AttributeKind::Enum => 7,
            AttributeKind::Relationship => 8,
        };
        &CATALOG[row]
    }

    pub fn as_str(self) -> &'static str {
        self.spec().route
    }

    /// Maps the store's `type`/`format` pair back to a kind.
    pub fn from_remote(type_: &str, format: Option<&str>) -> Option<AttributeKind> {
        Some(match (type_, format) {
            ("string", Some("email")) => AttributeKind::Email,
            ("string", Some("ip")) => AttributeKind::Ip,
            ("string", Some("enum")) => AttributeKind::Enum,
            ("string", _) => AttributeKind::String,
            ("integer", _) => AttributeKind::Integer,
            ("double", _) | ("float", _) => AttributeKind::Float,
            ("boolean", _) => AttributeKind::Boolean,
            ("datetime", _) => AttributeKind::Datetime,
            ("relationship", _) => AttributeKind::Relationship,
            _ => return None,
        })
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a declarator label such as `IntegerAttribute` or `ip`.
///
/// Matching is case-insensitive and ignores a trailing `Attribute`.
pub fn lookup_label(label: &str) -> Option<&'static KindSpec> {
    let lower = label.trim().to_ascii_lowercase();
    let stem = lower.strip_suffix("attribute").unwrap_or(&lower);
    CATALOG.iter().find(|s| s.aliases.contains(&stem))
}

/// Like [`lookup_label`], but reports the failure against a class field.
pub fn resolve_kind(label: &str, class: &str, field: &str) -> Result<&'static KindSpec> {
    lookup_label(label).ok_or_else(|| SyncError::UnsupportedAttributeKind {
        class: class.to_string(),
        field: field.to_string(),
        label: label.to_string(),
    })
}

/// True for declarator names the scanner should treat as attribute calls.
pub fn is_declarator(name: &str) -> bool {
    CATALOG.iter().any(|s| s.declarator == name)
}

/// True for calls the scanner captures: catalog declarators plus any other
/// `*Attribute` name, which the builder then rejects as unsupported.
pub fn looks_like_declarator(name: &str) -> bool {
    is_declarator(name) || (name.len() > "Attribute".len() && name.ends_with("Attribute"))
}

/// True for classes that belong to the attribute library itself.
pub fn is_marker_class(name: &str) -> bool {
    is_declarator(name) || EXTRA_MARKERS.contains(&name)
}

// ── payload handlers ────────────────────────────────────────────────

fn constraint_or(attr: &ResolvedAttribute, c: Constraint, fallback: Value) -> Value {
    attr.constraints
        .get(&c)
        .map(Literal::to_json)
        .unwrap_or(fallback)
}

fn base(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("key".into(), json!(attr.key));
    body.insert("required".into(), json!(attr.required));
    body.insert("default".into(), attr.default.clone().unwrap_or(Value::Null));
    body
}

fn update_base(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("required".into(), json!(attr.required));
    body.insert("default".into(), attr.default.clone().unwrap_or(Value::Null));
    body
}

fn create_scalar(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = base(attr);
    body.insert("array".into(), constraint_or(attr, Constraint::Array, json!(false)));
    body
}

fn create_string(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = create_scalar(attr);
    body.insert("size".into(), constraint_or(attr, Constraint::Size, json!(255)));
    body
}

fn create_ranged(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = create_scalar(attr);
    body.insert("min".into(), constraint_or(attr, Constraint::Min, Value::Null));
    body.insert("max".into(), constraint_or(attr, Constraint::Max, Value::Null));
    body
}

fn create_enum(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = create_scalar(attr);
    body.insert("elements".into(), constraint_or(attr, Constraint::Elements, json!([])));
    body
}

fn create_relationship(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert(
        "relatedCollectionId".into(),
        constraint_or(attr, Constraint::RelatedCollection, Value::Null),
    );
    body.insert("type".into(), constraint_or(attr, Constraint::RelationKind, Value::Null));
    body.insert("twoWay".into(), constraint_or(attr, Constraint::TwoWay, json!(false)));
    body.insert("key".into(), json!(attr.key));
    body.insert("twoWayKey".into(), constraint_or(attr, Constraint::TwoWayKey, Value::Null));
    body.insert("onDelete".into(), constraint_or(attr, Constraint::OnDelete, Value::Null));
    body
}

fn update_scalar(attr: &ResolvedAttribute) -> Map<String, Value> {
    update_base(attr)
}

fn update_string(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = update_base(attr);
    if let Some(size) = attr.constraints.get(&Constraint::Size) {
        body.insert("size".into(), size.to_json());
    }
    body
}

fn update_ranged(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = update_base(attr);
    body.insert("min".into(), constraint_or(attr, Constraint::Min, Value::Null));
    body.insert("max".into(), constraint_or(attr, Constraint::Max, Value::Null));
    body
}

fn update_enum(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = update_base(attr);
    body.insert("elements".into(), constraint_or(attr, Constraint::Elements, json!([])));
    body
}

fn update_relationship(attr: &ResolvedAttribute) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("onDelete".into(), constraint_or(attr, Constraint::OnDelete, Value::Null));
    body
}

fn update_path_string(key: &str) -> String {
    format!("string/{}", key)
}
fn update_path_integer(key: &str) -> String {
    format!("integer/{}", key)
}
fn update_path_float(key: &str) -> String {
    format!("float/{}", key)
}
fn update_path_boolean(key: &str) -> String {
    format!("boolean/{}", key)
}
fn update_path_datetime(key: &str) -> String {
    format!("datetime/{}", key)
}
fn update_path_email(key: &str) -> String {
    format!("email/{}", key)
}
fn update_path_ip(key: &str) -> String {
    format!("ip/{}", key)
}
fn update_path_enum(key: &str) -> String {
    format!("enum/{}", key)
}
fn update_path_relationship(key: &str) -> String {
    format!("{}/relationship", key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Constraints;

    fn resolved(kind: AttributeKind) -> ResolvedAttribute {
        ResolvedAttribute {
            key: "field".to_string(),
            kind,
            required: false,
            default: None,
            constraints: Constraints::new(),
        }
    }

    #[test]
    fn every_kind_has_one_row() {
        for s in CATALOG {
            assert_eq!(CATALOG.iter().filter(|o| o.kind == s.kind).count(), 1);
            assert!(std::ptr::eq(s.kind.spec(), s), "{:?} maps to the wrong row", s.kind);
            assert_eq!(s.kind.spec().kind, s.kind);
        }
        assert_eq!(CATALOG.len(), 9);
    }

    #[test]
    fn constraint_display_matches_serialized_name() {
        for c in Constraint::ALL {
            assert_eq!(serde_json::to_value(c).unwrap(), json!(c.to_string()));
        }
        assert_eq!(Constraint::RelationKind.to_string(), "relationKind");
        assert_eq!(Constraint::RelationKind.as_str(), "relationType");
    }

    #[test]
    fn lookup_strips_suffix_case_insensitively() {
        assert_eq!(
            lookup_label("StringAttribute").map(|s| s.kind),
            Some(AttributeKind::String)
        );
        assert_eq!(
            lookup_label("ipaddressattribute").map(|s| s.kind),
            Some(AttributeKind::Ip)
        );
        assert_eq!(
            lookup_label("IPAddressAttribute").map(|s| s.kind),
            Some(AttributeKind::Ip)
        );
        assert_eq!(lookup_label("Float").map(|s| s.kind), Some(AttributeKind::Float));
        assert!(lookup_label("UrlAttribute").is_none());
    }

    #[test]
    fn resolve_kind_reports_unsupported() {
        let err = resolve_kind("GeoAttribute", "Place", "location").err();
        assert_eq!(
            err,
            Some(SyncError::UnsupportedAttributeKind {
                class: "Place".into(),
                field: "location".into(),
                label: "GeoAttribute".into(),
            })
        );
    }

    #[test]
    fn markers_include_declarators_and_validation_error() {
        assert!(is_marker_class("EnumAttribute"));
        assert!(is_marker_class("AttributeValidationError"));
        assert!(!is_marker_class("UserProfile"));
        assert!(is_declarator("RelationshipAttribute"));
        assert!(!is_declarator("AttributeValidationError"));
        assert!(looks_like_declarator("GeoAttribute"));
        assert!(!looks_like_declarator("Attribute"));
        assert!(!looks_like_declarator("Field"));
    }

    #[test]
    fn legal_constraints_per_kind() {
        assert!(AttributeKind::String.spec().allows(Constraint::Size));
        assert!(!AttributeKind::String.spec().allows(Constraint::Min));
        assert!(AttributeKind::Integer.spec().allows(Constraint::Max));
        assert!(AttributeKind::Enum.spec().allows(Constraint::Elements));
        assert!(!AttributeKind::Relationship.spec().allows(Constraint::Array));
        assert!(AttributeKind::Relationship.spec().allows(Constraint::OnDelete));
    }

    #[test]
    fn string_create_payload_fills_defaults() {
        let body = (AttributeKind::String.spec().create_payload)(&resolved(AttributeKind::String));
        assert_eq!(body["size"], json!(255));
        assert_eq!(body["array"], json!(false));
        assert_eq!(body["required"], json!(false));
        assert_eq!(body["default"], Value::Null);
    }

    #[test]
    fn relationship_update_sends_only_on_delete() {
        let mut attr = resolved(AttributeKind::Relationship);
        attr.constraints
            .insert(Constraint::OnDelete, Literal::Str("cascade".into()));
        let body = (AttributeKind::Relationship.spec().update_payload)(&attr);
        assert_eq!(body.len(), 1);
        assert_eq!(body["onDelete"], json!("cascade"));
        assert_eq!(
            (AttributeKind::Relationship.spec().update_path)("author"),
            "author/relationship"
        );
    }

    #[test]
    fn remote_kind_mapping() {
        assert_eq!(
            AttributeKind::from_remote("string", Some("email")),
            Some(AttributeKind::Email)
        );
        assert_eq!(AttributeKind::from_remote("double", None), Some(AttributeKind::Float));
        assert_eq!(AttributeKind::from_remote("string", None), Some(AttributeKind::String));
        assert_eq!(AttributeKind::from_remote("point", None), None);
    }
}
