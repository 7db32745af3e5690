//! Canonical model builder.
//!
//! Turns raw scanner output into validated [`ClassDescriptor`]s: resolves
//! declarator labels through the catalog, fills `required = false` where it
//! is absent, turns a datetime `default="Now"` into the apply-time sentinel,
//! and maps keyword arguments onto the typed constraint keys legal for the
//! attribute's kind.
//!
//! Nothing here is fatal. Rejected attributes and constraints are returned as
//! warnings next to whatever could still be built.

use crate::catalog::{self, AttributeKind, Constraint};
use crate::error::SyncError;
use crate::models::{
    AttributeDescriptor, ClassDescriptor, Constraints, DefaultValue, Literal, RawAttribute,
    RawClass,
};
use crate::scanner::to_camel_case;

/// Keyword arguments that are not constraints.
const RESERVED_KEYWORDS: &[&str] = &["attribute_key", "required", "default"];

/// The datetime default resolved to the current instant at apply time.
pub const NOW_SENTINEL: &str = "Now";

#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub classes: Vec<ClassDescriptor>,
    pub warnings: Vec<SyncError>,
}

/// Builds descriptors for every raw class, in input order.
pub fn build_classes(raw: &[RawClass]) -> BuildOutcome {
    let mut outcome = BuildOutcome::default();
    for class in raw {
        let (descriptor, warnings) = build_class(class);
        outcome.warnings.extend(warnings);
        outcome.classes.extend(descriptor);
    }
    outcome
}

pub fn build_class(raw: &RawClass) -> (Option<ClassDescriptor>, Vec<SyncError>) {
    let mut warnings = Vec::new();
    let mut attributes = Vec::with_capacity(raw.attributes.len());

    for attr in &raw.attributes {
        match build_attribute(&raw.name, attr, &mut warnings) {
            Ok(descriptor) => attributes.push(descriptor),
            Err(err) => {
                tracing::warn!(
                    class = %raw.name,
                    field = %attr.field,
                    path = %raw.source.display(),
                    error = %err,
                    "skipping attribute"
                );
                warnings.push(err);
            }
        }
    }

    if attributes.is_empty() {
        tracing::warn!(class = %raw.name, "no valid attributes left, class dropped");
        return (None, warnings);
    }

    let descriptor = ClassDescriptor {
        name: to_camel_case(&raw.name),
        source: raw.source.clone(),
        attributes,
    };
    (Some(descriptor), warnings)
}

fn build_attribute(
    class: &str,
    attr: &RawAttribute,
    warnings: &mut Vec<SyncError>,
) -> Result<AttributeDescriptor, SyncError> {
    let spec = catalog::resolve_kind(&attr.declarator, class, &attr.field)?;
    let invalid = |constraint: &str| SyncError::InvalidConstraint {
        class: class.to_string(),
        field: attr.field.clone(),
        kind: spec.kind.to_string(),
        constraint: constraint.to_string(),
    };

    let default = match attr.arg("default") {
        None | Some(Literal::Null) => None,
        Some(_) if !spec.accepts_default => {
            warnings.push(invalid("default"));
            None
        }
        Some(Literal::Str(s)) if spec.kind == AttributeKind::Datetime && s == NOW_SENTINEL => {
            Some(DefaultValue::Now)
        }
        Some(lit) => Some(DefaultValue::Literal(lit.clone())),
    };

    let mut constraints = Constraints::new();
    for arg in &attr.args {
        if RESERVED_KEYWORDS.contains(&arg.name.as_str()) {
            continue;
        }
        let Some(constraint) = Constraint::from_keyword(&arg.name).filter(|c| spec.allows(*c))
        else {
            let err = invalid(&arg.name);
            tracing::warn!(error = %err, "dropping constraint");
            warnings.push(err);
            continue;
        };
        match &arg.value {
            Some(lit) if !lit.is_null() => {
                constraints.insert(constraint, lit.clone());
            }
            Some(_) => {
                constraints.remove(&constraint);
            }
            None => {
                tracing::debug!(
                    class,
                    field = %attr.field,
                    argument = %arg.name,
                    "non-literal argument treated as absent"
                );
                constraints.remove(&constraint);
            }
        }
    }

    let required = attr.arg("required").and_then(Literal::as_bool);
    Ok(AttributeDescriptor {
        key: attr.key.clone(),
        kind: spec.kind,
        required: required.unwrap_or(false),
        required_explicit: required.is_some(),
        optional: attr.optional,
        default,
        constraints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawArgument;
    use std::path::PathBuf;

    fn raw_attr(field: &str, declarator: &str, args: &[(&str, Option<Literal>)]) -> RawAttribute {
        RawAttribute {
            field: field.to_string(),
            key: to_camel_case(field),
            declarator: declarator.to_string(),
            args: args
                .iter()
                .map(|(n, v)| RawArgument {
                    name: n.to_string(),
                    value: v.clone(),
                })
                .collect(),
            optional: false,
            line: 1,
        }
    }

    fn raw_class(name: &str, attributes: Vec<RawAttribute>) -> RawClass {
        RawClass {
            name: name.to_string(),
            source: PathBuf::from("models.py"),
            line: 1,
            attributes,
        }
    }

    #[test]
    fn fills_required_and_maps_constraints() {
        let class = raw_class(
            "UserProfile",
            vec![raw_attr(
                "age",
                "IntegerAttribute",
                &[
                    ("min", Some(Literal::Int(0))),
                    ("max", Some(Literal::Int(150))),
                ],
            )],
        );
        let (desc, warnings) = build_class(&class);
        assert!(warnings.is_empty());
        let desc = desc.unwrap();
        let age = &desc.attributes[0];
        assert_eq!(age.kind, AttributeKind::Integer);
        assert!(!age.required);
        assert!(!age.required_explicit);
        assert_eq!(age.constraint(Constraint::Min), Some(&Literal::Int(0)));
        assert_eq!(age.constraint(Constraint::Max), Some(&Literal::Int(150)));
    }

    #[test]
    fn datetime_now_becomes_sentinel() {
        let class = raw_class(
            "Post",
            vec![
                raw_attr(
                    "created_at",
                    "DatetimeAttribute",
                    &[("default", Some(Literal::Str("Now".into())))],
                ),
                raw_attr(
                    "label",
                    "StringAttribute",
                    &[("default", Some(Literal::Str("Now".into())))],
                ),
            ],
        );
        let desc = build_class(&class).0.unwrap();
        assert_eq!(desc.attributes[0].default, Some(DefaultValue::Now));
        assert_eq!(
            desc.attributes[1].default,
            Some(DefaultValue::Literal(Literal::Str("Now".into())))
        );
    }

    #[test]
    fn unsupported_kind_keeps_the_rest_of_the_class() {
        let class = raw_class(
            "Place",
            vec![
                raw_attr("location", "GeoAttribute", &[]),
                raw_attr("name", "StringAttribute", &[]),
            ],
        );
        let (desc, warnings) = build_class(&class);
        assert_eq!(desc.unwrap().attributes.len(), 1);
        assert!(matches!(
            warnings.as_slice(),
            [SyncError::UnsupportedAttributeKind { label, .. }] if label == "GeoAttribute"
        ));
    }

    #[test]
    fn illegal_constraints_are_dropped_with_a_warning() {
        let class = raw_class(
            "Post",
            vec![raw_attr(
                "title",
                "StringAttribute",
                &[
                    ("size", Some(Literal::Int(80))),
                    ("min", Some(Literal::Int(1))),
                    ("description", Some(Literal::Str("x".into()))),
                ],
            )],
        );
        let (desc, warnings) = build_class(&class);
        let title = &desc.unwrap().attributes[0];
        assert_eq!(title.constraints.len(), 1);
        assert_eq!(title.constraint(Constraint::Size), Some(&Literal::Int(80)));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn non_literal_and_null_arguments_are_absent() {
        let class = raw_class(
            "Post",
            vec![raw_attr(
                "score",
                "FloatAttribute",
                &[("min", None), ("max", Some(Literal::Null))],
            )],
        );
        let desc = build_class(&class).0.unwrap();
        assert!(desc.attributes[0].constraints.is_empty());
    }

    #[test]
    fn relationship_keywords() {
        let class = raw_class(
            "Comment",
            vec![raw_attr(
                "post",
                "RelationshipAttribute",
                &[
                    ("related_collection_id", Some(Literal::Str("posts".into()))),
                    ("type", Some(Literal::Str("manyToOne".into()))),
                    ("two_way", Some(Literal::Bool(true))),
                    ("on_delete", Some(Literal::Str("cascade".into()))),
                    ("default", Some(Literal::Str("x".into()))),
                ],
            )],
        );
        let (desc, warnings) = build_class(&class);
        let post = &desc.unwrap().attributes[0];
        assert_eq!(post.kind, AttributeKind::Relationship);
        assert_eq!(post.constraints.len(), 4);
        assert_eq!(post.default, None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn class_with_only_rejected_attributes_is_dropped() {
        let class = raw_class("Odd", vec![raw_attr("x", "UrlAttribute", &[])]);
        let (desc, warnings) = build_class(&class);
        assert!(desc.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn optional_and_required_are_independent() {
        let mut attr = raw_attr("bio", "StringAttribute", &[("required", Some(Literal::Bool(true)))]);
        attr.optional = true;
        let desc = build_class(&raw_class("P", vec![attr])).0.unwrap();
        assert!(desc.attributes[0].optional);
        assert!(desc.attributes[0].required);
        assert!(desc.attributes[0].required_explicit);
    }

    #[test]
    fn class_name_uses_camel_case_convention() {
        let class = raw_class("user_profile", vec![raw_attr("bio", "StringAttribute", &[])]);
        assert_eq!(build_class(&class).0.unwrap().name, "userProfile");
    }
}
