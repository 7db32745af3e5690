//! Reconciliation engine.
//!
//! Diffs canonical [`ClassDescriptor`]s against an [`ExistingSchemaSnapshot`]
//! and produces a [`ReconciliationPlan`]: an ordered list of create/update
//! operations plus a record of everything skipped and why.
//!
//! ```text
//! class ─┬─ no remote collection ──▶ CreateCollection, CreateAttribute × n
//!        └─ remote collection ─┬─ create-only ──▶ skipped (exists)
//!                              └─ update ──▶ per attribute:
//!                                   absent remotely ──▶ CreateAttribute
//!                                   present ──▶ UpdateAttribute(existing)
//! ```
//!
//! There is no delete operation. Remote attributes the descriptors do not
//! mention are left alone. Planning never talks to the store.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SyncError;
use crate::models::{
    AttributeDescriptor, ClassDescriptor, ExistingAttribute, ExistingCollection,
    ExistingSchemaSnapshot, ResolvedAttribute,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Collections that already exist are skipped entirely.
    CreateOnly,
    /// Existing collections get missing attributes created and the rest updated.
    Update,
}

/// Target collection of an attribute operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CollectionRef {
    Existing { id: String, name: String },
    /// Created earlier in the same plan; the id is known only at apply time.
    Pending { name: String },
}

impl CollectionRef {
    pub fn name(&self) -> &str {
        match self {
            CollectionRef::Existing { name, .. } | CollectionRef::Pending { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateCollection {
        class: ClassDescriptor,
    },
    CreateAttribute {
        collection: CollectionRef,
        attribute: AttributeDescriptor,
    },
    UpdateAttribute {
        collection_id: String,
        collection_name: String,
        attribute: AttributeDescriptor,
        existing: ExistingAttribute,
    },
}

impl Operation {
    pub fn collection_name(&self) -> &str {
        match self {
            Operation::CreateCollection { class } => &class.name,
            Operation::CreateAttribute { collection, .. } => collection.name(),
            Operation::UpdateAttribute {
                collection_name, ..
            } => collection_name,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateCollection { class } => write!(f, "create collection {}", class.name),
            Operation::CreateAttribute {
                collection,
                attribute,
            } => write!(
                f,
                "create attribute {}.{} ({})",
                collection.name(),
                attribute.key,
                attribute.kind
            ),
            Operation::UpdateAttribute {
                collection_name,
                attribute,
                ..
            } => write!(
                f,
                "update attribute {}.{} ({})",
                collection_name, attribute.key, attribute.kind
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Create-only mode never touches an existing collection.
    CollectionExists,
    /// A later declaration of the same key in the same class wins.
    Superseded { line_order: usize },
    /// Another class already produced this collection name.
    NameCollision { first: PathBuf, second: PathBuf },
    /// The snapshot does not have the structure the operation needs.
    Lookup { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::CollectionExists => write!(f, "collection already exists"),
            SkipReason::Superseded { line_order } => {
                write!(f, "superseded by declaration #{}", line_order + 1)
            }
            SkipReason::NameCollision { first, second } => write!(
                f,
                "name also declared in {} (kept) and {}",
                first.display(),
                second.display()
            ),
            SkipReason::Lookup { message } => write!(f, "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedOperation {
    pub collection: String,
    pub attribute: Option<String>,
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl fmt::Display for SkippedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(key) => write!(f, "{}.{}: {}", self.collection, key, self.reason),
            None => write!(f, "{}: {}", self.collection, self.reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationPlan {
    pub operations: Vec<Operation>,
    pub skipped: Vec<SkippedOperation>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn count(&self, pred: impl Fn(&Operation) -> bool) -> usize {
        self.operations.iter().filter(|op| pred(op)).count()
    }

    pub fn collections_to_create(&self) -> usize {
        self.count(|op| matches!(op, Operation::CreateCollection { .. }))
    }

    pub fn attributes_to_create(&self) -> usize {
        self.count(|op| matches!(op, Operation::CreateAttribute { .. }))
    }

    pub fn attributes_to_update(&self) -> usize {
        self.count(|op| matches!(op, Operation::UpdateAttribute { .. }))
    }
}

/// Builds the plan. Operations follow class order, then attribute order.
pub fn plan(
    classes: &[ClassDescriptor],
    snapshot: &ExistingSchemaSnapshot,
    mode: PlanMode,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();
    let mut seen: HashMap<&str, &PathBuf> = HashMap::new();

    for class in classes {
        if let Some(first) = seen.get(class.name.as_str()) {
            tracing::warn!(
                collection = %class.name,
                first = %first.display(),
                second = %class.source.display(),
                "collection name declared more than once"
            );
            plan.skipped.push(SkippedOperation {
                collection: class.name.clone(),
                attribute: None,
                reason: SkipReason::NameCollision {
                    first: (*first).clone(),
                    second: class.source.clone(),
                },
            });
            continue;
        }
        seen.insert(&class.name, &class.source);

        let attributes = collapse_duplicates(class, &mut plan.skipped);
        let remote: Vec<&ExistingCollection> = snapshot.collections_named(&class.name).collect();

        match (remote.as_slice(), mode) {
            ([], _) => plan_new_collection(class, attributes, &mut plan),
            (_, PlanMode::CreateOnly) => {
                tracing::info!(collection = %class.name, "collection exists, skipping");
                plan.skipped.push(SkippedOperation {
                    collection: class.name.clone(),
                    attribute: None,
                    reason: SkipReason::CollectionExists,
                });
            }
            ([existing], PlanMode::Update) => {
                plan_existing_collection(existing, attributes, &mut plan)
            }
            (many, PlanMode::Update) => {
                let err = SyncError::Lookup {
                    collection: class.name.clone(),
                    reason: format!("{} remote collections share this name", many.len()),
                };
                tracing::warn!(error = %err, "skipping collection");
                plan.skipped.push(SkippedOperation {
                    collection: class.name.clone(),
                    attribute: None,
                    reason: SkipReason::Lookup {
                        message: err.to_string(),
                    },
                });
            }
        }
    }

    tracing::debug!(
        operations = plan.operations.len(),
        skipped = plan.skipped.len(),
        "plan built"
    );
    plan
}

/// Mapping semantics: first declaration's position, last declaration's value.
fn collapse_duplicates<'c>(
    class: &'c ClassDescriptor,
    skipped: &mut Vec<SkippedOperation>,
) -> Vec<&'c AttributeDescriptor> {
    let mut out: Vec<&AttributeDescriptor> = Vec::with_capacity(class.attributes.len());
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (order, attr) in class.attributes.iter().enumerate() {
        match index.get(attr.key.as_str()) {
            Some(&slot) => {
                skipped.push(SkippedOperation {
                    collection: class.name.clone(),
                    attribute: Some(attr.key.clone()),
                    reason: SkipReason::Superseded { line_order: order },
                });
                out[slot] = attr;
            }
            None => {
                index.insert(&attr.key, out.len());
                out.push(attr);
            }
        }
    }
    out
}

fn plan_new_collection(
    class: &ClassDescriptor,
    attributes: Vec<&AttributeDescriptor>,
    plan: &mut ReconciliationPlan,
) {
    let attributes: Vec<AttributeDescriptor> = attributes.into_iter().cloned().collect();
    plan.operations.push(Operation::CreateCollection {
        class: ClassDescriptor {
            name: class.name.clone(),
            source: class.source.clone(),
            attributes: attributes.clone(),
        },
    });
    for attribute in attributes {
        plan.operations.push(Operation::CreateAttribute {
            collection: CollectionRef::Pending {
                name: class.name.clone(),
            },
            attribute,
        });
    }
}

fn plan_existing_collection(
    collection: &ExistingCollection,
    attributes: Vec<&AttributeDescriptor>,
    plan: &mut ReconciliationPlan,
) {
    for attribute in attributes {
        let Some(existing) = collection.attribute(&attribute.key) else {
            plan.operations.push(Operation::CreateAttribute {
                collection: CollectionRef::Existing {
                    id: collection.id.clone(),
                    name: collection.name.clone(),
                },
                attribute: attribute.clone(),
            });
            continue;
        };

        if existing.kind != Some(attribute.kind) {
            let err = SyncError::Lookup {
                collection: collection.name.clone(),
                reason: format!(
                    "attribute '{}' is {} remotely but declared as {}",
                    attribute.key, existing.remote_type, attribute.kind
                ),
            };
            tracing::warn!(error = %err, "skipping attribute update");
            plan.skipped.push(SkippedOperation {
                collection: collection.name.clone(),
                attribute: Some(attribute.key.clone()),
                reason: SkipReason::Lookup {
                    message: err.to_string(),
                },
            });
            continue;
        }

        plan.operations.push(Operation::UpdateAttribute {
            collection_id: collection.id.clone(),
            collection_name: collection.name.clone(),
            attribute: attribute.clone(),
            existing: existing.clone(),
        });
    }
}

/// Field-level merge for an update.
///
/// An explicit new value always wins. An absent new value falls back to the
/// remote value, never to the catalog default. This includes `required` when
/// the declaration did not write it.
pub fn merge_attribute(
    attribute: &AttributeDescriptor,
    existing: &ExistingAttribute,
    now: DateTime<Utc>,
) -> ResolvedAttribute {
    let spec = attribute.kind.spec();
    let mut constraints: crate::models::Constraints = existing
        .constraints
        .iter()
        .filter(|(c, _)| spec.allows(**c))
        .map(|(c, v)| (*c, v.clone()))
        .collect();
    for (c, v) in &attribute.constraints {
        constraints.insert(*c, v.clone());
    }

    let default = match &attribute.default {
        Some(d) => Some(d.resolve(now)),
        None => existing
            .default
            .as_ref()
            .filter(|d| !d.is_null())
            .map(|d| d.to_json()),
    };

    ResolvedAttribute {
        key: attribute.key.clone(),
        kind: attribute.kind,
        required: if attribute.required_explicit {
            attribute.required
        } else {
            existing.required
        },
        default,
        constraints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeKind, Constraint};
    use crate::models::{Constraints, DefaultValue, Literal};
    use chrono::TimeZone;

    fn attr(key: &str, kind: AttributeKind) -> AttributeDescriptor {
        AttributeDescriptor::new(key, kind)
    }

    fn class(name: &str, attributes: Vec<AttributeDescriptor>) -> ClassDescriptor {
        ClassDescriptor {
            name: name.to_string(),
            source: PathBuf::from(format!("{}.py", name)),
            attributes,
        }
    }

    fn existing_attr(key: &str, kind: AttributeKind) -> ExistingAttribute {
        ExistingAttribute {
            key: key.to_string(),
            kind: Some(kind),
            remote_type: kind.to_string(),
            required: false,
            default: None,
            constraints: Constraints::new(),
        }
    }

    fn collection(id: &str, name: &str, attributes: Vec<ExistingAttribute>) -> ExistingCollection {
        ExistingCollection {
            id: id.to_string(),
            name: name.to_string(),
            attributes,
        }
    }

    #[test]
    fn empty_snapshot_creates_everything_in_order() {
        let classes = vec![
            class(
                "A",
                vec![attr("a1", AttributeKind::String), attr("a2", AttributeKind::Integer)],
            ),
            class("B", vec![attr("b1", AttributeKind::Boolean)]),
        ];
        let plan = plan(&classes, &ExistingSchemaSnapshot::default(), PlanMode::Update);
        let rendered: Vec<String> = plan.operations.iter().map(|o| o.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "create collection A",
                "create attribute A.a1 (string)",
                "create attribute A.a2 (integer)",
                "create collection B",
                "create attribute B.b1 (boolean)",
            ]
        );
        assert_eq!(plan.collections_to_create(), 2);
        assert_eq!(plan.attributes_to_create(), 3);
    }

    #[test]
    fn create_only_skips_existing_collection_entirely() {
        let classes = vec![class("A", vec![attr("new", AttributeKind::String)])];
        let snapshot = ExistingSchemaSnapshot {
            collections: vec![collection("c1", "A", vec![])],
        };
        let plan = plan(&classes, &snapshot, PlanMode::CreateOnly);
        assert!(plan.is_empty());
        assert_eq!(plan.skipped[0].reason, SkipReason::CollectionExists);
    }

    #[test]
    fn update_mode_creates_missing_and_updates_present() {
        let classes = vec![class(
            "A",
            vec![attr("kept", AttributeKind::String), attr("new", AttributeKind::Float)],
        )];
        let snapshot = ExistingSchemaSnapshot {
            collections: vec![collection(
                "c1",
                "A",
                vec![
                    existing_attr("kept", AttributeKind::String),
                    existing_attr("remote_only", AttributeKind::Integer),
                ],
            )],
        };
        let plan = plan(&classes, &snapshot, PlanMode::Update);
        assert_eq!(plan.operations.len(), 2);
        assert!(matches!(
            &plan.operations[0],
            Operation::UpdateAttribute { collection_id, attribute, .. }
                if collection_id == "c1" && attribute.key == "kept"
        ));
        assert!(matches!(
            &plan.operations[1],
            Operation::CreateAttribute { collection: CollectionRef::Existing { id, .. }, attribute }
                if id == "c1" && attribute.key == "new"
        ));
    }

    #[test]
    fn kind_mismatch_is_a_skipped_lookup() {
        let classes = vec![class(
            "A",
            vec![attr("x", AttributeKind::Integer), attr("y", AttributeKind::String)],
        )];
        let snapshot = ExistingSchemaSnapshot {
            collections: vec![collection(
                "c1",
                "A",
                vec![
                    existing_attr("x", AttributeKind::String),
                    existing_attr("y", AttributeKind::String),
                ],
            )],
        };
        let plan = plan(&classes, &snapshot, PlanMode::Update);
        assert_eq!(plan.attributes_to_update(), 1);
        assert!(matches!(plan.skipped[0].reason, SkipReason::Lookup { .. }));
        assert_eq!(plan.skipped[0].attribute.as_deref(), Some("x"));
    }

    #[test]
    fn ambiguous_remote_collection_is_skipped() {
        let classes = vec![class("A", vec![attr("x", AttributeKind::String)])];
        let snapshot = ExistingSchemaSnapshot {
            collections: vec![collection("c1", "A", vec![]), collection("c2", "A", vec![])],
        };
        let plan = plan(&classes, &snapshot, PlanMode::Update);
        assert!(plan.is_empty());
        assert!(matches!(plan.skipped[0].reason, SkipReason::Lookup { .. }));
    }

    #[test]
    fn duplicate_keys_keep_first_position_and_last_value() {
        let mut small = attr("title", AttributeKind::String);
        small.constraints.insert(Constraint::Size, Literal::Int(10));
        let mut large = attr("title", AttributeKind::String);
        large.constraints.insert(Constraint::Size, Literal::Int(99));
        let classes = vec![class(
            "A",
            vec![small, attr("body", AttributeKind::String), large],
        )];
        let plan = plan(&classes, &ExistingSchemaSnapshot::default(), PlanMode::Update);
        assert_eq!(plan.attributes_to_create(), 2);
        let Operation::CreateAttribute { attribute, .. } = &plan.operations[1] else {
            panic!("expected create attribute");
        };
        assert_eq!(attribute.key, "title");
        assert_eq!(attribute.constraint(Constraint::Size), Some(&Literal::Int(99)));
        assert!(matches!(plan.skipped[0].reason, SkipReason::Superseded { .. }));
    }

    #[test]
    fn name_collisions_are_surfaced_not_merged() {
        let mut second = class("A", vec![attr("other", AttributeKind::String)]);
        second.source = PathBuf::from("other/models.py");
        let classes = vec![class("A", vec![attr("x", AttributeKind::String)]), second];
        let plan = plan(&classes, &ExistingSchemaSnapshot::default(), PlanMode::Update);
        assert_eq!(plan.collections_to_create(), 1);
        assert_eq!(plan.attributes_to_create(), 1);
        assert!(matches!(
            &plan.skipped[0].reason,
            SkipReason::NameCollision { second, .. } if second == &PathBuf::from("other/models.py")
        ));
    }

    #[test]
    fn merge_prefers_new_values_and_falls_back_to_remote() {
        let mut desc = attr("age", AttributeKind::Integer);
        desc.constraints.insert(Constraint::Max, Literal::Int(200));
        let mut remote = existing_attr("age", AttributeKind::Integer);
        remote.constraints.insert(Constraint::Min, Literal::Int(18));
        remote.constraints.insert(Constraint::Max, Literal::Int(150));
        remote.default = Some(Literal::Int(30));

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let merged = merge_attribute(&desc, &remote, now);
        assert_eq!(merged.constraints.get(&Constraint::Min), Some(&Literal::Int(18)));
        assert_eq!(merged.constraints.get(&Constraint::Max), Some(&Literal::Int(200)));
        assert_eq!(merged.default, Some(serde_json::json!(30)));
    }

    #[test]
    fn merge_keeps_remote_required_unless_declared() {
        let mut desc = attr("title", AttributeKind::String);
        desc.constraints.insert(Constraint::Size, Literal::Int(10));
        let mut remote = existing_attr("title", AttributeKind::String);
        remote.required = true;
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(merge_attribute(&desc, &remote, now).required);

        desc.required_explicit = true;
        assert!(!merge_attribute(&desc, &remote, now).required);

        desc.required = true;
        remote.required = false;
        assert!(merge_attribute(&desc, &remote, now).required);
    }

    #[test]
    fn merge_resolves_sentinel_at_call_time() {
        let mut desc = attr("createdAt", AttributeKind::Datetime);
        desc.default = Some(DefaultValue::Now);
        let remote = existing_attr("createdAt", AttributeKind::Datetime);
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let merged = merge_attribute(&desc, &remote, now);
        assert_eq!(
            merged.default,
            Some(serde_json::json!("2024-05-06T07:08:09.000Z"))
        );
    }
}
