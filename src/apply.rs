//! Plan executor.
//!
//! Sends a [`ReconciliationPlan`] to a [`SchemaStore`] in plan order. Ids of
//! collections created along the way resolve the plan's pending references.
//! Sentinel defaults are resolved from the clock right before each call, so
//! two applies of the same plan at different instants store different
//! timestamps.
//!
//! Apply is not transactional: a failed call is recorded and the executor
//! moves on. Nothing is rolled back.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::models::ResolvedAttribute;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::reconcile::{merge_attribute, CollectionRef, Operation, ReconciliationPlan};
use crate::store::SchemaStore;

/// Counts and failures of one apply run.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub collections_created: usize,
    pub attributes_created: usize,
    pub attributes_updated: usize,
    pub failures: Vec<SyncError>,
    /// Operations not attempted, with the reason.
    pub skipped: Vec<String>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Wall clock used by the CLI.
pub fn system_clock() -> DateTime<Utc> {
    Utc::now()
}

pub fn apply(
    plan: &ReconciliationPlan,
    store: &dyn SchemaStore,
    clock: &dyn Fn() -> DateTime<Utc>,
    reporter: &dyn ProgressReporter,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    // Pending name -> id, or None when the create failed.
    let mut created: HashMap<String, Option<String>> = HashMap::new();
    let total = plan.operations.len() as u64;

    for (i, op) in plan.operations.iter().enumerate() {
        reporter.report(ProgressEvent::Applying {
            operation: op.to_string(),
            n: i as u64 + 1,
            total,
        });

        match op {
            Operation::CreateCollection { class } => match store.create_collection(&class.name) {
                Ok(id) => {
                    tracing::info!(collection = %class.name, id = %id, "created collection");
                    created.insert(class.name.clone(), Some(id));
                    report.collections_created += 1;
                }
                Err(e) => {
                    created.insert(class.name.clone(), None);
                    record_failure(&mut report, op, e);
                }
            },
            Operation::CreateAttribute {
                collection,
                attribute,
            } => {
                let collection_id = match collection {
                    CollectionRef::Existing { id, .. } => id.clone(),
                    CollectionRef::Pending { name } => match created.get(name) {
                        Some(Some(id)) => id.clone(),
                        Some(None) => {
                            skip(&mut report, op, "collection was not created");
                            continue;
                        }
                        None => {
                            skip(&mut report, op, "collection is not part of this plan");
                            continue;
                        }
                    },
                };
                let resolved = ResolvedAttribute::from_descriptor(attribute, clock());
                match store.create_attribute(&collection_id, &resolved) {
                    Ok(()) => report.attributes_created += 1,
                    Err(e) => record_failure(&mut report, op, e),
                }
            }
            Operation::UpdateAttribute {
                collection_id,
                attribute,
                existing,
                ..
            } => {
                let merged = merge_attribute(attribute, existing, clock());
                match store.update_attribute(collection_id, &merged, existing) {
                    Ok(()) => report.attributes_updated += 1,
                    Err(e) => record_failure(&mut report, op, e),
                }
            }
        }
    }

    tracing::debug!(
        collections_created = report.collections_created,
        attributes_created = report.attributes_created,
        attributes_updated = report.attributes_updated,
        failures = report.failures.len(),
        "apply finished"
    );
    report
}

fn record_failure(report: &mut ApplyReport, op: &Operation, err: anyhow::Error) {
    let err = SyncError::Apply {
        operation: op.to_string(),
        message: format!("{:#}", err),
    };
    tracing::warn!(error = %err, "operation failed");
    report.failures.push(err);
}

fn skip(report: &mut ApplyReport, op: &Operation, reason: &str) {
    tracing::warn!(operation = %op, reason, "skipping operation");
    report.skipped.push(format!("{}: {}", op, reason));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeKind, Constraint};
    use crate::models::{
        AttributeDescriptor, ClassDescriptor, DefaultValue, ExistingSchemaSnapshot, Literal,
    };
    use crate::progress::NoProgress;
    use crate::reconcile::{plan, PlanMode};
    use crate::store::memory::{MemoryStore, StoreCall};
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn fixed(secs: i64) -> impl Fn() -> DateTime<Utc> {
        move || Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn audit_class() -> ClassDescriptor {
        let mut created_at = AttributeDescriptor::new("createdAt", AttributeKind::Datetime);
        created_at.default = Some(DefaultValue::Now);
        let mut title = AttributeDescriptor::new("title", AttributeKind::String);
        title.constraints.insert(Constraint::Size, Literal::Int(80));
        ClassDescriptor {
            name: "auditEntry".to_string(),
            source: PathBuf::from("audit.py"),
            attributes: vec![title, created_at],
        }
    }

    fn stored_default(store: &MemoryStore, key: &str) -> Option<Literal> {
        store
            .snapshot()
            .collections
            .iter()
            .find_map(|c| c.attribute(key))
            .and_then(|a| a.default.clone())
    }

    #[test]
    fn pending_refs_resolve_to_created_ids() {
        let store = MemoryStore::new();
        let plan = plan(
            &[audit_class()],
            &ExistingSchemaSnapshot::default(),
            PlanMode::CreateOnly,
        );
        let report = apply(&plan, &store, &fixed(0), &NoProgress);
        assert!(report.is_clean());
        assert_eq!(report.collections_created, 1);
        assert_eq!(report.attributes_created, 2);
        let calls = store.calls();
        assert!(matches!(
            &calls[1],
            StoreCall::CreateAttribute { collection_id, .. } if collection_id == "col1"
        ));
    }

    #[test]
    fn sentinel_is_resolved_per_apply() {
        let plan = plan(
            &[audit_class()],
            &ExistingSchemaSnapshot::default(),
            PlanMode::CreateOnly,
        );

        let first = MemoryStore::new();
        apply(&plan, &first, &fixed(1_700_000_000), &NoProgress);
        let second = MemoryStore::new();
        apply(&plan, &second, &fixed(1_700_000_060), &NoProgress);

        let a = stored_default(&first, "createdAt");
        let b = stored_default(&second, "createdAt");
        assert_eq!(a, Some(Literal::Str("2023-11-14T22:13:20.000Z".into())));
        assert_ne!(a, b);
    }

    #[test]
    fn failed_collection_skips_its_attributes() {
        let store = MemoryStore::new();
        store.fail_on("auditEntry");
        let plan = plan(
            &[audit_class()],
            &ExistingSchemaSnapshot::default(),
            PlanMode::CreateOnly,
        );
        let report = apply(&plan, &store, &fixed(0), &NoProgress);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.attributes_created, 0);
        assert_eq!(store.calls().len(), 1);
    }

    #[test]
    fn attribute_failure_does_not_stop_the_run() {
        let store = MemoryStore::new();
        store.fail_on("title");
        let plan = plan(
            &[audit_class()],
            &ExistingSchemaSnapshot::default(),
            PlanMode::CreateOnly,
        );
        let report = apply(&plan, &store, &fixed(0), &NoProgress);
        assert_eq!(report.collections_created, 1);
        assert_eq!(report.attributes_created, 1);
        assert!(matches!(
            &report.failures[0],
            SyncError::Apply { operation, .. } if operation.contains("auditEntry.title")
        ));
    }

    #[test]
    fn updates_send_merged_attributes() {
        let seeded = MemoryStore::new();
        let first = plan(
            &[audit_class()],
            &ExistingSchemaSnapshot::default(),
            PlanMode::CreateOnly,
        );
        apply(&first, &seeded, &fixed(0), &NoProgress);

        let mut class = audit_class();
        class.attributes[0].constraints.clear();
        let store = MemoryStore::with_snapshot(seeded.snapshot());
        let update = plan(&[class], &store.snapshot(), PlanMode::Update);
        let report = apply(&update, &store, &fixed(0), &NoProgress);
        assert_eq!(report.attributes_updated, 2);

        let title = store.snapshot().collections[0]
            .attribute("title")
            .cloned()
            .unwrap();
        assert_eq!(title.constraints.get(&Constraint::Size), Some(&Literal::Int(80)));
    }
}
