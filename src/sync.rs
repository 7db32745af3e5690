//! Pipeline orchestration.
//!
//! Runs scan → build → snapshot → plan → apply and prints the summaries the
//! CLI shows. The library entry points ([`prepare`], [`fetch_snapshot`],
//! [`sync_tree`]) take a [`SchemaStore`] so they can run against
//! [`MemoryStore`] in tests and dry runs.

use std::path::Path;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::appwrite::{load_snapshot_file, AppwriteStore};
use crate::apply::{apply, system_clock, ApplyReport};
use crate::builder::build_classes;
use crate::config::{Config, ScanConfig};
use crate::error::SyncError;
use crate::models::{ClassDescriptor, ExistingSchemaSnapshot};
use crate::progress::ProgressReporter;
use crate::reconcile::{plan, Operation, PlanMode, ReconciliationPlan};
use crate::scanner::{CancelFlag, Scanner};
use crate::store::memory::MemoryStore;
use crate::store::SchemaStore;

/// Descriptors built from one scan, plus everything that was skipped.
#[derive(Debug, Default)]
pub struct Prepared {
    pub classes: Vec<ClassDescriptor>,
    pub files_scanned: usize,
    /// Files that failed to parse.
    pub parse_errors: Vec<SyncError>,
    /// Attributes and constraints rejected by the builder.
    pub warnings: Vec<SyncError>,
    pub cancelled: bool,
}

/// Outcome of a full [`sync_tree`] run.
#[derive(Debug)]
pub struct SyncReport {
    pub prepared: Prepared,
    pub plan: ReconciliationPlan,
    pub applied: ApplyReport,
}

/// Scans `root` and builds canonical descriptors.
pub fn prepare(
    config: &ScanConfig,
    root: &Path,
    cancel: Option<CancelFlag>,
    reporter: &dyn ProgressReporter,
) -> Result<Prepared, SyncError> {
    let mut scanner = Scanner::new(config).with_reporter(reporter);
    if let Some(cancel) = cancel {
        scanner = scanner.with_cancel(cancel);
    }
    let scanned = scanner.scan_tree(root)?;
    let built = build_classes(&scanned.classes);
    Ok(Prepared {
        classes: built.classes,
        files_scanned: scanned.files_scanned,
        parse_errors: scanned.errors,
        warnings: built.warnings,
        cancelled: scanned.cancelled,
    })
}

/// Fetches the remote schema. Failure aborts the run.
pub fn fetch_snapshot(store: &dyn SchemaStore) -> Result<ExistingSchemaSnapshot, SyncError> {
    store
        .list_collections()
        .map_err(|e| SyncError::Snapshot(format!("{:#}", e)))
}

/// Scans `root`, plans against the store's current schema, and applies.
pub fn sync_tree(
    config: &ScanConfig,
    root: &Path,
    store: &dyn SchemaStore,
    mode: PlanMode,
    clock: &dyn Fn() -> DateTime<Utc>,
    reporter: &dyn ProgressReporter,
) -> Result<SyncReport, SyncError> {
    let prepared = prepare(config, root, None, reporter)?;
    let snapshot = fetch_snapshot(store)?;
    let plan = plan(&prepared.classes, &snapshot, mode);
    let applied = apply(&plan, store, clock, reporter);
    Ok(SyncReport {
        prepared,
        plan,
        applied,
    })
}

// ============ CLI commands ============

pub fn run_scan(
    config: &Config,
    root: &Path,
    json: bool,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    let prepared = prepare(&config.scan, root, None, reporter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prepared.classes)?);
        return Ok(());
    }

    println!("scan {}", root.display());
    print_prepared(&prepared);
    for class in &prepared.classes {
        println!("  {} ({})", class.name, class.source.display());
        for attr in &class.attributes {
            let mut flags = Vec::new();
            if attr.required {
                flags.push("required".to_string());
            }
            if attr.optional {
                flags.push("optional".to_string());
            }
            for (c, v) in &attr.constraints {
                flags.push(format!("{}={}", c, v));
            }
            if flags.is_empty() {
                println!("    {}: {}", attr.key, attr.kind);
            } else {
                println!("    {}: {} [{}]", attr.key, attr.kind, flags.join(", "));
            }
        }
    }
    println!("ok");
    Ok(())
}

pub fn run_plan(
    config: &Config,
    root: &Path,
    update: bool,
    snapshot_file: Option<&Path>,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    let prepared = prepare(&config.scan, root, None, reporter)?;
    let snapshot = match snapshot_file {
        Some(path) => load_snapshot_file(path)?,
        None => {
            let store = AppwriteStore::new(&config.store.credentials()?)?;
            fetch_snapshot(&store)?
        }
    };
    let mode = if update {
        PlanMode::Update
    } else {
        PlanMode::CreateOnly
    };
    let plan = plan(&prepared.classes, &snapshot, mode);

    println!("plan {} ({})", root.display(), mode_label(mode));
    print_prepared(&prepared);
    for op in &plan.operations {
        let marker = match op {
            Operation::UpdateAttribute { .. } => "~",
            _ => "+",
        };
        println!("  {} {}", marker, op);
    }
    for skipped in &plan.skipped {
        println!("  - skip {}", skipped);
    }
    println!("  collections to create: {}", plan.collections_to_create());
    println!("  attributes to create: {}", plan.attributes_to_create());
    println!("  attributes to update: {}", plan.attributes_to_update());
    println!("ok");
    Ok(())
}

pub fn run_create(
    config: &Config,
    root: &Path,
    dry_run: bool,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    run_apply(config, root, PlanMode::CreateOnly, dry_run, reporter)
}

pub fn run_update(
    config: &Config,
    root: &Path,
    dry_run: bool,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    eprintln!(
        "note: update merges field by field; settings you omit keep their current remote value"
    );
    run_apply(config, root, PlanMode::Update, dry_run, reporter)
}

fn run_apply(
    config: &Config,
    root: &Path,
    mode: PlanMode,
    dry_run: bool,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    let prepared = prepare(&config.scan, root, None, reporter)?;
    let remote = AppwriteStore::new(&config.store.credentials()?)?;
    let snapshot = fetch_snapshot(&remote)?;
    let plan = plan(&prepared.classes, &snapshot, mode);

    let command = match mode {
        PlanMode::CreateOnly => "create",
        PlanMode::Update => "update",
    };

    let report = if dry_run {
        let scratch = MemoryStore::with_snapshot(snapshot);
        println!("{} {} (dry-run)", command, root.display());
        apply(&plan, &scratch, &system_clock, reporter)
    } else {
        println!("{} {}", command, root.display());
        apply(&plan, &remote, &system_clock, reporter)
    };

    print_prepared(&prepared);
    println!("  collections created: {}", report.collections_created);
    println!("  attributes created: {}", report.attributes_created);
    println!("  attributes updated: {}", report.attributes_updated);
    println!("  skipped: {}", plan.skipped.len() + report.skipped.len());
    for skipped in &plan.skipped {
        eprintln!("  skip {}", skipped);
    }
    for skipped in &report.skipped {
        eprintln!("  skip {}", skipped);
    }
    if !report.is_clean() {
        for failure in &report.failures {
            eprintln!("  error: {}", failure);
        }
        bail!("{} operation(s) failed", report.failures.len());
    }
    println!("ok");
    Ok(())
}

fn mode_label(mode: PlanMode) -> &'static str {
    match mode {
        PlanMode::CreateOnly => "create-only",
        PlanMode::Update => "update",
    }
}

fn print_prepared(prepared: &Prepared) {
    let attributes: usize = prepared.classes.iter().map(|c| c.attributes.len()).sum();
    println!("  files scanned: {}", prepared.files_scanned);
    println!("  classes found: {}", prepared.classes.len());
    println!("  attributes found: {}", attributes);
    if !prepared.parse_errors.is_empty() {
        println!("  files skipped: {}", prepared.parse_errors.len());
        for err in &prepared.parse_errors {
            eprintln!("  warning: {}", err);
        }
    }
    for warning in &prepared.warnings {
        eprintln!("  warning: {}", warning);
    }
}
