//! Error taxonomy for the scan → build → plan → apply pipeline.
//!
//! Every variant except [`SyncError::RootUnreadable`] and
//! [`SyncError::Snapshot`] is recoverable: the pipeline records it against
//! the file, attribute, or operation it concerns and keeps going.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// A single source file could not be read or tokenized.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A declarator could not be mapped to a catalog entry.
    #[error("unsupported attribute kind '{label}' on {class}.{field}")]
    UnsupportedAttributeKind {
        class: String,
        field: String,
        label: String,
    },

    /// A constraint argument is not legal for the attribute's kind.
    #[error("constraint '{constraint}' is not valid for {kind} attribute {class}.{field}")]
    InvalidConstraint {
        class: String,
        field: String,
        kind: String,
        constraint: String,
    },

    /// The remote snapshot lacks the structure an operation needs.
    #[error("lookup failed for {collection}: {reason}")]
    Lookup { collection: String, reason: String },

    /// The store rejected an operation.
    #[error("{operation} failed: {message}")]
    Apply { operation: String, message: String },

    /// The scan root does not exist or cannot be read.
    #[error("cannot read scan root {}: {message}", path.display())]
    RootUnreadable { path: PathBuf, message: String },

    /// The existing schema could not be fetched.
    #[error("failed to fetch schema snapshot: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
