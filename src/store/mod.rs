//! Remote schema store abstraction.
//!
//! The [`SchemaStore`] trait is the only way the pipeline talks to the
//! outside world. Implementations:
//!
//! - [`AppwriteStore`](crate::appwrite::AppwriteStore): blocking REST client
//! - [`memory::MemoryStore`]: in-memory, used by tests and `--dry-run`
//!
//! Calls block and are never retried here; callers that want backoff wrap
//! the store themselves.

pub mod memory;

use anyhow::Result;

use crate::models::{ExistingAttribute, ExistingSchemaSnapshot, ResolvedAttribute};

pub trait SchemaStore {
    /// Fetches every collection with its attributes.
    fn list_collections(&self) -> Result<ExistingSchemaSnapshot>;

    /// Creates an empty collection and returns its id.
    fn create_collection(&self, name: &str) -> Result<String>;

    fn create_attribute(&self, collection_id: &str, attribute: &ResolvedAttribute) -> Result<()>;

    /// `attribute` is already merged with `existing`.
    fn update_attribute(
        &self,
        collection_id: &str,
        attribute: &ResolvedAttribute,
        existing: &ExistingAttribute,
    ) -> Result<()>;
}
