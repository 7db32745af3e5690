//! In-memory [`SchemaStore`] for tests and dry runs.
//!
//! Keeps collections behind a `RwLock` and records every call so tests can
//! assert on what the executor sent. Individual collection or attribute
//! names can be configured to fail.

use std::collections::HashSet;
use std::sync::RwLock;

use anyhow::{bail, Result};

use crate::models::{
    ExistingAttribute, ExistingCollection, ExistingSchemaSnapshot, Literal, ResolvedAttribute,
};

use super::SchemaStore;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    CreateCollection { name: String },
    CreateAttribute { collection_id: String, attribute: ResolvedAttribute },
    UpdateAttribute { collection_id: String, attribute: ResolvedAttribute },
}

pub struct MemoryStore {
    collections: RwLock<Vec<ExistingCollection>>,
    calls: RwLock<Vec<StoreCall>>,
    failing: RwLock<HashSet<String>>,
    next_id: RwLock<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_snapshot(ExistingSchemaSnapshot::default())
    }

    pub fn with_snapshot(snapshot: ExistingSchemaSnapshot) -> Self {
        Self {
            collections: RwLock::new(snapshot.collections),
            calls: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
            next_id: RwLock::new(1),
        }
    }

    /// Makes every call naming `name` (a collection name or attribute key) fail.
    pub fn fail_on(&self, name: &str) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(name.to_string());
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> ExistingSchemaSnapshot {
        ExistingSchemaSnapshot {
            collections: self
                .collections
                .read()
                .map(|c| c.clone())
                .unwrap_or_default(),
        }
    }

    fn check(&self, name: &str) -> Result<()> {
        let failing = self
            .failing
            .read()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        if failing.contains(name) {
            bail!("rejected by store: {}", name);
        }
        Ok(())
    }

    fn record(&self, call: StoreCall) {
        if let Ok(mut calls) = self.calls.write() {
            calls.push(call);
        }
    }

    fn with_collection<T>(
        &self,
        collection_id: &str,
        f: impl FnOnce(&mut ExistingCollection) -> Result<T>,
    ) -> Result<T> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        let collection = collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| anyhow::anyhow!("collection not found: {}", collection_id))?;
        f(collection)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn stored(attribute: &ResolvedAttribute) -> ExistingAttribute {
    ExistingAttribute {
        key: attribute.key.clone(),
        kind: Some(attribute.kind),
        remote_type: attribute.kind.to_string(),
        required: attribute.required,
        default: attribute.default.as_ref().and_then(Literal::from_json),
        constraints: attribute.constraints.clone(),
    }
}

impl SchemaStore for MemoryStore {
    fn list_collections(&self) -> Result<ExistingSchemaSnapshot> {
        self.check("list_collections")?;
        Ok(self.snapshot())
    }

    fn create_collection(&self, name: &str) -> Result<String> {
        self.record(StoreCall::CreateCollection {
            name: name.to_string(),
        });
        self.check(name)?;
        let id = {
            let mut next = self
                .next_id
                .write()
                .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
            let id = format!("col{}", *next);
            *next += 1;
            id
        };
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        collections.push(ExistingCollection {
            id: id.clone(),
            name: name.to_string(),
            attributes: Vec::new(),
        });
        Ok(id)
    }

    fn create_attribute(&self, collection_id: &str, attribute: &ResolvedAttribute) -> Result<()> {
        self.record(StoreCall::CreateAttribute {
            collection_id: collection_id.to_string(),
            attribute: attribute.clone(),
        });
        self.check(&attribute.key)?;
        self.with_collection(collection_id, |collection| {
            if collection.attribute(&attribute.key).is_some() {
                bail!("attribute already exists: {}", attribute.key);
            }
            collection.attributes.push(stored(attribute));
            Ok(())
        })
    }

    fn update_attribute(
        &self,
        collection_id: &str,
        attribute: &ResolvedAttribute,
        _existing: &ExistingAttribute,
    ) -> Result<()> {
        self.record(StoreCall::UpdateAttribute {
            collection_id: collection_id.to_string(),
            attribute: attribute.clone(),
        });
        self.check(&attribute.key)?;
        self.with_collection(collection_id, |collection| {
            let slot = collection
                .attributes
                .iter_mut()
                .find(|a| a.key == attribute.key)
                .ok_or_else(|| anyhow::anyhow!("attribute not found: {}", attribute.key))?;
            *slot = stored(attribute);
            Ok(())
        })
    }
}
