//! Appwrite REST implementation of [`SchemaStore`].
//!
//! Uses the blocking `reqwest` client; every call is a single request with
//! the configured timeout and no retry.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list | `GET /databases/{db}/collections` (paged, attributes inline) |
//! | create collection | `POST /databases/{db}/collections` |
//! | create attribute | `POST /databases/{db}/collections/{id}/attributes/{kind}` |
//! | update attribute | `PATCH /databases/{db}/collections/{id}/attributes/{kind}/{key}` |

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::catalog::{AttributeKind, Constraint};
use crate::config::StoreCredentials;
use crate::models::{
    Constraints, ExistingAttribute, ExistingCollection, ExistingSchemaSnapshot, Literal,
    ResolvedAttribute,
};
use crate::store::SchemaStore;

const PAGE_SIZE: u64 = 100;

pub struct AppwriteStore {
    client: Client,
    endpoint: String,
    project_id: String,
    api_key: String,
    database_id: String,
}

impl AppwriteStore {
    pub fn new(credentials: &StoreCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(credentials.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: credentials.endpoint.trim_end_matches('/').to_string(),
            project_id: credentials.project_id.clone(),
            api_key: credentials.api_key.clone(),
            database_id: credentials.database_id.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/databases/{}/{}", self.endpoint, self.database_id, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Key", &self.api_key)
            .header("Content-Type", "application/json")
    }

    fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = self.authed(request).send()?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().unwrap_or_default();
            bail!("Appwrite API error {}: {}", status, body_text);
        }
        Ok(response.json()?)
    }
}

impl SchemaStore for AppwriteStore {
    fn list_collections(&self) -> Result<ExistingSchemaSnapshot> {
        let mut pages = Vec::new();
        let mut offset = 0u64;
        loop {
            let limit = json!({"method": "limit", "values": [PAGE_SIZE]}).to_string();
            let skip = json!({"method": "offset", "values": [offset]}).to_string();
            let request = self
                .client
                .get(self.url("collections"))
                .query(&[("queries[]", limit), ("queries[]", skip)]);
            let page = self.send(request)?;
            let total = page.get("total").and_then(Value::as_u64).unwrap_or(0);
            let fetched = page
                .get("collections")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0) as u64;
            pages.push(page);
            offset += fetched;
            if fetched == 0 || offset >= total {
                break;
            }
        }

        let mut snapshot = ExistingSchemaSnapshot::default();
        for page in &pages {
            snapshot.collections.extend(parse_snapshot(page)?.collections);
        }
        tracing::debug!(collections = snapshot.collections.len(), "fetched snapshot");
        Ok(snapshot)
    }

    fn create_collection(&self, name: &str) -> Result<String> {
        let body = json!({
            "collectionId": Uuid::new_v4().simple().to_string(),
            "name": name,
            "permissions": [],
            "documentSecurity": false,
        });
        let created = self.send(self.client.post(self.url("collections")).json(&body))?;
        created
            .get("$id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Appwrite response: missing $id"))
    }

    fn create_attribute(&self, collection_id: &str, attribute: &ResolvedAttribute) -> Result<()> {
        let spec = attribute.kind.spec();
        let path = format!("collections/{}/attributes/{}", collection_id, spec.route);
        let body = Value::Object((spec.create_payload)(attribute));
        self.send(self.client.post(self.url(&path)).json(&body))?;
        Ok(())
    }

    fn update_attribute(
        &self,
        collection_id: &str,
        attribute: &ResolvedAttribute,
        _existing: &ExistingAttribute,
    ) -> Result<()> {
        let spec = attribute.kind.spec();
        let path = format!(
            "collections/{}/attributes/{}",
            collection_id,
            (spec.update_path)(&attribute.key)
        );
        let body = Value::Object((spec.update_payload)(attribute));
        self.send(self.client.patch(self.url(&path)).json(&body))?;
        Ok(())
    }
}

/// Parses a collection list response (or a bare array of collections).
///
/// Collections or attributes missing their identifying fields are dropped
/// with a warning; a document without any collection list is an error.
pub fn parse_snapshot(json: &Value) -> Result<ExistingSchemaSnapshot> {
    let items = json
        .get("collections")
        .and_then(Value::as_array)
        .or_else(|| json.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid snapshot: missing collections array"))?;

    let mut snapshot = ExistingSchemaSnapshot::default();
    for item in items {
        let id = item.get("$id").and_then(Value::as_str);
        let name = item.get("name").and_then(Value::as_str);
        let (Some(id), Some(name)) = (id, name) else {
            tracing::warn!("skipping remote collection without $id or name");
            continue;
        };
        let attributes = item
            .get("attributes")
            .and_then(Value::as_array)
            .map(|attrs| {
                attrs
                    .iter()
                    .filter_map(|a| {
                        let parsed = parse_attribute(a);
                        if parsed.is_none() {
                            tracing::warn!(collection = name, "skipping remote attribute without key");
                        }
                        parsed
                    })
                    .collect()
            })
            .unwrap_or_default();
        snapshot.collections.push(ExistingCollection {
            id: id.to_string(),
            name: name.to_string(),
            attributes,
        });
    }
    Ok(snapshot)
}

fn parse_attribute(json: &Value) -> Option<ExistingAttribute> {
    let key = json.get("key")?.as_str()?.to_string();
    let remote_type = json
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let format = json.get("format").and_then(Value::as_str);

    let mut constraints = Constraints::new();
    for c in Constraint::ALL {
        if let Some(value) = json.get(c.as_str()).and_then(Literal::from_json) {
            if !value.is_null() {
                constraints.insert(c, value);
            }
        }
    }

    Some(ExistingAttribute {
        key,
        kind: AttributeKind::from_remote(&remote_type, format),
        remote_type,
        required: json.get("required").and_then(Value::as_bool).unwrap_or(false),
        default: json
            .get("default")
            .and_then(Literal::from_json)
            .filter(|d| !d.is_null()),
        constraints,
    })
}

/// Reads a snapshot saved from the collection list endpoint.
pub fn load_snapshot_file(path: &Path) -> Result<ExistingSchemaSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;
    let json: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot file: {}", path.display()))?;
    parse_snapshot(&json)
}
