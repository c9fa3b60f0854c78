//! Enrichment: internal reference ids → human-readable names.
//!
//! Each known foreign-key field is removed from the record and replaced by
//! the display name looked up in the referenced collection. Lookups carry the
//! same tenant predicate as the main query, so a reference to another
//! project's entity resolves to `null`. Unresolvable references become
//! `null` rather than errors.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::document::id_key;
use crate::error::{PipelineError, Result};
use crate::models::{Document, Record, TenantId};
use crate::scope::{tenant_predicate, ScopeRules};
use crate::store::DocumentStore;

/// A foreign-key field and where its display name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub source: &'static str,
    pub collection: &'static str,
    pub field: &'static str,
    pub destination: &'static str,
}

pub const REFERENCES: [Reference; 3] = [
    Reference {
        source: "kpi_id",
        collection: "kpis",
        field: "indicator",
        destination: "kpi_name",
    },
    Reference {
        source: "task_id",
        collection: "tasks",
        field: "title",
        destination: "task_name",
    },
    Reference {
        source: "project_id",
        collection: "projects",
        field: "name",
        destination: "project_name",
    },
];

/// Replaces every known reference field with its display name.
///
/// Lookups and tenant predicates are memoized for the duration of one call.
pub async fn resolve(
    store: &dyn DocumentStore,
    rules: &ScopeRules,
    tenant: &TenantId,
    records: Vec<Record>,
) -> Result<Vec<Record>> {
    let mut predicates: HashMap<&'static str, Option<Document>> = HashMap::new();
    let mut memo: HashMap<(&'static str, String), Value> = HashMap::new();
    let mut out = Vec::with_capacity(records.len());

    for mut record in records {
        for reference in &REFERENCES {
            let Some(id) = record.remove(reference.source) else {
                continue;
            };
            let name = match id_key(&id) {
                Some(key) => match memo.get(&(reference.collection, key.clone())) {
                    Some(cached) => cached.clone(),
                    None => {
                        let predicate = match predicates.get(reference.collection) {
                            Some(p) => p.clone(),
                            None => {
                                let p = scope_for(store, rules, reference.collection, tenant).await?;
                                predicates.insert(reference.collection, p.clone());
                                p
                            }
                        };
                        let name = match predicate {
                            Some(predicate) => lookup(store, reference, &id, predicate).await?,
                            None => Value::Null,
                        };
                        memo.insert((reference.collection, key), name.clone());
                        name
                    }
                },
                None => Value::Null,
            };
            record.insert(reference.destination.to_string(), name);
        }
        out.push(record);
    }
    Ok(out)
}

/// Tenant predicate for a lookup collection, or `None` if it cannot be scoped.
async fn scope_for(
    store: &dyn DocumentStore,
    rules: &ScopeRules,
    collection: &str,
    tenant: &TenantId,
) -> Result<Option<Document>> {
    match tenant_predicate(store, rules, collection, tenant).await {
        Ok(predicate) => Ok(Some(predicate)),
        Err(PipelineError::ScopeResolution { collection, reason }) => {
            debug!(%collection, %reason, "references left unresolved");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn lookup(
    store: &dyn DocumentStore,
    reference: &Reference,
    id: &Value,
    mut filter: Document,
) -> Result<Value> {
    // The tenant collection's predicate is itself on `_id`.
    if let Some(scoped_id) = filter.get("_id") {
        if scoped_id != id {
            return Ok(Value::Null);
        }
    }
    filter.insert("_id".to_string(), id.clone());
    let mut projection = Document::new();
    projection.insert(reference.field.to_string(), Value::from(1));

    let found = store
        .find(reference.collection, &filter, &projection)
        .await
        .map_err(PipelineError::store)?;
    Ok(found
        .first()
        .and_then(|doc| doc.get(reference.field))
        .cloned()
        .unwrap_or(Value::Null))
}
