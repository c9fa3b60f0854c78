//! Schema discovery for the planner prompt.
//!
//! [`describe`] samples one document per collection and records its field
//! names. The result is a hint for the planner only: it can be stale or
//! incomplete and is never consulted for scope enforcement.
//!
//! [`SchemaCache`] keeps the last description for a configurable TTL so that
//! every request does not cost one read per collection.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::Schema;
use crate::store::DocumentStore;

/// Builds the field catalog: one sample read per collection.
pub async fn describe(store: &dyn DocumentStore) -> Result<Schema> {
    let names = store
        .collection_names()
        .await
        .map_err(PipelineError::store)?;

    let mut schema = Schema::new();
    for name in names {
        let fields = store
            .sample(&name)
            .await
            .map_err(PipelineError::store)?
            .map(|doc| doc.keys().cloned().collect())
            .unwrap_or_default();
        schema.insert(name, fields);
    }
    Ok(schema)
}

/// Renders the catalog as prompt lines: `- kpis: ["_id", "indicator"]`.
pub fn render(schema: &Schema) -> String {
    schema
        .iter()
        .map(|(name, fields)| format!("- {}: {:?}", name, fields))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Best-effort cache over [`describe`] with a time-to-live.
///
/// A TTL of zero disables caching. Concurrent misses may each describe the
/// store; the last writer wins.
pub struct SchemaCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, Schema)>>,
}

impl SchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Returns the cached schema if fresh, otherwise re-describes the store.
    pub async fn get(&self, store: &dyn DocumentStore) -> Result<Schema> {
        if let Some(schema) = self.fresh() {
            return Ok(schema);
        }
        let schema = describe(store).await?;
        debug!(collections = schema.len(), "schema refreshed");
        if !self.ttl.is_zero() {
            if let Ok(mut entry) = self.entry.lock() {
                *entry = Some((Instant::now(), schema.clone()));
            }
        }
        Ok(schema)
    }

    /// Drops the cached schema; the next [`get`](Self::get) re-describes.
    pub fn invalidate(&self) {
        if let Ok(mut entry) = self.entry.lock() {
            *entry = None;
        }
    }

    fn fresh(&self) -> Option<Schema> {
        let entry = self.entry.lock().ok()?;
        match entry.as_ref() {
            Some((at, schema)) if at.elapsed() < self.ttl => Some(schema.clone()),
            _ => None,
        }
    }
}
