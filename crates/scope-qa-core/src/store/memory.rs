//! In-memory [`DocumentStore`] implementation for tests and embedding.
//!
//! Collections are kept in insertion order behind a `std::sync::RwLock`.
//! `sample` returns the first document inserted into a collection.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::document::{apply_projection, matches_filter};
use crate::models::{Document, Record};

use super::DocumentStore;

/// In-memory document store.
pub struct InMemoryStore {
    collections: RwLock<BTreeMap<String, Vec<Record>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
        }
    }

    /// Appends a document to a collection, creating the collection if needed.
    ///
    /// Non-object values are rejected.
    pub fn insert(&self, collection: &str, doc: Value) -> Result<()> {
        let Value::Object(record) = doc else {
            return Err(anyhow!("documents must be JSON objects"));
        };
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    /// Builder-style variant of [`insert`](Self::insert) for test fixtures.
    pub fn with(self, collection: &str, docs: impl IntoIterator<Item = Value>) -> Self {
        for doc in docs {
            if let Err(e) = self.insert(collection, doc) {
                panic!("invalid fixture for '{}': {}", collection, e);
            }
        }
        self
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn collection_names(&self) -> Result<Vec<String>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(collections
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn sample(&self, collection: &str) -> Result<Option<Record>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.first())
            .cloned())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: &Document,
    ) -> Result<Vec<Record>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for doc in docs {
            if matches_filter(doc, filter)? {
                out.push(apply_projection(doc, projection)?);
            }
        }
        Ok(out)
    }
}
