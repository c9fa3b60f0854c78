//! Test doubles shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::generation::{GenerationParams, TextModel};
use crate::models::{Document, Record};
use crate::store::{DocumentStore, InMemoryStore};

/// A model that replays canned responses in order and records its prompts.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String>>>,
    pub calls: Mutex<Vec<(String, GenerationParams)>>,
}

impl ScriptedModel {
    pub fn new(responses: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &'static str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(anyhow!(message))])),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn prompt(&self, index: usize) -> String {
        self.calls.lock().unwrap()[index].0.clone()
    }

    pub fn params(&self, index: usize) -> GenerationParams {
        self.calls.lock().unwrap()[index].1
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), *params));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("scripted model exhausted")))
    }
}

/// Wraps an [`InMemoryStore`] and counts every read.
pub struct CountingStore {
    inner: InMemoryStore,
    reads: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn collection_names(&self) -> Result<Vec<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.collection_names().await
    }

    async fn sample(&self, collection: &str) -> Result<Option<Record>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.sample(collection).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: &Document,
    ) -> Result<Vec<Record>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find(collection, filter, projection).await
    }
}

/// A store whose every operation fails.
pub struct BrokenStore;

#[async_trait]
impl DocumentStore for BrokenStore {
    async fn collection_names(&self) -> Result<Vec<String>> {
        Err(anyhow!("connection refused"))
    }

    async fn sample(&self, _collection: &str) -> Result<Option<Record>> {
        Err(anyhow!("connection refused"))
    }

    async fn find(
        &self,
        _collection: &str,
        _filter: &Document,
        _projection: &Document,
    ) -> Result<Vec<Record>> {
        Err(anyhow!("connection refused"))
    }
}

pub fn obj(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
