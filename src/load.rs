//! Bulk loading of JSON documents into a collection.
//!
//! Accepts either a JSON array of objects or a single object. Documents
//! without an `_id` are assigned a UUID v4; documents whose `_id` already
//! exists in the collection replace the stored copy.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use scope_qa_core::models::Record;

use crate::app::open_store;
use crate::config::Config;

/// Parse file contents into documents, assigning missing `_id`s.
pub fn parse_documents(content: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(content).context("Invalid JSON")?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => bail!("Expected a JSON object or an array of objects"),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(mut doc) => {
                let missing = match doc.get("_id") {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.is_empty(),
                    Some(_) => false,
                };
                if missing {
                    doc.insert(
                        "_id".to_string(),
                        Value::String(uuid::Uuid::new_v4().to_string()),
                    );
                }
                Ok(doc)
            }
            _ => bail!("Element {} is not a JSON object", i),
        })
        .collect()
}

/// Load `path` into `collection`, returning the number of documents written.
pub async fn run_load(config: &Config, collection: &str, path: &Path) -> Result<usize> {
    if collection.trim().is_empty() {
        bail!("collection name must not be empty");
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let docs = parse_documents(&content).with_context(|| format!("In {}", path.display()))?;

    let store = open_store(config).await?;
    let written = store.upsert_documents(collection, &docs).await?;
    store.pool().close().await;

    info!(collection, documents = written, "load complete");
    println!("Loaded {} documents into '{}'.", written, collection);
    Ok(written)
}
