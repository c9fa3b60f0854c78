//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is the only way the pipeline reads data. It
//! mirrors the three operations a document database offers for schema-less
//! discovery and retrieval:
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`collection_names`](DocumentStore::collection_names) | Enumerate collections |
//! | [`sample`](DocumentStore::sample) | One arbitrary document from a collection |
//! | [`find`](DocumentStore::find) | Filtered, projected read |
//!
//! Implementations must apply the filter and projection semantics of
//! [`crate::document`] so that every backend answers identically.
//! All methods are read-only; the pipeline never writes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, Record};

pub use memory::InMemoryStore;

/// Read-only access to a multi-tenant document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of all collections that currently hold documents.
    async fn collection_names(&self) -> Result<Vec<String>>;

    /// One arbitrary document from `collection`, or `None` if it is empty.
    async fn sample(&self, collection: &str) -> Result<Option<Record>>;

    /// All documents in `collection` matching `filter`, shaped by `projection`.
    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: &Document,
    ) -> Result<Vec<Record>>;
}
