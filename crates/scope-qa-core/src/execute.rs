//! Query execution.

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::{Record, ScopedQuery};
use crate::store::DocumentStore;

/// Runs an enforced query: one filtered, projected read.
///
/// An empty collection yields no records without touching the store.
/// No retries and no pagination limit.
pub async fn execute(store: &dyn DocumentStore, query: &ScopedQuery) -> Result<Vec<Record>> {
    let spec = query.spec();
    if spec.is_empty() {
        return Ok(Vec::new());
    }
    let records = store
        .find(&spec.collection, &spec.filter, &spec.projection)
        .await
        .map_err(PipelineError::store)?;
    debug!(collection = %spec.collection, count = records.len(), "query executed");
    Ok(records)
}
