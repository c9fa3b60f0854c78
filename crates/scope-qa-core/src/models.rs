//! Core data types that flow through the pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};

/// A JSON object: filters, projections, and stored documents.
pub type Document = serde_json::Map<String, Value>;

/// A document returned by query execution.
pub type Record = Document;

/// Collection name → field names of one sampled document.
///
/// A heuristic catalog for the planner, never authoritative for enforcement.
pub type Schema = BTreeMap<String, Vec<String>>;

const MAX_TENANT_ID_LEN: usize = 128;

/// Identifier of the tenant ("project") a request is scoped to.
///
/// Only [`TenantId::parse`] constructs one, so every value in the pipeline
/// has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Validates a caller-supplied tenant id.
    ///
    /// Accepts 1–128 ASCII alphanumerics, `-` or `_` after trimming.
    pub fn parse(raw: &str) -> Result<Self> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(PipelineError::Input("project id must not be empty".into()));
        }
        if id.len() > MAX_TENANT_ID_LEN {
            return Err(PipelineError::Input(format!(
                "project id longer than {} characters",
                MAX_TENANT_ID_LEN
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(PipelineError::Input(
                "project id contains invalid characters".into(),
            ));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as it appears in an equality predicate.
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `find()` query as produced by the planner.
///
/// Untrusted until it has been through [`scope::enforce`](crate::scope::enforce).
/// An empty `collection` means "no relevant data".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub filter: Document,
    #[serde(default)]
    pub projection: Document,
}

impl QuerySpec {
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }
}

/// A [`QuerySpec`] whose filter has been replaced by the tenant predicate.
///
/// Constructed only by the scope enforcer; the executor accepts nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedQuery(QuerySpec);

impl ScopedQuery {
    pub(crate) fn new(spec: QuerySpec) -> Self {
        Self(spec)
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.0
    }

    pub fn into_spec(self) -> QuerySpec {
        self.0
    }
}

/// One answered question, fed back to the planner as history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_id_trims() {
        let id = TenantId::parse("  64f0c2a1b2c3d4e5f6a7b8c9 ").unwrap();
        assert_eq!(id.as_str(), "64f0c2a1b2c3d4e5f6a7b8c9");
        assert_eq!(id.to_value(), json!("64f0c2a1b2c3d4e5f6a7b8c9"));
    }

    #[test]
    fn test_tenant_id_rejects_empty_and_free_text() {
        assert!(TenantId::parse("").is_err());
        assert!(TenantId::parse("   ").is_err());
        assert!(TenantId::parse("abc\" || true").is_err());
        assert!(TenantId::parse("{\"$ne\": null}").is_err());
        assert!(TenantId::parse(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_query_spec_defaults_missing_keys() {
        let spec: QuerySpec = serde_json::from_value(json!({"collection": "kpis"})).unwrap();
        assert_eq!(spec.collection, "kpis");
        assert!(spec.filter.is_empty());
        assert!(spec.projection.is_empty());
    }

    #[test]
    fn test_query_spec_rejects_non_object_filter() {
        let parsed: std::result::Result<QuerySpec, _> =
            serde_json::from_value(json!({"collection": "kpis", "filter": "all"}));
        assert!(parsed.is_err());
    }
}
