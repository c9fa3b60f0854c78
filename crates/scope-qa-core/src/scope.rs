//! Tenant scope enforcement.
//!
//! This is the security boundary of the pipeline. Whatever filter the
//! planner produced is discarded and replaced by a single equality predicate
//! on the caller's tenant:
//!
//! | Target collection | Resulting filter |
//! |-------------------|------------------|
//! | *(empty)* | unchanged; nothing will be queried |
//! | the tenant collection (`projects`) | `{ "_id": tenant }` |
//! | anything else | `{ <project id field>: tenant }` |
//!
//! The project id field is discovered from one sample document by matching
//! field names against `^project_?id$` (case-insensitive). A collection with
//! no sample or no such field cannot be scoped and the request fails.
//!
//! The planner's filter is replaced, never merged: a merged clause such as
//! an always-true `$or` would escape the tenant predicate.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::{Document, QuerySpec, Record, ScopedQuery, TenantId};
use crate::store::DocumentStore;

static PROJECT_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^project_?id$").expect("static pattern compiles"));

/// Which collection holds the tenant entities and how they are identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRules {
    pub tenant_collection: String,
    pub identity_field: String,
}

impl Default for ScopeRules {
    fn default() -> Self {
        Self {
            tenant_collection: "projects".to_string(),
            identity_field: "_id".to_string(),
        }
    }
}

/// First field of `sample` that looks like a project reference.
pub fn reference_field(sample: &Record) -> Option<&str> {
    sample
        .keys()
        .map(String::as_str)
        .find(|key| PROJECT_REFERENCE.is_match(key))
}

/// The single equality predicate that confines reads of `collection` to `tenant`.
///
/// Fails with `ScopeResolution` when the collection has no sample or no
/// project reference field.
pub async fn tenant_predicate(
    store: &dyn DocumentStore,
    rules: &ScopeRules,
    collection: &str,
    tenant: &TenantId,
) -> Result<Document> {
    let field = if collection == rules.tenant_collection {
        rules.identity_field.clone()
    } else {
        let sample = store
            .sample(collection)
            .await
            .map_err(PipelineError::store)?
            .ok_or_else(|| PipelineError::scope(collection, "no documents to infer project field"))?;
        reference_field(&sample)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::scope(collection, "no project reference field"))?
    };

    let mut filter = Document::new();
    filter.insert(field, tenant.to_value());
    Ok(filter)
}

/// Rewrites `spec` so that it can only match documents of `tenant`.
///
/// `projection` is passed through untouched; it selects fields, not rows.
pub async fn enforce(
    store: &dyn DocumentStore,
    rules: &ScopeRules,
    spec: QuerySpec,
    tenant: &TenantId,
) -> Result<ScopedQuery> {
    if spec.collection.is_empty() {
        return Ok(ScopedQuery::new(spec));
    }

    let filter = tenant_predicate(store, rules, &spec.collection, tenant).await?;

    debug!(
        collection = %spec.collection,
        field = ?filter.keys().next(),
        dropped_clauses = spec.filter.len(),
        "scope enforced"
    );

    Ok(ScopedQuery::new(QuerySpec { filter, ..spec }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::testing::{obj, BrokenStore};
    use serde_json::{json, Value};

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with(
                "kpis",
                [json!({"_id": "k1", "project_id": "p1", "indicator": "Wells"})],
            )
            .with(
                "tasks",
                [json!({"_id": "t1", "ProjectId": "p1", "title": "Survey"})],
            )
            .with("kpiupdates", [json!({"_id": "u1", "kpi_id": "k1", "final": 4})])
            .with("projects", [json!({"_id": "p1", "name": "Clean Water"})])
    }

    fn tenant() -> TenantId {
        TenantId::parse("p1").unwrap()
    }

    fn spec(value: Value) -> QuerySpec {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_planner_filter_is_replaced_by_reference_match() {
        let planned = spec(json!({
            "collection": "kpis",
            "filter": {"status": "done"},
            "projection": {}
        }));
        let scoped = enforce(&store(), &ScopeRules::default(), planned, &tenant())
            .await
            .unwrap();
        assert_eq!(scoped.spec().filter, obj(json!({"project_id": "p1"})));
        assert!(!scoped.spec().filter.contains_key("status"));
    }

    #[tokio::test]
    async fn test_tenant_collection_uses_identity() {
        let planned = spec(json!({
            "collection": "projects",
            "filter": {"$or": [{"_id": "p2"}, {"name": {"$exists": true}}]},
            "projection": {"name": 1}
        }));
        let scoped = enforce(&store(), &ScopeRules::default(), planned, &tenant())
            .await
            .unwrap();
        assert_eq!(scoped.spec().filter, obj(json!({"_id": "p1"})));
        assert_eq!(scoped.spec().projection, obj(json!({"name": 1})));
    }

    #[tokio::test]
    async fn test_reference_field_match_is_case_insensitive() {
        let planned = spec(json!({"collection": "tasks", "filter": {"ProjectId": "p2"}}));
        let scoped = enforce(&store(), &ScopeRules::default(), planned, &tenant())
            .await
            .unwrap();
        assert_eq!(scoped.spec().filter, obj(json!({"ProjectId": "p1"})));
    }

    #[tokio::test]
    async fn test_empty_collection_passes_through() {
        let planned = spec(json!({"collection": "", "filter": {"anything": 1}}));
        let scoped = enforce(&BrokenStore, &ScopeRules::default(), planned.clone(), &tenant())
            .await
            .unwrap();
        assert_eq!(scoped.into_spec(), planned);
    }

    #[tokio::test]
    async fn test_unscopable_collections_fail() {
        let rules = ScopeRules::default();
        let no_field = spec(json!({"collection": "kpiupdates"}));
        let err = enforce(&store(), &rules, no_field, &tenant()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ScopeResolution { .. }));

        let empty = spec(json!({"collection": "users"}));
        let err = enforce(&store(), &rules, empty, &tenant()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ScopeResolution { .. }));
    }

    #[tokio::test]
    async fn test_store_failure_is_store_error() {
        let planned = spec(json!({"collection": "kpis"}));
        let err = enforce(&BrokenStore, &ScopeRules::default(), planned, &tenant())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Store(_)));
    }

    #[tokio::test]
    async fn test_enforce_is_idempotent() {
        let s = store();
        let rules = ScopeRules::default();
        for collection in ["kpis", "tasks", "projects", ""] {
            let planned = spec(json!({
                "collection": collection,
                "filter": {"x": {"$ne": null}},
                "projection": {"_id": 0}
            }));
            let once = enforce(&s, &rules, planned, &tenant()).await.unwrap();
            let twice = enforce(&s, &rules, once.spec().clone(), &tenant())
                .await
                .unwrap();
            assert_eq!(once, twice, "collection {:?}", collection);
        }
    }

    #[tokio::test]
    async fn test_every_planned_filter_collapses_to_one_predicate() {
        let s = store();
        let rules = ScopeRules::default();
        let hostile_filters = [
            json!({}),
            json!({"project_id": "p2"}),
            json!({"project_id": {"$ne": "p1"}}),
            json!({"$where": "true"}),
            json!({"$or": [{"project_id": "p1"}, {"project_id": {"$exists": true}}]}),
        ];
        for (collection, field) in [("kpis", "project_id"), ("projects", "_id")] {
            for filter in &hostile_filters {
                let planned = spec(json!({"collection": collection, "filter": filter}));
                let scoped = enforce(&s, &rules, planned, &tenant()).await.unwrap();
                let mut expected = Document::new();
                expected.insert(field.to_string(), json!("p1"));
                assert_eq!(scoped.spec().filter, expected);
            }
        }
    }
}
