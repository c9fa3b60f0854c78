//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Documents live as JSON text in the `records` table, keyed by collection
//! and `_id`. String equality predicates are pushed down to SQLite with
//! `json_extract` to narrow the scan; every candidate row is then re-checked
//! with [`matches_filter`] so results are identical to the in-memory store.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use scope_qa_core::document::{apply_projection, id_key, matches_filter};
use scope_qa_core::models::{Document, Record};
use scope_qa_core::store::DocumentStore;

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts or replaces documents in one transaction.
    ///
    /// Every document must carry a string or numeric `_id`. Rows are keyed by
    /// [`id_key`], so `"1"` and `1` are distinct documents.
    pub async fn upsert_documents(&self, collection: &str, docs: &[Record]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for doc in docs {
            let Some(id) = doc.get("_id").and_then(id_key) else {
                bail!("document in '{}' has no usable _id", collection);
            };
            let body = serde_json::to_string(doc)?;

            sqlx::query(
                r#"
                INSERT INTO records (collection, id, body, loaded_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    body = excluded.body,
                    loaded_at = excluded.loaded_at
                "#,
            )
            .bind(collection)
            .bind(&id)
            .bind(&body)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(docs.len())
    }
}

fn parse_body(collection: &str, body: &str) -> Result<Record> {
    match serde_json::from_str::<Value>(body)
        .with_context(|| format!("corrupt document in '{}'", collection))?
    {
        Value::Object(map) => Ok(map),
        _ => bail!("non-object document in '{}'", collection),
    }
}

/// SQLite JSON path for a dotted field name, or `None` if it cannot be quoted.
fn json_path(key: &str) -> Option<String> {
    if key.is_empty() || key.contains('"') {
        return None;
    }
    let segments: Vec<String> = key.split('.').map(|s| format!("\"{}\"", s)).collect();
    Some(format!("$.{}", segments.join(".")))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn collection_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT collection FROM records ORDER BY collection")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get::<String, _>("collection")).collect())
    }

    async fn sample(&self, collection: &str) -> Result<Option<Record>> {
        let row = sqlx::query("SELECT body FROM records WHERE collection = ? ORDER BY rowid LIMIT 1")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let body: String = row.get("body");
                Ok(Some(parse_body(collection, &body)?))
            }
            None => Ok(None),
        }
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: &Document,
    ) -> Result<Vec<Record>> {
        let mut sql = String::from("SELECT body FROM records WHERE collection = ?");
        let mut pushed: Vec<(String, String)> = Vec::new();
        for (key, value) in filter {
            if let (Some(path), Value::String(s)) = (json_path(key), value) {
                // Arrays match on membership; leave those to matches_filter.
                sql.push_str(" AND (json_extract(body, ?) = ? OR json_type(body, ?) = 'array')");
                pushed.push((path, s.clone()));
            }
        }
        sql.push_str(" ORDER BY rowid");

        let mut query = sqlx::query(&sql).bind(collection);
        for (path, value) in &pushed {
            query = query.bind(path).bind(value).bind(path);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut out = Vec::new();
        for row in rows {
            let body: String = row.get("body");
            let doc = parse_body(collection, &body)?;
            if matches_filter(&doc, filter)? {
                out.push(apply_projection(&doc, projection)?);
            }
        }
        Ok(out)
    }
}
