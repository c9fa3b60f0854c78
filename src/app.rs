//! Wiring: configuration → store + model → [`Assistant`].

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use scope_qa_core::{Assistant, TextModel};

use crate::config::Config;
use crate::db;
use crate::generation::create_model;
use crate::sqlite_store::SqliteDocumentStore;

/// Open the configured SQLite store as a [`SqliteDocumentStore`].
pub async fn open_store(config: &Config) -> Result<SqliteDocumentStore> {
    let pool = db::connect(config).await?;
    Ok(SqliteDocumentStore::new(pool))
}

/// Build an assistant over the configured store with the configured provider.
pub async fn build_assistant(config: &Config) -> Result<Assistant> {
    let model = create_model(&config.model)?;
    build_assistant_with_model(config, model).await
}

/// Build an assistant over the configured store with a caller-supplied model.
pub async fn build_assistant_with_model(
    config: &Config,
    model: Arc<dyn TextModel>,
) -> Result<Assistant> {
    let store = open_store(config).await?;
    debug!(model = model.model_name(), db = %config.db.path.display(), "assistant ready");
    Ok(Assistant::new(
        Arc::new(store),
        model,
        config.assistant_settings(),
    ))
}
