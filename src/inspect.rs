//! `scopeqa schema`: print the schema catalog the planner sees.

use anyhow::Result;

use scope_qa_core::schema::{describe, render};

use crate::app::open_store;
use crate::config::Config;

pub async fn run_schema(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let schema = describe(&store).await?;
    store.pool().close().await;

    if schema.is_empty() {
        println!("No collections loaded.");
    } else {
        println!("{}", render(&schema));
    }
    Ok(())
}
