//! `scopeqa ask`: answer a single message from the command line.

use anyhow::Result;
use tracing::info;

use crate::app::build_assistant;
use crate::config::Config;

pub async fn run_ask(config: &Config, project: &str, message: &str) -> Result<()> {
    let assistant = build_assistant(config).await?;
    let reply = assistant.respond(Some(project), message).await;
    info!(kind = ?reply.kind, "ask complete");
    println!("{}", reply.text);
    Ok(())
}
