//! # scope-qa CLI (`scopeqa`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scopeqa init` | Create the SQLite database and run schema migrations |
//! | `scopeqa load <collection> <file>` | Load a JSON file of documents into a collection |
//! | `scopeqa schema` | Print the collection/field catalog |
//! | `scopeqa ask --project <id> "<message>"` | Answer one message |
//! | `scopeqa serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! scopeqa init --config ./config/scopeqa.toml
//! scopeqa load kpis ./data/kpis.json --config ./config/scopeqa.toml
//! RUST_LOG=debug scopeqa ask --project 64f0c0ffee "Show KPI progress"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use scope_qa::{ask, config, inspect, load, migrate, server};

/// scope-qa CLI: tenant-scoped question answering over a document store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scopeqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "scopeqa",
    about = "scope-qa: tenant-scoped natural-language question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scopeqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Load documents from a JSON file into a collection.
    ///
    /// The file holds a JSON array of objects or a single object. Documents
    /// with an existing `_id` replace the stored copy.
    Load {
        /// Target collection (e.g. `projects`, `kpis`).
        collection: String,
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Print the schema catalog (collection → sampled field names).
    Schema,

    /// Answer a single message for a project and print the reply.
    Ask {
        /// Project identifier the question is scoped to.
        #[arg(long)]
        project: String,
        /// The question.
        message: String,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load { collection, file } => {
            load::run_load(&cfg, &collection, &file).await?;
        }
        Commands::Schema => {
            inspect::run_schema(&cfg).await?;
        }
        Commands::Ask { project, message } => {
            ask::run_ask(&cfg, &project, &message).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
