//! # scope-qa core
//!
//! The retrieval and scope-enforcement pipeline behind scope-qa: a planner
//! turns a natural-language question into an untrusted [`models::QuerySpec`],
//! the enforcer rewrites it so it can only touch the caller's tenant, and the
//! result is executed, sanitized, enriched, and summarized.
//!
//! ```text
//! question ─▶ planner ─▶ scope ─▶ execute ─▶ sanitize ─▶ resolve ─▶ summarize
//!                 ▲          │                               │
//!              schema        └──────── DocumentStore ◀───────┘
//! ```
//!
//! This crate owns no I/O of its own. Storage is reached through the
//! [`store::DocumentStore`] trait and generation through the
//! [`generation::TextModel`] trait; concrete backends (SQLite, Gemini,
//! OpenAI) live in the `scope-qa` app crate.

pub mod assistant;
pub mod document;
pub mod error;
pub mod execute;
pub mod generation;
pub mod history;
pub mod models;
pub mod planner;
pub mod resolve;
pub mod sanitize;
pub mod schema;
pub mod scope;
pub mod shortcuts;
pub mod store;
pub mod summarize;

#[cfg(test)]
pub(crate) mod testing;

pub use assistant::{Assistant, AssistantSettings, Reply, ReplyKind};
pub use error::{ErrorKind, PipelineError};
pub use generation::{GenerationParams, TextModel};
pub use models::{ConversationTurn, Document, QuerySpec, Record, Schema, ScopedQuery, TenantId};
pub use store::DocumentStore;
