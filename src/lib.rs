//! # scope-qa
//!
//! Tenant-scoped natural-language question answering over a shared document
//! store.
//!
//! A chat client sends `{ project_id, message }`; the assistant plans a query
//! with a language model, rewrites it so it can only read that project's
//! records, executes it, strips sensitive fields, resolves references to
//! names, and phrases the result. The pipeline itself lives in the
//! [`scope_qa_core`] crate; this crate supplies the SQLite store, the model
//! providers, the CLI, and the HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │   HTTP   │──▶│  Assistant   │──▶│   SQLite     │
//! │ /api/msg │   │ (core crate) │   │  records     │
//! └──────────┘   └──────┬───────┘   └──────────────┘
//!                       │
//!                       ▼
//!               ┌───────────────┐
//!               │ Gemini/OpenAI │
//!               └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scopeqa init                          # create database
//! scopeqa load projects projects.json   # load documents
//! scopeqa schema                        # inspect what the planner sees
//! scopeqa ask --project p1 "How many KPIs are there?"
//! scopeqa serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`generation`] | Model providers |
//! | [`app`] | Assistant wiring |
//! | [`load`] | JSON document loading |
//! | [`inspect`] | Schema catalog printing |
//! | [`ask`] | One-shot questions |
//! | [`server`] | HTTP server |

pub mod app;
pub mod ask;
pub mod config;
pub mod db;
pub mod generation;
pub mod inspect;
pub mod load;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
