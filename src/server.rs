//! HTTP server for the chat client.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/message` | Answer one message for one project |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response Contract
//!
//! `POST /api/message` always answers `200 OK` with `{ "response": "..." }`.
//! Malformed or oversized bodies (over `[server].max_body_bytes`), unknown
//! projects and pipeline failures all produce the insufficient-information
//! reply; failure details only go to the log.
//!
//! ```json
//! // request
//! { "project_id": "64f0c0ffee", "message": "How many wells were dug?" }
//! // response
//! { "response": "The Clean Water project has dug 12 wells so far." }
//! ```
//!
//! # CORS
//!
//! Origins listed in `[server].cors_origins` are allowed; an empty list
//! allows any origin.

use anyhow::Context;
use axum::{
    body::Body,
    extract::State,
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};

use scope_qa_core::{Assistant, TextModel};

use crate::app::{build_assistant, build_assistant_with_model};
use crate::config::Config;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
    max_body_bytes: usize,
}

/// Starts the HTTP server with the configured model provider.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let assistant = build_assistant(config).await?;
    serve(config, assistant).await
}

/// Starts the HTTP server with a caller-supplied model.
///
/// Used by tests and by binaries embedding their own [`TextModel`].
pub async fn run_server_with_model(
    config: &Config,
    model: Arc<dyn TextModel>,
) -> anyhow::Result<()> {
    let assistant = build_assistant_with_model(config, model).await?;
    serve(config, assistant).await
}

async fn serve(config: &Config, assistant: Assistant) -> anyhow::Result<()> {
    let state = AppState {
        assistant: Arc::new(assistant),
        max_body_bytes: config.server.max_body_bytes,
    };

    let app = Router::new()
        .route("/api/message", post(handle_message))
        .route("/health", get(handle_health))
        .layer(cors_layer(&config.server.cors_origins)?)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let values = origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/message ============

/// Request fields, extracted leniently: wrong types read as absent.
#[derive(Debug, Default, PartialEq)]
struct MessageRequest {
    project_id: Option<String>,
    message: String,
}

impl MessageRequest {
    fn parse(body: &[u8]) -> Self {
        let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            project_id: field("project_id"),
            message: field("message").unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct MessageResponse {
    response: String,
}

/// Reads `body` if it fits in `limit` bytes. Larger bodies are drained and discarded.
async fn read_capped(body: Body, limit: usize) -> Option<Vec<u8>> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    let mut oversized = false;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.ok()?;
        if oversized {
            continue;
        }
        if buf.len() + chunk.len() > limit {
            oversized = true;
            buf = Vec::new();
            continue;
        }
        buf.extend_from_slice(&chunk);
    }
    (!oversized).then_some(buf)
}

async fn handle_message(State(state): State<AppState>, body: Body) -> Json<MessageResponse> {
    let request = match read_capped(body, state.max_body_bytes).await {
        Some(bytes) => MessageRequest::parse(&bytes),
        None => {
            warn!(limit = state.max_body_bytes, "message body unreadable or too large");
            MessageRequest::default()
        }
    };
    let reply = state
        .assistant
        .respond(request.project_id.as_deref(), &request.message)
        .await;
    debug!(kind = ?reply.kind, "message answered");
    Json(MessageResponse {
        response: reply.text,
    })
}
