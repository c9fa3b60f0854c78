//! The request state machine.
//!
//! ```text
//! Start ─▶ InputCheck ─▶ ShortcutCheck ─▶ Planning ─▶ Enforcing ─▶ Executing
//!              │               │                                      │
//!              ▼               ▼                                      ▼
//!        insufficient   greeting/thanks                          EmptyCheck ─▶ insufficient
//!                                                                     │
//!                       Respond ◀─ Summarizing ◀─ Resolving ◀─ Sanitizing
//! ```
//!
//! Every failure collapses into [`INSUFFICIENT_INFORMATION`]. The failure
//! class is logged and reported in [`ReplyKind::Insufficient`] for callers
//! that want to observe it, but the text never carries error detail or
//! partial results.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ErrorKind, PipelineError, Result};
use crate::execute::execute;
use crate::generation::{GenerationParams, TextModel};
use crate::history::{ConversationContext, MAX_TURNS};
use crate::models::{ConversationTurn, TenantId};
use crate::planner::{PlanRequest, Planner};
use crate::resolve::resolve;
use crate::sanitize::strip;
use crate::schema::SchemaCache;
use crate::scope::{enforce, ScopeRules};
use crate::shortcuts::{self, Shortcut};
use crate::store::DocumentStore;
use crate::summarize::Summarizer;

pub const INSUFFICIENT_INFORMATION: &str = "I don't have enough information to answer that.";

pub const DEFAULT_DOMAIN_DESCRIPTION: &str = "You are assisting with a KPI Dashboard system. \
Queries are scoped to a specific project by its ID. \
Always respond using names rather than internal IDs.";

/// Tunables for an [`Assistant`].
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub domain_description: String,
    pub planner_max_output_tokens: u32,
    pub summarizer: GenerationParams,
    pub history_turns: usize,
    pub schema_ttl: Duration,
    pub scope: ScopeRules,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            domain_description: DEFAULT_DOMAIN_DESCRIPTION.to_string(),
            planner_max_output_tokens: 1024,
            summarizer: GenerationParams {
                temperature: 0.7,
                max_output_tokens: 1024,
            },
            history_turns: MAX_TURNS,
            schema_ttl: Duration::from_secs(300),
            scope: ScopeRules::default(),
        }
    }
}

/// How a reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Greeting,
    Thanks,
    Answer,
    /// No answer: empty result, irrelevant question, or a failure of the given kind.
    Insufficient(Option<ErrorKind>),
}

/// The text returned to the caller plus how it came about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub kind: ReplyKind,
}

impl Reply {
    fn insufficient(kind: Option<ErrorKind>) -> Self {
        Self {
            text: INSUFFICIENT_INFORMATION.to_string(),
            kind: ReplyKind::Insufficient(kind),
        }
    }

    fn shortcut(shortcut: Shortcut) -> Self {
        let kind = match shortcut {
            Shortcut::Greeting => ReplyKind::Greeting,
            Shortcut::Thanks => ReplyKind::Thanks,
        };
        Self {
            text: shortcut.reply().to_string(),
            kind,
        }
    }
}

/// Answers questions about one tenant's records at a time.
///
/// Shared across requests behind an `Arc`; internal state (history, schema
/// cache) is synchronized and never locked across an `.await`.
pub struct Assistant {
    store: Arc<dyn DocumentStore>,
    model: Arc<dyn TextModel>,
    planner: Planner,
    summarizer: Summarizer,
    scope: ScopeRules,
    schema: SchemaCache,
    history: ConversationContext,
}

impl Assistant {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        model: Arc<dyn TextModel>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            store,
            model,
            planner: Planner::new(
                settings.domain_description.clone(),
                settings.planner_max_output_tokens,
            ),
            summarizer: Summarizer::new(settings.domain_description, settings.summarizer),
            scope: settings.scope,
            schema: SchemaCache::new(settings.schema_ttl),
            history: ConversationContext::new(settings.history_turns),
        }
    }

    pub fn history(&self) -> &ConversationContext {
        &self.history
    }

    /// Forces the next request to re-sample the store schema.
    pub fn invalidate_schema(&self) {
        self.schema.invalidate();
    }

    /// Handles one message for one project. Never fails.
    pub async fn respond(&self, project_id: Option<&str>, message: &str) -> Reply {
        let tenant = match validate_input(project_id, message) {
            Ok(tenant) => tenant,
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "rejected request");
                return Reply::insufficient(Some(e.kind()));
            }
        };
        let question = message.trim();

        if let Some(shortcut) = shortcuts::detect(question) {
            debug!(tenant = %tenant, ?shortcut, "shortcut reply");
            return Reply::shortcut(shortcut);
        }

        match self.answer(&tenant, question).await {
            Ok(Some(text)) => {
                self.history
                    .record(&tenant, ConversationTurn::new(question, text.clone()));
                Reply {
                    text,
                    kind: ReplyKind::Answer,
                }
            }
            Ok(None) => {
                debug!(tenant = %tenant, "no matching records");
                Reply::insufficient(None)
            }
            Err(e) => {
                warn!(kind = %e.kind(), tenant = %tenant, error = %e, "request failed");
                Reply::insufficient(Some(e.kind()))
            }
        }
    }

    /// Planning through summarizing. `Ok(None)` means nothing to answer from.
    async fn answer(&self, tenant: &TenantId, question: &str) -> Result<Option<String>> {
        let store = self.store.as_ref();
        let model = self.model.as_ref();

        let schema = self.schema.get(store).await?;
        let history = self.history.snapshot(tenant);
        let spec = self
            .planner
            .plan(
                model,
                PlanRequest {
                    question,
                    tenant,
                    schema: &schema,
                    history: &history,
                },
            )
            .await?;

        let scoped = enforce(store, &self.scope, spec, tenant).await?;
        let records = execute(store, &scoped).await?;
        if scoped.spec().is_empty() || records.is_empty() {
            return Ok(None);
        }

        let records = strip(records);
        let records = resolve(store, &self.scope, tenant, records).await?;
        let text = self.summarizer.summarize(model, question, &records).await?;
        Ok(Some(text))
    }
}

fn validate_input(project_id: Option<&str>, message: &str) -> Result<TenantId> {
    let project_id = project_id
        .ok_or_else(|| PipelineError::Input("project id is required".into()))?;
    let tenant = TenantId::parse(project_id)?;
    if message.trim().is_empty() {
        return Err(PipelineError::Input("message must not be empty".into()));
    }
    Ok(tenant)
}
