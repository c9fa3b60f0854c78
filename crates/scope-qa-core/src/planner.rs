//! Query planning: question → untrusted [`QuerySpec`].
//!
//! The planner prompts the model with the domain description, recent
//! history, the schema catalog, and the question, then extracts the JSON
//! object from the free-text reply. Models wrap JSON in prose or code fences,
//! so extraction scans for balanced `{…}` spans (string-literal aware) and
//! insists on exactly one decodable object.
//!
//! The returned spec is **untrusted**: it may name unknown collections, omit
//! scoping, or carry arbitrary filter clauses. Only
//! [`scope::enforce`](crate::scope::enforce) makes it safe to execute.

use serde_json::Value;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::generation::{GenerationParams, TextModel};
use crate::history;
use crate::models::{ConversationTurn, QuerySpec, Schema, TenantId};
use crate::schema;

/// Everything the planner needs to know about one request.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub question: &'a str,
    pub tenant: &'a TenantId,
    pub schema: &'a Schema,
    pub history: &'a [ConversationTurn],
}

/// Prompts a model for a `find()` spec.
#[derive(Debug, Clone)]
pub struct Planner {
    pub domain_description: String,
    pub max_output_tokens: u32,
}

impl Planner {
    pub fn new(domain_description: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            domain_description: domain_description.into(),
            max_output_tokens,
        }
    }

    /// Asks the model for a query spec. Parse failures are not retried.
    pub async fn plan(&self, model: &dyn TextModel, req: PlanRequest<'_>) -> Result<QuerySpec> {
        let prompt = self.build_prompt(req);
        let params = GenerationParams::deterministic(self.max_output_tokens);
        let raw = model
            .generate(&prompt, &params)
            .await
            .map_err(PipelineError::model)?;
        let spec = parse_query_spec(&raw)?;
        debug!(collection = %spec.collection, "query planned");
        Ok(spec)
    }

    pub fn build_prompt(&self, req: PlanRequest<'_>) -> String {
        format!(
            r#"You output only a JSON spec for a MongoDB find() query.

PROJECT DESCRIPTION:
{description}

HISTORY:
{history}

AVAILABLE SCHEMA:
{schema}

QUESTION:
{question}

CONSTRAINTS:
- Always scope to project ID: {tenant}
- Use only listed collections/fields
- No extra text, only JSON with 'collection', 'filter', 'projection'

If no relevant field, return {{"collection":"","filter":{{}},"projection":{{}}}}"#,
            description = self.domain_description,
            history = history::render(req.history),
            schema = schema::render(req.schema),
            question = req.question,
            tenant = req.tenant,
        )
    }
}

/// Extracts and decodes the single query spec embedded in `text`.
pub fn parse_query_spec(text: &str) -> Result<QuerySpec> {
    let mut candidates = json_objects(text);
    match candidates.len() {
        0 => Err(PipelineError::PlanParse(
            "no JSON object found in model response".into(),
        )),
        1 => {
            let value = candidates.remove(0);
            serde_json::from_value(value)
                .map_err(|e| PipelineError::PlanParse(format!("invalid query spec: {}", e)))
        }
        n => Err(PipelineError::PlanParse(format!(
            "ambiguous model response: {} JSON objects found",
            n
        ))),
    }
}

/// All top-level balanced `{…}` spans in `text` that decode as JSON objects.
pub fn json_objects(text: &str) -> Vec<Value> {
    object_spans(text)
        .into_iter()
        .filter_map(|span| serde_json::from_str::<Value>(span).ok())
        .filter(Value::is_object)
        .collect()
}

fn object_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(rel) = text[pos..].find('{') {
        let start = pos + rel;
        match balanced_end(text, start) {
            Some(end) => {
                spans.push(&text[start..end]);
                pos = end;
            }
            // Unclosed brace: it was prose, keep scanning after it.
            None => pos = start + 1,
        }
    }
    spans
}

/// Byte offset just past the `}` closing the `{` at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
