//! Answer phrasing: sanitized records → natural-language reply.
//!
//! The instruction list is composed deterministically from keywords in the
//! question. Every matching instruction is appended, in a fixed order, after
//! the base instruction.

use serde_json::Value;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::generation::{GenerationParams, TextModel};
use crate::models::Record;
use crate::planner::json_objects;

pub const BASE_INSTRUCTION: &str = "Always refer to entities by names, not IDs.";
pub const SUMMARY_INSTRUCTION: &str = "Include project details, KPIs, KPIUpdates timeline, and visualisations; omit visuals for generic summary.";
pub const TIMELINE_INSTRUCTION: &str = "Show project date range and KPIUpdates over time.";
pub const LOCATION_INSTRUCTION: &str = "Use project.states for location; ignore success stories.";

/// Instructions for `question`, base instruction first.
pub fn instructions(question: &str) -> Vec<&'static str> {
    let q = question.to_lowercase();
    let mut out = vec![BASE_INSTRUCTION];
    if q.contains("summary") {
        out.push(SUMMARY_INSTRUCTION);
    }
    if q.contains("progress") || q.contains("timeline") {
        out.push(TIMELINE_INSTRUCTION);
    }
    if q.contains("location") {
        out.push(LOCATION_INSTRUCTION);
    }
    out
}

/// Prompts a model to phrase records as an answer.
#[derive(Debug, Clone)]
pub struct Summarizer {
    pub domain_description: String,
    pub params: GenerationParams,
}

impl Summarizer {
    pub fn new(domain_description: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            domain_description: domain_description.into(),
            params,
        }
    }

    pub fn build_prompt(&self, question: &str, records: &[Record]) -> Result<String> {
        let rendered = serde_json::to_string_pretty(records)
            .map_err(|e| PipelineError::Model(format!("cannot serialize records: {}", e)))?;
        Ok(format!(
            r#"PROJECT DESCRIPTION:
{description}

QUESTION:
{question}

RESULTS:
{rendered}

TASK:
- {task}
- Do NOT output raw JSON.
"#,
            description = self.domain_description,
            question = question,
            rendered = rendered,
            task = instructions(question).join(" "),
        ))
    }

    /// Returns the model's text. A reply carrying a query spec is rejected.
    pub async fn summarize(
        &self,
        model: &dyn TextModel,
        question: &str,
        records: &[Record],
    ) -> Result<String> {
        let prompt = self.build_prompt(question, records)?;
        let text = model
            .generate(&prompt, &self.params)
            .await
            .map_err(PipelineError::model)?;
        if contains_query_spec(&text) {
            return Err(PipelineError::Model(
                "summary contained a query spec".into(),
            ));
        }
        debug!(chars = text.len(), "answer summarized");
        Ok(text)
    }
}

fn contains_query_spec(text: &str) -> bool {
    json_objects(text).iter().any(|v| match v {
        Value::Object(map) => map.contains_key("collection") && map.contains_key("filter"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{obj, ScriptedModel};
    use serde_json::json;

    fn summarizer() -> Summarizer {
        Summarizer::new(
            "KPI dashboard.",
            GenerationParams {
                temperature: 0.7,
                max_output_tokens: 1024,
            },
        )
    }

    #[test]
    fn test_base_instruction_only() {
        assert_eq!(instructions("How many KPIs are there?"), vec![BASE_INSTRUCTION]);
    }

    #[test]
    fn test_instructions_are_conjunctive_and_ordered() {
        assert_eq!(
            instructions("Give me a SUMMARY of the location and Timeline"),
            vec![
                BASE_INSTRUCTION,
                SUMMARY_INSTRUCTION,
                TIMELINE_INSTRUCTION,
                LOCATION_INSTRUCTION
            ]
        );
        assert_eq!(
            instructions("what progress was made?"),
            vec![BASE_INSTRUCTION, TIMELINE_INSTRUCTION]
        );
        assert_eq!(
            instructions("progress and timeline"),
            vec![BASE_INSTRUCTION, TIMELINE_INSTRUCTION]
        );
    }

    #[test]
    fn test_instruction_texts() {
        assert_eq!(
            SUMMARY_INSTRUCTION,
            "Include project details, KPIs, KPIUpdates timeline, and visualisations; omit visuals for generic summary."
        );
        assert_eq!(TIMELINE_INSTRUCTION, "Show project date range and KPIUpdates over time.");
        assert_eq!(
            LOCATION_INSTRUCTION,
            "Use project.states for location; ignore success stories."
        );
    }

    #[test]
    fn test_prompt_embeds_records_and_tasks() {
        let records = vec![obj(json!({"kpi_name": "Wells dug", "final": 12}))];
        let prompt = summarizer()
            .build_prompt("Project location?", &records)
            .unwrap();
        assert!(prompt.contains("KPI dashboard."));
        assert!(prompt.contains("QUESTION:\nProject location?"));
        assert!(prompt.contains("\"kpi_name\": \"Wells dug\""));
        assert!(prompt.contains(&format!("- {} {}", BASE_INSTRUCTION, LOCATION_INSTRUCTION)));
        assert!(prompt.contains("- Do NOT output raw JSON."));
    }

    #[tokio::test]
    async fn test_summarize_uses_creative_decoding() {
        let model = ScriptedModel::new(["The project has dug 12 wells."]);
        let records = vec![obj(json!({"kpi_name": "Wells dug", "final": 12}))];
        let text = summarizer()
            .summarize(&model, "How many wells?", &records)
            .await
            .unwrap();
        assert_eq!(text, "The project has dug 12 wells.");
        assert!(model.params(0).temperature > 0.0);
    }

    #[tokio::test]
    async fn test_summary_with_query_spec_is_rejected() {
        let model = ScriptedModel::new([
            r#"Here you go: {"collection":"kpis","filter":{},"projection":{}}"#,
        ]);
        let err = summarizer()
            .summarize(&model, "kpis?", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Model(_)));
    }
}
