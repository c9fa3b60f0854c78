//! Pipeline error taxonomy.
//!
//! Every stage maps its failures into a [`PipelineError`]. The assistant
//! logs the variant and collapses all of them into one user-visible
//! message, so the taxonomy exists for operators, not callers.

use std::fmt;

use thiserror::Error;

/// A failure in one stage of the question-answering pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing tenant id, malformed tenant id, or empty question.
    #[error("invalid input: {0}")]
    Input(String),

    /// Planner output did not contain a usable query spec.
    #[error("could not parse query plan: {0}")]
    PlanParse(String),

    /// No tenant-reference field could be discovered for a collection.
    #[error("cannot scope collection '{collection}': {reason}")]
    ScopeResolution { collection: String, reason: String },

    /// Store connectivity or query failure.
    #[error("store error: {0}")]
    Store(String),

    /// Generative model failure (non-success response, timeout, bad payload).
    #[error("model error: {0}")]
    Model(String),
}

/// Discriminant of [`PipelineError`], cheap to copy into logs and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    PlanParse,
    ScopeResolution,
    Store,
    Model,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::PlanParse => "plan_parse",
            ErrorKind::ScopeResolution => "scope_resolution",
            ErrorKind::Store => "store",
            ErrorKind::Model => "model",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Input(_) => ErrorKind::Input,
            PipelineError::PlanParse(_) => ErrorKind::PlanParse,
            PipelineError::ScopeResolution { .. } => ErrorKind::ScopeResolution,
            PipelineError::Store(_) => ErrorKind::Store,
            PipelineError::Model(_) => ErrorKind::Model,
        }
    }

    /// Wraps a collaborator error from a [`DocumentStore`](crate::store::DocumentStore).
    pub fn store(err: anyhow::Error) -> Self {
        PipelineError::Store(format!("{:#}", err))
    }

    /// Wraps a collaborator error from a [`TextModel`](crate::generation::TextModel).
    pub fn model(err: anyhow::Error) -> Self {
        PipelineError::Model(format!("{:#}", err))
    }

    pub(crate) fn scope(collection: &str, reason: impl Into<String>) -> Self {
        PipelineError::ScopeResolution {
            collection: collection.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(PipelineError::Input("x".into()).kind(), ErrorKind::Input);
        assert_eq!(
            PipelineError::scope("kpis", "no field").kind(),
            ErrorKind::ScopeResolution
        );
        assert_eq!(
            PipelineError::model(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Model
        );
    }

    #[test]
    fn test_store_error_keeps_context_chain() {
        let err = anyhow::anyhow!("disk gone").context("find failed");
        let msg = PipelineError::store(err).to_string();
        assert!(msg.contains("find failed"));
        assert!(msg.contains("disk gone"));
    }
}
