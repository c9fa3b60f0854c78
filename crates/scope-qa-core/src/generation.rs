//! Generative model abstraction.
//!
//! Defines the [`TextModel`] trait that every text-completion backend
//! implements. Concrete providers (Gemini, OpenAI) live in the `scope-qa`
//! app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Decoding parameters for one completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature. `0.0` requests deterministic decoding.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
}

impl GenerationParams {
    pub fn deterministic(max_output_tokens: u32) -> Self {
        Self {
            temperature: 0.0,
            max_output_tokens,
        }
    }
}

/// A text-completion endpoint: prompt in, free-form text out.
///
/// Implementations should bound each call with a timeout and report
/// non-success responses as errors.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.0-flash"`).
    fn model_name(&self) -> &str;

    /// Generates a completion for `prompt`.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}
