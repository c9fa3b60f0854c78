//! Text-generation providers.
//!
//! Implements [`TextModel`] for the hosted backends selected by `[model]`:
//! - **[`GeminiModel`]** calls the Google `generateContent` API.
//! - **[`OpenAIChatModel`]** calls an OpenAI-compatible `/v1/chat/completions` endpoint.
//! - **[`DisabledModel`]** fails every call; the assistant then answers with
//!   the insufficient-information message.
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use scope_qa::config::ModelConfig;
//! # use scope_qa::generation::create_model;
//! let config = ModelConfig::default(); // provider = "disabled"
//! let model = create_model(&config).unwrap();
//! assert_eq!(model.model_name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use scope_qa_core::{GenerationParams, TextModel};

use crate::config::ModelConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Placeholder model used when `provider = "disabled"`.
pub struct DisabledModel;

#[async_trait]
impl TextModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        bail!("text generation is disabled (set [model].provider)")
    }
}

/// HTTP transport shared by the hosted providers.
struct HttpTransport {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpTransport {
    fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    /// POSTs `body` and returns the decoded JSON response, retrying transient failures.
    ///
    /// Credentials travel in `headers` only; URLs are stripped from transport
    /// errors before they are logged or returned.
    async fn post_json(
        &self,
        provider: &str,
        url: &str,
        headers: &[(&str, String)],
        body: &Value,
    ) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .json(body);
            for (name, value) in headers {
                request = request.header(*name, value);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json().await.map_err(|e| e.without_url().into());
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(provider, %status, attempt, "transient generation error");
                        last_err = Some(anyhow!("{} API error {}: {}", provider, status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("{} API error {}: {}", provider, status, body_text);
                }
                Err(e) => {
                    let e = e.without_url();
                    warn!(provider, attempt, error = %e, "generation request failed");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} generation failed after retries", provider)))
    }
}

fn required_model(config: &ModelConfig) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow!("model.model required for {} provider", config.provider))
}

fn api_key(config: &ModelConfig) -> Result<String> {
    let var = config.api_key_var();
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

// ============ Gemini ============

/// Google Gemini via `POST /v1beta/models/{model}:generateContent`.
///
/// The API key is read from `GEMINI_API_KEY` (or `[model].api_key_env`) and
/// sent in the `x-goog-api-key` header.
pub struct GeminiModel {
    model: String,
    base_url: String,
    api_key: String,
    transport: HttpTransport,
}

impl GeminiModel {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            model: required_model(config)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key: api_key(config)?,
            transport: HttpTransport::new(config)?,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

fn gemini_request(prompt: &str, params: &GenerationParams) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": params.temperature,
            "maxOutputTokens": params.max_output_tokens,
        }
    })
}

/// Extracts `candidates[0].content.parts[*].text`, concatenated.
fn parse_gemini_response(json: &Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing candidates[0].content.parts"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        bail!("Invalid Gemini response: no text parts");
    }
    Ok(text)
}

#[async_trait]
impl TextModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = gemini_request(prompt, params);
        let json = self
            .transport
            .post_json(
                "Gemini",
                &self.endpoint(),
                &[("x-goog-api-key", self.api_key.clone())],
                &body,
            )
            .await?;
        let text = parse_gemini_response(&json)?;
        debug!(model = %self.model, chars = text.len(), "gemini generation complete");
        Ok(text)
    }
}

// ============ OpenAI ============

/// OpenAI-compatible chat completions.
///
/// The API key is read from `OPENAI_API_KEY` (or `[model].api_key_env`).
pub struct OpenAIChatModel {
    model: String,
    base_url: String,
    api_key: String,
    transport: HttpTransport,
}

impl OpenAIChatModel {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            model: required_model(config)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key: api_key(config)?,
            transport: HttpTransport::new(config)?,
        })
    }
}

fn openai_request(model: &str, prompt: &str, params: &GenerationParams) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "temperature": params.temperature,
        "max_tokens": params.max_output_tokens,
    })
}

fn parse_openai_response(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

#[async_trait]
impl TextModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = openai_request(&self.model, prompt, params);
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let json = self
            .transport
            .post_json(
                "OpenAI",
                &url,
                &[("Authorization", format!("Bearer {}", self.api_key))],
                &body,
            )
            .await?;
        let text = parse_openai_response(&json)?;
        debug!(model = %self.model, chars = text.len(), "openai generation complete");
        Ok(text)
    }
}

/// Create the model selected by `config.provider`.
///
/// # Errors
///
/// Returns an error for unknown providers, a missing model name, or a
/// missing API key environment variable.
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn TextModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "gemini" => Ok(Arc::new(GeminiModel::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIChatModel::new(config)?)),
        other => bail!("Unknown model provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParams {
        GenerationParams {
            temperature: 0.7,
            max_output_tokens: 256,
        }
    }

    #[test]
    fn test_gemini_request_shape() {
        let body = gemini_request("hello", &GenerationParams::deterministic(64));
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 64);
    }

    #[test]
    fn test_parse_gemini_response() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Twelve wells " }, { "text": "were dug." }] }
            }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Twelve wells were dug.");
        assert!(parse_gemini_response(&json!({"candidates": []})).is_err());
        assert!(parse_gemini_response(&json!({
            "candidates": [{ "content": { "parts": [] } }]
        }))
        .is_err());
    }

    #[test]
    fn test_openai_request_shape() {
        let body = openai_request("gpt-4o-mini", "hi", &params());
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn test_parse_openai_response() {
        let json = json!({"choices": [{"message": {"role": "assistant", "content": "Done."}}]});
        assert_eq!(parse_openai_response(&json).unwrap(), "Done.");
        assert!(parse_openai_response(&json!({"choices": []})).is_err());
    }

    #[tokio::test]
    async fn test_disabled_model_fails() {
        let model = create_model(&ModelConfig::default()).unwrap();
        assert_eq!(model.model_name(), "disabled");
        assert!(model.generate("x", &params()).await.is_err());
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let config = ModelConfig {
            provider: "gemini".to_string(),
            model: Some("gemini-2.0-flash".to_string()),
            api_key_env: Some("SCOPEQA_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..ModelConfig::default()
        };
        let err = create_model(&config).err().unwrap();
        assert!(err.to_string().contains("SCOPEQA_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    fn unreachable_gemini(key_var: &str) -> GeminiModel {
        std::env::set_var(key_var, "SECRETKEY123");
        GeminiModel::new(&ModelConfig {
            provider: "gemini".to_string(),
            model: Some("gemini-2.0-flash".to_string()),
            url: Some("http://127.0.0.1:1".to_string()),
            api_key_env: Some(key_var.to_string()),
            timeout_secs: 2,
            max_retries: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_gemini_endpoint_has_no_key() {
        let model = unreachable_gemini("SCOPEQA_TEST_GEMINI_KEY_ENDPOINT");
        let endpoint = model.endpoint();
        assert_eq!(
            endpoint,
            "http://127.0.0.1:1/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(!endpoint.contains("SECRETKEY123"));
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_leak_the_key() {
        let model = unreachable_gemini("SCOPEQA_TEST_GEMINI_KEY_TRANSPORT");
        let err = model.generate("hello", &params()).await.unwrap_err();
        let text = format!("{:#}", err);
        assert!(!text.contains("SECRETKEY123"), "leaked: {}", text);
        assert!(!text.contains("generateContent"), "url in error: {}", text);
    }

    #[test]
    fn test_unknown_provider() {
        let config = ModelConfig {
            provider: "llama".to_string(),
            ..ModelConfig::default()
        };
        assert!(create_model(&config).is_err());
    }
}
