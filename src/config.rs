//! TOML configuration parsing and validation.
//!
//! All sections except `[db]` and `[server]` are optional and fall back to
//! defaults. API keys are never read from the file: `[model].api_key_env`
//! names the environment variable that holds the key.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scope_qa_core::assistant::{AssistantSettings, DEFAULT_DOMAIN_DESCRIPTION};
use scope_qa_core::history::MAX_TURNS;
use scope_qa_core::scope::ScopeRules;
use scope_qa_core::GenerationParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_acquire_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (e.g. a proxy or a local OpenAI-compatible server).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            api_key_env: None,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

impl ModelConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Environment variable holding the API key for this provider.
    pub fn api_key_var(&self) -> &str {
        match (&self.api_key_env, self.provider.as_str()) {
            (Some(var), _) => var.as_str(),
            (None, "openai") => "OPENAI_API_KEY",
            (None, _) => "GEMINI_API_KEY",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlannerConfig {
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_summary_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            temperature: default_summary_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_max_output_tokens() -> u32 {
    1024
}
fn default_summary_temperature() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchemaConfig {
    /// Seconds a sampled schema stays fresh. `0` re-samples on every request.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScopeConfig {
    #[serde(default = "default_tenant_collection")]
    pub tenant_collection: String,
    #[serde(default = "default_identity_field")]
    pub identity_field: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            tenant_collection: default_tenant_collection(),
            identity_field: default_identity_field(),
        }
    }
}

fn default_tenant_collection() -> String {
    "projects".to_string()
}
fn default_identity_field() -> String {
    "_id".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_domain_description")]
    pub domain_description: String,
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            domain_description: default_domain_description(),
            history_turns: default_history_turns(),
        }
    }
}

fn default_domain_description() -> String {
    DEFAULT_DOMAIN_DESCRIPTION.to_string()
}
fn default_history_turns() -> usize {
    MAX_TURNS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Largest `/api/message` body read; larger ones get the insufficient reply.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Config {
    /// Pipeline settings derived from this configuration.
    pub fn assistant_settings(&self) -> AssistantSettings {
        AssistantSettings {
            domain_description: self.assistant.domain_description.clone(),
            planner_max_output_tokens: self.planner.max_output_tokens,
            summarizer: GenerationParams {
                temperature: self.summarizer.temperature,
                max_output_tokens: self.summarizer.max_output_tokens,
            },
            history_turns: self.assistant.history_turns,
            schema_ttl: Duration::from_secs(self.schema.cache_ttl_secs),
            scope: ScopeRules {
                tenant_collection: self.scope.tenant_collection.clone(),
                identity_field: self.scope.identity_field.clone(),
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.model.provider.as_str() {
        "disabled" | "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown model provider: '{}'. Must be disabled, gemini, or openai.",
            other
        ),
    }

    if config.model.is_enabled() && config.model.model.is_none() {
        anyhow::bail!(
            "model.model must be specified when provider is '{}'",
            config.model.provider
        );
    }

    if config.model.timeout_secs == 0 {
        anyhow::bail!("model.timeout_secs must be > 0");
    }

    if config.planner.max_output_tokens == 0 {
        anyhow::bail!("planner.max_output_tokens must be > 0");
    }

    if config.summarizer.max_output_tokens == 0 {
        anyhow::bail!("summarizer.max_output_tokens must be > 0");
    }

    if !(config.summarizer.temperature > 0.0 && config.summarizer.temperature <= 2.0) {
        anyhow::bail!("summarizer.temperature must be in (0.0, 2.0]");
    }

    if !(1..=MAX_TURNS).contains(&config.assistant.history_turns) {
        anyhow::bail!("assistant.history_turns must be in [1, {}]", MAX_TURNS);
    }

    if config.scope.tenant_collection.is_empty() || config.scope.identity_field.is_empty() {
        anyhow::bail!("scope.tenant_collection and scope.identity_field must not be empty");
    }

    if config.server.max_body_bytes == 0 {
        anyhow::bail!("server.max_body_bytes must be > 0");
    }

    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/scopeqa.sqlite"

[server]
bind = "127.0.0.1:5001"
"#;

    fn parse(extra: &str) -> Result<Config> {
        let config: Config = toml::from_str(&format!("{}\n{}", MINIMAL, extra))?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.model.provider, "disabled");
        assert_eq!(config.planner.max_output_tokens, 1024);
        assert!((config.summarizer.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.schema.cache_ttl_secs, 300);
        assert_eq!(config.scope.tenant_collection, "projects");
        assert_eq!(config.assistant.history_turns, 10);
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.server.max_body_bytes, 64 * 1024);

        let settings = config.assistant_settings();
        assert_eq!(settings.schema_ttl, Duration::from_secs(300));
        assert_eq!(settings.scope, ScopeRules::default());
    }

    #[test]
    fn test_enabled_provider_requires_model() {
        let err = parse("[model]\nprovider = \"gemini\"\n").unwrap_err();
        assert!(err.to_string().contains("model.model"));
        assert!(parse("[model]\nprovider = \"gemini\"\nmodel = \"gemini-2.0-flash\"\n").is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[model]\nprovider = \"llama\"\nmodel = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown model provider"));
    }

    #[test]
    fn test_history_bound_enforced() {
        assert!(parse("[assistant]\nhistory_turns = 11\n").is_err());
        assert!(parse("[assistant]\nhistory_turns = 0\n").is_err());
        assert!(parse("[assistant]\nhistory_turns = 4\n").is_ok());
    }

    #[test]
    fn test_summarizer_temperature_must_be_creative() {
        assert!(parse("[summarizer]\ntemperature = 0.0\n").is_err());
        assert!(parse("[summarizer]\ntemperature = 1.2\n").is_ok());
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/scopeqa.example.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.model.provider, "gemini");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn test_api_key_var_defaults() {
        let mut model = ModelConfig {
            provider: "openai".to_string(),
            ..ModelConfig::default()
        };
        assert_eq!(model.api_key_var(), "OPENAI_API_KEY");
        model.provider = "gemini".to_string();
        assert_eq!(model.api_key_var(), "GEMINI_API_KEY");
        model.api_key_env = Some("MY_KEY".to_string());
        assert_eq!(model.api_key_var(), "MY_KEY");
    }
}
