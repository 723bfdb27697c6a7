use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MaestroError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Endpoint override. For Azure this is the resource endpoint,
    /// e.g. `https://my-resource.openai.azure.com`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub azure_deployment: Option<String>,
    #[serde(default)]
    pub azure_api_version: Option<String>,
}

fn default_provider() -> String { "openai".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Limits applied by the orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Completion rounds one agent may spend on tool calls before giving up.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Hard ceiling on round-robin turns, whatever the termination predicate says.
    #[serde(default = "default_max_group_turns")]
    pub max_group_turns: usize,
    /// Default turn count for group chats.
    #[serde(default = "default_group_chat_max_turns")]
    pub group_chat_max_turns: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            max_group_turns: default_max_group_turns(),
            group_chat_max_turns: default_group_chat_max_turns(),
        }
    }
}

fn default_max_tool_rounds() -> usize { 10 }
fn default_max_group_turns() -> usize { 40 }
fn default_group_chat_max_turns() -> usize { 4 }

/// Experiment tracking sink (MLflow REST API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_tracking_enabled")]
    pub enabled: bool,
    #[serde(default = "default_tracking_url")]
    pub base_url: String,
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: default_tracking_enabled(),
            base_url: default_tracking_url(),
            experiment_name: default_experiment_name(),
        }
    }
}

fn default_tracking_enabled() -> bool { true }
fn default_tracking_url() -> String { "http://localhost:5000".to_string() }
fn default_experiment_name() -> String { "customer-support-triage".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| MaestroError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| MaestroError::Config(e.to_string()))
    }

    /// Build a config from environment variables alone.
    ///
    /// Reads `MAESTRO_PROVIDER`, `MAESTRO_MODEL`, `MAESTRO_BASE_URL`,
    /// `MAESTRO_AZURE_DEPLOYMENT`, and the provider's API key
    /// (`AZURE_OPENAI_API_KEY` for azure, `OPENAI_API_KEY` otherwise).
    pub fn from_env() -> Result<Self> {
        let provider = std::env::var("MAESTRO_PROVIDER").unwrap_or_else(|_| default_provider());
        let key_var = if provider == "azure" {
            "AZURE_OPENAI_API_KEY"
        } else {
            "OPENAI_API_KEY"
        };
        let api_key = std::env::var(key_var).ok();
        let azure_deployment = std::env::var("MAESTRO_AZURE_DEPLOYMENT").ok();

        let model_id = match std::env::var("MAESTRO_MODEL") {
            Ok(m) => m,
            Err(_) => azure_deployment.clone().ok_or_else(|| {
                MaestroError::Config("MAESTRO_MODEL is not set and no config file was found".into())
            })?,
        };

        Ok(Self {
            model: ModelConfig {
                provider,
                model_id,
                api_key,
                base_url: std::env::var("MAESTRO_BASE_URL").ok(),
                max_tokens: default_max_tokens(),
                temperature: default_temperature(),
                azure_deployment,
                azure_api_version: None,
            },
            orchestration: OrchestrationConfig::default(),
            tracking: TrackingConfig::default(),
        })
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
