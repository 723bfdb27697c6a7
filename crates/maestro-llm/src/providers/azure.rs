use futures::future::BoxFuture;
use futures::stream::BoxStream;
use reqwest::Client;
use tracing::debug;

use maestro_core::config::ModelConfig;
use maestro_core::error::{MaestroError, Result};
use maestro_core::traits::LlmClient;
use maestro_core::types::*;

const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Azure OpenAI client. Uses the same wire format as OpenAI but different
/// endpoint structure and `api-key` header instead of Bearer token.
pub struct AzureClient {
    http: Client,
}

impl AzureClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for AzureClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the deployment-scoped chat completions URL.
pub(crate) fn deployment_url(config: &ModelConfig) -> Result<String> {
    let endpoint = config
        .base_url
        .as_deref()
        .ok_or_else(|| MaestroError::Config("Azure: base_url (resource endpoint) is required".into()))?;
    let deployment = config
        .azure_deployment
        .as_deref()
        .unwrap_or(config.model_id.as_str());
    let api_version = config
        .azure_api_version
        .as_deref()
        .unwrap_or(DEFAULT_API_VERSION);

    Ok(format!(
        "{}/openai/deployments/{deployment}/chat/completions?api-version={api_version}",
        endpoint.trim_end_matches('/')
    ))
}

impl LlmClient for AzureClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let url = deployment_url(&config)?;
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| MaestroError::Config("Azure: api_key is required".into()))?;

            // Reuse OpenAI message conversion
            let oai_messages = super::openai::convert_messages(messages);
            let oai_tools = super::openai::convert_tools(&tools);

            let mut body = serde_json::json!({
                "messages": oai_messages,
                "max_tokens": config.max_tokens,
                "stream": true,
            });
            if !oai_tools.is_empty() {
                body["tools"] = serde_json::to_value(&oai_tools)?;
            }
            if config.temperature > 0.0 {
                body["temperature"] = serde_json::json!(config.temperature);
            }

            debug!(url = %url, "Sending Azure chat completion request");

            let response = self
                .http
                .post(&url)
                .header("api-key", api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| MaestroError::CompletionFailure(e.to_string()))?;

            super::openai::delta_stream(response).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure_config() -> ModelConfig {
        ModelConfig {
            provider: "azure".into(),
            model_id: "gpt-4o".into(),
            api_key: Some("key".into()),
            base_url: Some("https://demo.openai.azure.com/".into()),
            max_tokens: 1024,
            temperature: 0.0,
            azure_deployment: Some("gpt-4o-prod".into()),
            azure_api_version: None,
        }
    }

    #[test]
    fn test_deployment_url() {
        let url = deployment_url(&azure_config()).unwrap();
        assert_eq!(
            url,
            "https://demo.openai.azure.com/openai/deployments/gpt-4o-prod/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_deployment_falls_back_to_model_id() {
        let mut config = azure_config();
        config.azure_deployment = None;
        let url = deployment_url(&config).unwrap();
        assert!(url.contains("/deployments/gpt-4o/"));
    }

    #[test]
    fn test_missing_endpoint() {
        let mut config = azure_config();
        config.base_url = None;
        assert!(matches!(deployment_url(&config), Err(MaestroError::Config(_))));
    }
}
