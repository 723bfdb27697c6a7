pub mod providers;
pub mod streaming;

use maestro_core::config::ModelConfig;
use maestro_core::traits::LlmClient;

pub use providers::azure::AzureClient;
pub use providers::openai::OpenAiClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    match config.provider.as_str() {
        "azure" | "azure-openai" => Box::new(AzureClient::new()),
        // Everything else uses the OpenAI-compatible client
        _ => Box::new(OpenAiClient::new()),
    }
}
