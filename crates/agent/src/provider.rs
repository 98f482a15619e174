use std::sync::Arc;

use hedgeflow_core::config::{LlmConfig, LlmProvider};
use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::ports::TextGenerator;
use secrecy::SecretString;
use tracing::{info, warn};

use crate::gemini::GeminiClient;
use crate::openai::OpenAiCompatibleClient;

/// Builds the generator selected by `config.provider`.
///
/// Selecting the OpenAI-compatible provider without a base URL degrades to
/// Gemini with a warning instead of failing the run.
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, IntegrationError> {
    match (config.provider, config.openai_base_url.as_deref()) {
        (LlmProvider::OpenaiCompatible, Some(base_url)) => {
            info!(event_name = "llm.provider_selected", provider = "openai_compatible", model = %config.model);
            let client = OpenAiCompatibleClient::new(
                base_url,
                &config.model,
                config.api_key.clone(),
                config.timeout_secs,
            )?;
            Ok(Arc::new(client))
        }
        (LlmProvider::OpenaiCompatible, None) => {
            warn!(
                event_name = "llm.provider_fallback",
                "openai_compatible provider selected without llm.openai_base_url; falling back to gemini"
            );
            gemini(config)
        }
        (LlmProvider::Gemini, _) => {
            info!(event_name = "llm.provider_selected", provider = "gemini", model = %config.model);
            gemini(config)
        }
    }
}

fn gemini(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, IntegrationError> {
    let api_key: SecretString = config
        .api_key
        .clone()
        .ok_or_else(|| IntegrationError::rejected("gemini", 401, "llm.api_key is not configured"))?;
    let client = GeminiClient::new(&config.base_url, &config.model, api_key, config.timeout_secs)?;
    Ok(Arc::new(client))
}
