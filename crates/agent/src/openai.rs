use async_trait::async_trait;
use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::http::{build_client, read_json, send_error};
use hedgeflow_core::ports::TextGenerator;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "openai_compatible";

/// Client for OpenAI-style chat completion gateways.
pub struct OpenAiCompatibleClient {
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<SecretString>,
        timeout_secs: u64,
    ) -> Result<Self, IntegrationError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client: build_client(SERVICE, timeout_secs)?,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub(crate) fn extract_text(response: ChatCompletionResponse) -> Result<String, IntegrationError> {
    response
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .find(|content| !content.trim().is_empty())
        .ok_or_else(|| IntegrationError::decode(SERVICE, "response contained no message content"))
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn generate(&self, prompt: &str) -> Result<String, IntegrationError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![RequestMessage { role: "user", content: prompt }],
        };

        debug!(event_name = "llm.request", provider = SERVICE, model = %self.model, "sending chat completion");
        let mut request = self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| send_error(SERVICE, error))?;
        let parsed: ChatCompletionResponse = read_json(SERVICE, response).await?;
        extract_text(parsed)
    }
}
