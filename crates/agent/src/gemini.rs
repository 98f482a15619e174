use async_trait::async_trait;
use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::http::{build_client, read_json, send_error};
use hedgeflow_core::ports::TextGenerator;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "gemini";

pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, IntegrationError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client: build_client(SERVICE, timeout_secs)?,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Joins the text parts of the first candidate that has any.
pub(crate) fn extract_text(response: GenerateContentResponse) -> Result<String, IntegrationError> {
    if let Some(reason) = response.prompt_feedback.and_then(|feedback| feedback.block_reason) {
        return Err(IntegrationError::rejected(SERVICE, 200, format!("prompt blocked: {reason}")));
    }

    response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .map(|content| {
            content.parts.into_iter().filter_map(|part| part.text).collect::<Vec<_>>().join("")
        })
        .find(|text| !text.trim().is_empty())
        .ok_or_else(|| IntegrationError::decode(SERVICE, "response contained no candidate text"))
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn generate(&self, prompt: &str) -> Result<String, IntegrationError> {
        let body = GenerateContentRequest {
            contents: vec![Content { role: "user", parts: vec![Part { text: prompt }] }],
        };

        debug!(event_name = "llm.request", provider = SERVICE, model = %self.model, "sending generateContent");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| send_error(SERVICE, error))?;

        let parsed: GenerateContentResponse = read_json(SERVICE, response).await?;
        extract_text(parsed)
    }
}
