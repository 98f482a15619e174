use async_trait::async_trait;
use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::http::{build_client, read_json, send_error};
use hedgeflow_core::notify::ChatMessage;
use hedgeflow_core::ports::ChatService;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::blocks::{research_alert_message, Block};

const SERVICE: &str = "slack";
const POST_MESSAGE_TIMEOUT_SECS: u64 = 15;

/// Posts alerts through the Slack Web API.
pub struct SlackWebClient {
    api_base_url: String,
    bot_token: SecretString,
    client: reqwest::Client,
}

impl SlackWebClient {
    pub fn new(api_base_url: &str, bot_token: SecretString) -> Result<Self, IntegrationError> {
        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bot_token,
            client: build_client(SERVICE, POST_MESSAGE_TIMEOUT_SECS)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PostMessageRequest<'a> {
    channel: &'a str,
    text: String,
    blocks: Vec<Block>,
    unfurl_links: bool,
}

impl<'a> PostMessageRequest<'a> {
    pub(crate) fn for_alert(message: &'a ChatMessage) -> Self {
        let template = research_alert_message(message);
        Self {
            channel: &message.channel,
            text: template.fallback_text,
            blocks: template.blocks,
            unfurl_links: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
}

/// Slack answers 200 with `ok: false` for most failures. Rate limiting is the
/// only one worth retrying.
pub(crate) fn check_api_response(response: ApiResponse) -> Result<Option<String>, IntegrationError> {
    if response.ok {
        return Ok(response.ts);
    }

    let error = response.error.unwrap_or_else(|| "unknown_error".to_string());
    match error.as_str() {
        "ratelimited" | "service_unavailable" | "fatal_error" => {
            Err(IntegrationError::unavailable(SERVICE, error))
        }
        _ => Err(IntegrationError::ActionFailed {
            service: SERVICE.to_string(),
            action: "chat.postMessage".to_string(),
            message: error,
        }),
    }
}

#[async_trait]
impl ChatService for SlackWebClient {
    async fn post_message(&self, message: &ChatMessage) -> Result<(), IntegrationError> {
        let request = PostMessageRequest::for_alert(message);
        debug!(event_name = "slack.post_message", channel = %message.channel, blocks = request.blocks.len(), "posting alert");

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| send_error(SERVICE, error))?;

        let parsed: ApiResponse = read_json(SERVICE, response).await?;
        let ts = check_api_response(parsed)?;
        info!(event_name = "slack.message_posted", channel = %message.channel, ts = ts.as_deref().unwrap_or("-"), "alert posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::http::{build_client, read_json, send_error};
    use hedgeflow_core::notify::ChatMessage;

    use super::{check_api_response, ApiResponse, PostMessageRequest};

    fn response(raw: &str) -> ApiResponse {
        serde_json::from_str(raw).expect("fixture")
    }

    #[test]
    fn ok_response_yields_timestamp() {
        let ts = check_api_response(response(r#"{"ok":true,"channel":"C1","ts":"1712.0001"}"#))
            .expect("ok");
        assert_eq!(ts.as_deref(), Some("1712.0001"));
    }

    #[test]
    fn rate_limit_is_transient() {
        let error = check_api_response(response(r#"{"ok":false,"error":"ratelimited"}"#))
            .expect_err("rate limited");
        assert!(error.is_transient());
    }

    #[test]
    fn channel_errors_are_permanent() {
        let error = check_api_response(response(r#"{"ok":false,"error":"channel_not_found"}"#))
            .expect_err("bad channel");
        assert!(matches!(
            error,
            IntegrationError::ActionFailed { ref message, .. } if message == "channel_not_found"
        ));
        assert!(!error.is_transient());
    }

    #[test]
    fn request_payload_carries_channel_fallback_and_blocks() {
        let message = ChatMessage {
            channel: "C0ALERTS".to_string(),
            headline: "Attention required for TSLA".to_string(),
            body: "Lawsuit pending".to_string(),
            sheet_link: Some("https://docs.google.com/spreadsheets/d/xyz".to_string()),
        };

        let payload = serde_json::to_value(PostMessageRequest::for_alert(&message)).expect("json");

        assert_eq!(payload["channel"], "C0ALERTS");
        assert_eq!(payload["unfurl_links"], false);
        assert!(payload["text"].as_str().unwrap_or_default().contains("Lawsuit pending"));
        assert_eq!(payload["blocks"][0]["type"], "header");
        assert_eq!(payload["blocks"][0]["text"]["type"], "plain_text");
    }
}
