use async_trait::async_trait;
use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::http::{build_client, read_json, send_error};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::catalog::{ToolDescriptor, ToolSource};

pub(crate) const SERVICE: &str = "composio";

/// Thin REST client for the Composio v3 API.
pub struct ComposioClient {
    base_url: String,
    api_key: SecretString,
    user_id: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    connected_account_id: Option<&'a str>,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecuteResponse {
    #[serde(default)]
    successful: bool,
    error: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ToolListResponse {
    #[serde(default)]
    items: Vec<ToolDescriptor>,
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    user_id: &'a str,
    toolkits: &'a [String],
}

/// Tool-router session as returned by the API.
#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    #[serde(alias = "url", alias = "mcp_server_url")]
    pub mcp_url: String,
}

impl ComposioClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        user_id: &str,
        timeout_secs: u64,
    ) -> Result<Self, IntegrationError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            user_id: user_id.to_string(),
            client: build_client(SERVICE, timeout_secs)?,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Executes one tool action and returns its `data` payload.
    pub async fn execute(
        &self,
        slug: &str,
        connected_account_id: Option<&str>,
        arguments: Value,
    ) -> Result<Value, IntegrationError> {
        debug!(event_name = "composio.execute", tool = slug, "executing tool");
        let request = ExecuteRequest { user_id: &self.user_id, connected_account_id, arguments };
        let response = self
            .client
            .post(format!("{}/api/v3/tools/execute/{slug}", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| send_error(SERVICE, error))?;

        let parsed: ExecuteResponse = read_json(SERVICE, response).await?;
        check_execution(slug, parsed)
    }

    pub async fn create_session(
        &self,
        toolkits: &[String],
    ) -> Result<SessionResponse, IntegrationError> {
        let request = SessionRequest { user_id: &self.user_id, toolkits };
        let response = self
            .client
            .post(format!("{}/api/v3/labs/tool_router/session", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| send_error(SERVICE, error))?;

        read_json(SERVICE, response).await
    }
}

#[async_trait]
impl ToolSource for ComposioClient {
    async fn list_tools(&self, toolkit: &str) -> Result<Vec<ToolDescriptor>, IntegrationError> {
        let response = self
            .client
            .get(format!("{}/api/v3/tools", self.base_url))
            .query(&[("toolkit_slug", toolkit), ("limit", "1000")])
            .header("x-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|error| send_error(SERVICE, error))?;

        let parsed: ToolListResponse = read_json(SERVICE, response).await?;
        Ok(parsed.items)
    }
}

pub(crate) fn check_execution(slug: &str, response: ExecuteResponse) -> Result<Value, IntegrationError> {
    if response.successful {
        return Ok(response.data);
    }
    Err(IntegrationError::ActionFailed {
        service: SERVICE.to_string(),
        action: slug.to_string(),
        message: response.error.unwrap_or_else(|| "tool reported failure".to_string()),
    })
}
