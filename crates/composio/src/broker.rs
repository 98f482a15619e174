use std::sync::Arc;

use async_trait::async_trait;
use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::ports::{BrokerSession, ToolBroker};
use tracing::info;

use crate::client::ComposioClient;

/// Opens tool-router sessions scoped to the configured toolkits.
pub struct ComposioToolBroker {
    client: Arc<ComposioClient>,
    toolkits: Vec<String>,
}

impl ComposioToolBroker {
    pub fn new(client: Arc<ComposioClient>, toolkits: Vec<String>) -> Self {
        Self { client, toolkits }
    }
}

#[async_trait]
impl ToolBroker for ComposioToolBroker {
    async fn create_session(&self) -> Result<BrokerSession, IntegrationError> {
        let response = self.client.create_session(&self.toolkits).await?;
        info!(
            event_name = "broker.session_created",
            session_id = %response.session_id,
            user_id = self.client.user_id(),
            "tool router session created"
        );
        Ok(BrokerSession {
            session_id: response.session_id,
            mcp_url: response.mcp_url,
            toolkits: self.toolkits.clone(),
        })
    }
}
