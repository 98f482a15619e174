//! Contracts for the external collaborators the workflow talks to.
//!
//! Every adapter crate (`hedgeflow-agent`, `hedgeflow-composio`,
//! `hedgeflow-slack`) implements one or more of these traits; the workflow
//! only ever sees `Arc<dyn Trait>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::record::ResearchRecord;
use crate::errors::IntegrationError;
use crate::notify::{ChatMessage, EmailDraft};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider label used in logs and the run summary.
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String, IntegrationError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetHandle {
    pub spreadsheet_id: String,
    pub worksheet: String,
}

#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    /// Idempotent: returns the existing worksheet or creates it.
    async fn ensure_worksheet(&self, name: &str) -> Result<WorksheetHandle, IntegrationError>;
    async fn append_rows(
        &self,
        handle: &WorksheetHandle,
        rows: &[ResearchRecord],
    ) -> Result<(), IntegrationError>;
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn create_draft(&self, draft: &EmailDraft) -> Result<(), IntegrationError>;
}

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn post_message(&self, message: &ChatMessage) -> Result<(), IntegrationError>;
}

/// Tool-discovery broker session. Created once by the caller and passed to
/// whoever needs it; only used for observability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerSession {
    pub session_id: String,
    pub mcp_url: String,
    pub toolkits: Vec<String>,
}

#[async_trait]
pub trait ToolBroker: Send + Sync {
    async fn create_session(&self) -> Result<BrokerSession, IntegrationError>;
}
