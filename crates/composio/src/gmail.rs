use std::sync::Arc;

use async_trait::async_trait;
use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::notify::EmailDraft;
use hedgeflow_core::ports::EmailService;
use tracing::info;

use crate::client::{ComposioClient, SERVICE};

pub const CREATE_EMAIL_DRAFT: &str = "GMAIL_CREATE_EMAIL_DRAFT";

/// Creates Gmail drafts; nothing is sent without a human reviewing it.
pub struct ComposioGmail {
    client: Arc<ComposioClient>,
    connected_account_id: String,
}

impl ComposioGmail {
    pub fn new(client: Arc<ComposioClient>, connected_account_id: impl Into<String>) -> Self {
        Self { client, connected_account_id: connected_account_id.into() }
    }
}

#[async_trait]
impl EmailService for ComposioGmail {
    async fn create_draft(&self, draft: &EmailDraft) -> Result<(), IntegrationError> {
        let arguments = serde_json::to_value(draft)
            .map_err(|error| IntegrationError::decode(SERVICE, error.to_string()))?;
        self.client.execute(CREATE_EMAIL_DRAFT, Some(self.connected_account_id.as_str()), arguments).await?;
        info!(
            event_name = "gmail.draft_created",
            recipient = %draft.recipient_email,
            extra_recipients = draft.extra_recipients.len(),
            attachments = draft.attachments.len(),
            "email draft created"
        );
        Ok(())
    }
}
