use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::domain::record::Ticker;
use crate::domain::run::{Channel, NotificationOutcome};
use crate::errors::{DomainError, IntegrationError};
use crate::ports::{ChatService, EmailService};

/// Hard cap on the research text carried in a chat alert, marker included.
pub const MAX_CHAT_BODY_CHARS: usize = 3000;
pub const TRUNCATION_MARKER: &str = "...";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub email_recipients: Vec<String>,
    pub chat_channel: String,
}

/// Where the research sheet can be viewed and downloaded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SheetLinks {
    pub view: Option<String>,
    pub csv_export: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub url: String,
    pub mime_type: String,
    pub title: String,
}

impl EmailAttachment {
    pub fn csv_export(url: &str, ticker: &Ticker) -> Self {
        Self {
            url: url.to_string(),
            mime_type: "text/csv".to_string(),
            title: format!("{ticker}_analysis.csv"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub recipient_email: String,
    pub extra_recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: String,
    pub headline: String,
    /// Research text, already truncated to `MAX_CHAT_BODY_CHARS`.
    pub body: String,
    pub sheet_link: Option<String>,
}

impl ChatMessage {
    /// Plain mrkdwn rendering used as the notification fallback text.
    pub fn render_text(&self) -> String {
        let mut text = format!("*{}*", self.headline);
        if !self.body.is_empty() {
            text.push('\n');
            text.push_str(&self.body);
        }
        if let Some(link) = &self.sheet_link {
            text.push_str(&format!("\n<{link}|View research sheet>"));
        }
        text
    }
}

/// Cuts `text` to at most `max_chars` characters, ending in
/// `TRUNCATION_MARKER` when anything was removed.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return text.chars().take(max_chars).collect();
    }
    let mut truncated: String = text.chars().take(max_chars - marker_len).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

pub struct NotificationRouter {
    settings: NotificationSettings,
    email: Arc<dyn EmailService>,
    chat: Arc<dyn ChatService>,
}

impl NotificationRouter {
    pub fn new(
        settings: NotificationSettings,
        email: Arc<dyn EmailService>,
        chat: Arc<dyn ChatService>,
    ) -> Self {
        Self { settings, email, chat }
    }

    pub fn build_email(
        &self,
        research_text: &str,
        links: &SheetLinks,
        ticker: &Ticker,
    ) -> Result<EmailDraft, DomainError> {
        let (recipient_email, extra_recipients) = self
            .settings
            .email_recipients
            .split_first()
            .ok_or(DomainError::InvalidRecipients)?;

        let mut sections =
            vec![format!("Ticker: {ticker}"), "Summary:".to_string(), research_text.to_string()];
        if let Some(link) = &links.view {
            sections.push(format!("Google Sheet: {link}"));
        }

        Ok(EmailDraft {
            recipient_email: recipient_email.clone(),
            extra_recipients: extra_recipients.to_vec(),
            subject: format!("{ticker} hedge fund research update"),
            body: sections.join("\n\n"),
            is_html: false,
            attachments: links
                .csv_export
                .iter()
                .map(|url| EmailAttachment::csv_export(url, ticker))
                .collect(),
        })
    }

    pub fn build_chat(
        &self,
        research_text: &str,
        sheet_link: Option<&str>,
        ticker: &Ticker,
    ) -> ChatMessage {
        ChatMessage {
            channel: self.settings.chat_channel.clone(),
            headline: format!("Attention required for {ticker}"),
            body: truncate_chars(research_text.trim(), MAX_CHAT_BODY_CHARS),
            sheet_link: sheet_link.map(str::to_string),
        }
    }

    /// No calls are made unless `risk_flagged`. Otherwise the email draft and
    /// chat alert are dispatched concurrently and reported in that order.
    pub async fn route(
        &self,
        research_text: &str,
        links: &SheetLinks,
        ticker: &Ticker,
        risk_flagged: bool,
    ) -> Result<Vec<NotificationOutcome>, DomainError> {
        if !risk_flagged {
            info!(ticker = %ticker, "no risk terms detected; notifications suppressed");
            return Ok(Vec::new());
        }

        let draft = self.build_email(research_text, links, ticker)?;
        let message = self.build_chat(research_text, links.view.as_deref(), ticker);
        let email_payload = draft.body.clone();
        let chat_payload = message.render_text();

        let email_service = Arc::clone(&self.email);
        let email_task = tokio::spawn(async move { email_service.create_draft(&draft).await });
        let chat_service = Arc::clone(&self.chat);
        let chat_task = tokio::spawn(async move { chat_service.post_message(&message).await });

        let (email_result, chat_result) = tokio::join!(email_task, chat_task);

        Ok(vec![
            outcome_for(Channel::Email, email_result, &email_payload),
            outcome_for(Channel::Chat, chat_result, &chat_payload),
        ])
    }
}

fn outcome_for(
    channel: Channel,
    result: Result<Result<(), IntegrationError>, JoinError>,
    payload: &str,
) -> NotificationOutcome {
    match result {
        Ok(Ok(())) => {
            info!(channel = %channel, "notification dispatched");
            NotificationOutcome::dispatched(channel, payload)
        }
        Ok(Err(error)) => {
            warn!(channel = %channel, error = %error, "notification dispatch failed");
            NotificationOutcome::failed(channel, error.to_string(), payload)
        }
        Err(join_error) => {
            warn!(channel = %channel, error = %join_error, "notification task aborted");
            NotificationOutcome::failed(
                channel,
                format!("notification task aborted: {join_error}"),
                payload,
            )
        }
    }
}
