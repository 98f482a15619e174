use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::record::Ticker;

/// Maximum characters kept in `NotificationOutcome::payload_digest`.
pub const PAYLOAD_DIGEST_CHARS: usize = 120;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetStatus {
    Written,
    Skipped,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Chat,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Chat => write!(f, "chat"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    pub channel: Channel,
    pub dispatched: bool,
    pub reason: String,
    pub payload_digest: String,
}

impl NotificationOutcome {
    pub fn dispatched(channel: Channel, payload: &str) -> Self {
        Self {
            channel,
            dispatched: true,
            reason: "dispatched".to_string(),
            payload_digest: digest(payload),
        }
    }

    pub fn failed(channel: Channel, reason: impl Into<String>, payload: &str) -> Self {
        Self { channel, dispatched: false, reason: reason.into(), payload_digest: digest(payload) }
    }
}

/// Truncated preview of a payload for the run summary.
pub fn digest(payload: &str) -> String {
    let mut preview: String = payload.chars().take(PAYLOAD_DIGEST_CHARS).collect();
    if payload.chars().nth(PAYLOAD_DIGEST_CHARS).is_some() {
        preview.push_str("...");
    }
    preview
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub ticker: Ticker,
    pub provider: String,
    pub row_count: usize,
    pub sheet_status: SheetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_error: Option<String>,
    pub risk_flagged: bool,
    pub matched_terms: Vec<String>,
    pub notifications: Vec<NotificationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn dispatched_count(&self) -> usize {
        self.notifications.iter().filter(|outcome| outcome.dispatched).count()
    }
}
