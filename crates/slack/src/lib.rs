//! Slack delivery for risk alerts.
//!
//! - **Block Kit** (`blocks`) - typed message builders and the research alert layout
//! - **Web API** (`client`) - `chat.postMessage` with a bot token
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Add the `chat:write` bot scope and install the app to the workspace
//! 3. Invite the bot to the alert channel
//! 4. Set env vars: `HEDGEFLOW_SLACK_BOT_TOKEN`, `HEDGEFLOW_NOTIFY_CHAT_CHANNEL`

pub mod blocks;
pub mod client;

pub use client::SlackWebClient;
