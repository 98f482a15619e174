//! Domain model and orchestration for the hedge fund research workflow.
//!
//! Adapters for the model provider, spreadsheet, email and chat services live
//! in sibling crates and plug in through the traits in [`ports`].

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod notify;
pub mod parse;
pub mod ports;
pub mod retry;
pub mod risk;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};
pub use domain::record::{ResearchRecord, Ticker, RESEARCH_COLUMNS};
pub use domain::run::{Channel, NotificationOutcome, RunResult, SheetStatus};
pub use errors::{DomainError, IntegrationError, WorkflowError};
pub use notify::{
    ChatMessage, EmailAttachment, EmailDraft, NotificationRouter, NotificationSettings, SheetLinks,
};
pub use parse::TableParser;
pub use ports::{
    BrokerSession, ChatService, EmailService, SpreadsheetService, TextGenerator, ToolBroker,
    WorksheetHandle,
};
pub use retry::{RetryError, RetryPolicy};
pub use risk::RiskTerms;
pub use workflow::{ResearchWorkflow, WorkflowSettings};
