//! Composio-backed adapters.
//!
//! Google Sheets and Gmail are reached through Composio tool execution with
//! pre-connected accounts, so no Google OAuth handling lives here.

pub mod broker;
pub mod catalog;
pub mod client;
pub mod gmail;
pub mod sheets;

pub use broker::ComposioToolBroker;
pub use catalog::{ToolCatalog, ToolDescriptor, ToolSource};
pub use client::ComposioClient;
pub use gmail::ComposioGmail;
pub use sheets::{ComposioSheets, SheetAppend};
