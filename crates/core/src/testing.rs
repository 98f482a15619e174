//! In-memory collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::record::ResearchRecord;
use crate::errors::IntegrationError;
use crate::notify::{ChatMessage, EmailDraft};
use crate::ports::{
    BrokerSession, ChatService, EmailService, SpreadsheetService, TextGenerator, ToolBroker,
    WorksheetHandle,
};

fn locked<T: Clone>(values: &Mutex<Vec<T>>) -> Vec<T> {
    match values.lock() {
        Ok(values) => values.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn push<T>(values: &Mutex<Vec<T>>, value: T) {
    match values.lock() {
        Ok(mut values) => values.push(value),
        Err(poisoned) => poisoned.into_inner().push(value),
    }
}

/// Replays queued responses, then repeats the last one.
#[derive(Clone)]
pub struct ScriptedGenerator {
    responses: Arc<Mutex<VecDeque<Result<String, IntegrationError>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, IntegrationError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn prompts(&self) -> Vec<String> {
        locked(&self.prompts)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, IntegrationError> {
        push(&self.prompts, prompt.to_string());
        let mut responses = match self.responses.lock() {
            Ok(responses) => responses,
            Err(poisoned) => poisoned.into_inner(),
        };
        if responses.len() > 1 {
            responses.pop_front().unwrap_or_else(|| Ok(String::new()))
        } else {
            responses.front().cloned().unwrap_or_else(|| Ok(String::new()))
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingSheets {
    worksheets: Arc<Mutex<Vec<String>>>,
    appended: Arc<Mutex<Vec<ResearchRecord>>>,
    append_failure: Option<IntegrationError>,
}

impl RecordingSheets {
    pub fn failing_append(error: IntegrationError) -> Self {
        Self { append_failure: Some(error), ..Self::default() }
    }

    pub fn worksheets(&self) -> Vec<String> {
        locked(&self.worksheets)
    }

    pub fn appended(&self) -> Vec<ResearchRecord> {
        locked(&self.appended)
    }
}

#[async_trait]
impl SpreadsheetService for RecordingSheets {
    async fn ensure_worksheet(&self, name: &str) -> Result<WorksheetHandle, IntegrationError> {
        let mut worksheets = match self.worksheets.lock() {
            Ok(worksheets) => worksheets,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !worksheets.iter().any(|existing| existing == name) {
            worksheets.push(name.to_string());
        }
        Ok(WorksheetHandle { spreadsheet_id: "sheet-test".to_string(), worksheet: name.to_string() })
    }

    async fn append_rows(
        &self,
        _handle: &WorksheetHandle,
        rows: &[ResearchRecord],
    ) -> Result<(), IntegrationError> {
        if let Some(error) = &self.append_failure {
            return Err(error.clone());
        }
        for row in rows {
            push(&self.appended, row.clone());
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingEmail {
    drafts: Arc<Mutex<Vec<EmailDraft>>>,
    failure: Option<String>,
}

impl RecordingEmail {
    pub fn failing(message: &str) -> Self {
        Self { failure: Some(message.to_string()), ..Self::default() }
    }

    pub fn drafts(&self) -> Vec<EmailDraft> {
        locked(&self.drafts)
    }
}

#[async_trait]
impl EmailService for RecordingEmail {
    async fn create_draft(&self, draft: &EmailDraft) -> Result<(), IntegrationError> {
        if let Some(message) = &self.failure {
            return Err(IntegrationError::ActionFailed {
                service: "gmail".to_string(),
                action: "create_draft".to_string(),
                message: message.clone(),
            });
        }
        push(&self.drafts, draft.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingChat {
    messages: Arc<Mutex<Vec<ChatMessage>>>,
    failure: Option<String>,
}

impl RecordingChat {
    pub fn failing(message: &str) -> Self {
        Self { failure: Some(message.to_string()), ..Self::default() }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        locked(&self.messages)
    }
}

#[async_trait]
impl ChatService for RecordingChat {
    async fn post_message(&self, message: &ChatMessage) -> Result<(), IntegrationError> {
        if let Some(failure) = &self.failure {
            return Err(IntegrationError::rejected("slack", 200, failure.clone()));
        }
        push(&self.messages, message.clone());
        Ok(())
    }
}

pub struct StaticBroker;

#[async_trait]
impl ToolBroker for StaticBroker {
    async fn create_session(&self) -> Result<BrokerSession, IntegrationError> {
        Ok(BrokerSession {
            session_id: "trs_test".to_string(),
            mcp_url: "https://mcp.example.test/trs_test".to_string(),
            toolkits: vec!["googlesheets".to_string(), "gmail".to_string()],
        })
    }
}
