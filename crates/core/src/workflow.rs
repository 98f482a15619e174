use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::record::{ResearchRecord, Ticker, RESEARCH_COLUMNS};
use crate::domain::run::{Channel, NotificationOutcome, RunResult, SheetStatus};
use crate::errors::{IntegrationError, WorkflowError};
use crate::notify::{NotificationRouter, SheetLinks};
use crate::parse::parse_records;
use crate::ports::{BrokerSession, SpreadsheetService, TextGenerator};
use crate::retry::{self, RetryPolicy};
use crate::risk::RiskTerms;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Generate,
    Parse,
    Upload,
    Scan,
    Notify,
    Summarize,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Parse => "parse",
            Self::Upload => "upload",
            Self::Scan => "scan",
            Self::Notify => "notify",
            Self::Summarize => "summarize",
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorkflowSettings {
    pub worksheet: String,
    pub links: SheetLinks,
    pub risk_terms: RiskTerms,
    pub retry: RetryPolicy<IntegrationError>,
}

/// Prompt asking for the exact CSV schema `parse_records` consumes.
pub fn research_prompt(ticker: &Ticker) -> String {
    format!(
        "You are a hedge fund research analyst. Give a detailed financial and strategic \
         analysis of {ticker}.\n\
         Respond ONLY with CSV using exactly this header row:\n\
         {header}\n\
         Write one row per analysis section (for example Valuation, Growth, Balance Sheet, \
         Competition, Management). Quote any field that contains a comma. Do not add \
         commentary before or after the table.",
        header = RESEARCH_COLUMNS.join(",")
    )
}

/// Runs Generate, Parse, Upload, Scan, Notify and Summarize for one ticker.
///
/// Holds only shared, immutable collaborators, so independent runs may be
/// awaited concurrently.
pub struct ResearchWorkflow {
    generator: Arc<dyn TextGenerator>,
    sheets: Option<Arc<dyn SpreadsheetService>>,
    router: NotificationRouter,
    settings: WorkflowSettings,
    session: Option<BrokerSession>,
}

impl ResearchWorkflow {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        router: NotificationRouter,
        settings: WorkflowSettings,
    ) -> Self {
        Self { generator, sheets: None, router, settings, session: None }
    }

    pub fn with_spreadsheet(mut self, sheets: Arc<dyn SpreadsheetService>) -> Self {
        self.sheets = Some(sheets);
        self
    }

    pub fn with_session(mut self, session: BrokerSession) -> Self {
        self.session = Some(session);
        self
    }

    pub async fn run(&self, ticker: &Ticker) -> Result<RunResult, WorkflowError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            event_name = "workflow.run.start",
            correlation_id = %run_id,
            ticker = %ticker,
            provider = self.generator.name(),
            "starting research workflow"
        );
        if let Some(session) = &self.session {
            info!(
                event_name = "workflow.run.broker_session",
                correlation_id = %run_id,
                session_id = %session.session_id,
                mcp_url = %session.mcp_url,
                toolkits = ?session.toolkits,
                "tool broker session attached"
            );
        }

        let research_text = self.generate(ticker, &run_id).await?;

        let records = parse_records(&research_text, ticker).map_err(|parse_error| {
            error!(
                event_name = "workflow.parse.failed",
                correlation_id = %run_id,
                ticker = %ticker,
                error = %parse_error,
                "generation output could not be parsed; aborting before upload"
            );
            WorkflowError::from(parse_error)
        })?;
        self.log_step(WorkflowStep::Parse, &run_id, ticker);

        let upload = self.upload(&records, &run_id).await;
        self.log_step(WorkflowStep::Upload, &run_id, ticker);

        let matched_terms = self.settings.risk_terms.matches(&research_text);
        let risk_flagged = !matched_terms.is_empty();
        info!(
            event_name = "workflow.scan.completed",
            correlation_id = %run_id,
            ticker = %ticker,
            risk_flagged,
            matched_terms = ?matched_terms,
            "risk scan completed"
        );

        let notifications = match self
            .router
            .route(&research_text, &self.settings.links, ticker, risk_flagged)
            .await
        {
            Ok(outcomes) => outcomes,
            Err(route_error) => {
                warn!(
                    event_name = "workflow.notify.failed",
                    correlation_id = %run_id,
                    ticker = %ticker,
                    error = %route_error,
                    "notification building failed"
                );
                vec![NotificationOutcome::failed(
                    Channel::Email,
                    route_error.to_string(),
                    &research_text,
                )]
            }
        };
        self.log_step(WorkflowStep::Notify, &run_id, ticker);

        let result = RunResult {
            run_id,
            ticker: ticker.clone(),
            provider: self.generator.name().to_string(),
            row_count: upload.row_count,
            sheet_status: upload.status,
            sheet_error: upload.error,
            risk_flagged,
            matched_terms,
            notifications,
            mcp_url: self.session.as_ref().map(|session| session.mcp_url.clone()),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            event_name = "workflow.summarize.completed",
            correlation_id = %result.run_id,
            ticker = %ticker,
            row_count = result.row_count,
            sheet_status = ?result.sheet_status,
            dispatched = result.dispatched_count(),
            "research workflow finished"
        );

        Ok(result)
    }

    async fn generate(&self, ticker: &Ticker, run_id: &str) -> Result<String, WorkflowError> {
        let prompt = research_prompt(ticker);
        let prompt = prompt.as_str();
        let generator = &self.generator;

        let text = retry::execute(&self.settings.retry, move || generator.generate(prompt))
            .await
            .map_err(|retry_error| {
                error!(
                    event_name = "workflow.generate.failed",
                    correlation_id = %run_id,
                    ticker = %ticker,
                    error = %retry_error,
                    "research generation failed"
                );
                WorkflowError::from(retry_error)
            })?;
        self.log_step(WorkflowStep::Generate, run_id, ticker);
        Ok(text)
    }

    async fn upload(&self, records: &[ResearchRecord], run_id: &str) -> UploadOutcome {
        let Some(sheets) = &self.sheets else {
            return UploadOutcome { row_count: 0, status: SheetStatus::Skipped, error: None };
        };

        let result = match sheets.ensure_worksheet(&self.settings.worksheet).await {
            Ok(handle) => sheets.append_rows(&handle, records).await,
            Err(provision_error) => Err(provision_error),
        };

        match result {
            Ok(()) => UploadOutcome {
                row_count: records.len(),
                status: SheetStatus::Written,
                error: None,
            },
            Err(upload_error) => {
                warn!(
                    event_name = "workflow.upload.failed",
                    correlation_id = %run_id,
                    worksheet = %self.settings.worksheet,
                    error = %upload_error,
                    "spreadsheet write failed; continuing with scan and notify"
                );
                UploadOutcome {
                    row_count: 0,
                    status: SheetStatus::Failed,
                    error: Some(upload_error.to_string()),
                }
            }
        }
    }

    fn log_step(&self, step: WorkflowStep, run_id: &str, ticker: &Ticker) {
        info!(
            event_name = "workflow.step.completed",
            correlation_id = %run_id,
            ticker = %ticker,
            step = step.as_str(),
            "workflow step completed"
        );
    }
}

struct UploadOutcome {
    row_count: usize,
    status: SheetStatus,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{research_prompt, ResearchWorkflow, WorkflowSettings};
    use crate::domain::record::Ticker;
    use crate::domain::run::{Channel, SheetStatus};
    use crate::errors::{DomainError, IntegrationError, WorkflowError};
    use crate::notify::{NotificationRouter, NotificationSettings, SheetLinks};
    use crate::ports::ToolBroker;
    use crate::retry::{RetryError, RetryPolicy};
    use crate::risk::RiskTerms;
    use crate::testing::{
        RecordingChat, RecordingEmail, RecordingSheets, ScriptedGenerator, StaticBroker,
    };

    const NVDA_OUTPUT: &str =
        "Section,Insight,DataPoints,Risks,Opportunities\nValuation,Fairly priced,P/E 30,None,Upside\n";
    const RISKY_OUTPUT: &str = "Section,Insight,DataPoints,Risks,Opportunities\n\
        Regulation,Export limits,China 20% of sales,regulatory crackdown,Domestic demand\n\
        Growth,Data center boom,Rev +90%,Competition,Inference\n";

    struct Harness {
        generator: ScriptedGenerator,
        sheets: RecordingSheets,
        email: RecordingEmail,
        chat: RecordingChat,
        recipients: Vec<String>,
    }

    impl Harness {
        fn new(generator: ScriptedGenerator) -> Self {
            Self {
                generator,
                sheets: RecordingSheets::default(),
                email: RecordingEmail::default(),
                chat: RecordingChat::default(),
                recipients: vec!["lead@example.com".to_string(), "pm@example.com".to_string()],
            }
        }

        fn workflow(&self, max_attempts: u32) -> ResearchWorkflow {
            let router = NotificationRouter::new(
                NotificationSettings {
                    email_recipients: self.recipients.clone(),
                    chat_channel: "C0ALERTS".to_string(),
                },
                Arc::new(self.email.clone()),
                Arc::new(self.chat.clone()),
            );
            let settings = WorkflowSettings {
                worksheet: "Research".to_string(),
                links: SheetLinks {
                    view: Some("https://docs.google.com/spreadsheets/d/sheet-test".to_string()),
                    csv_export: Some(
                        "https://docs.google.com/spreadsheets/d/sheet-test/gviz/tq?tqx=out:csv&sheet=Research"
                            .to_string(),
                    ),
                },
                risk_terms: RiskTerms::new(["regulatory", "debt", "decline"]),
                retry: RetryPolicy::transient_upstream(max_attempts, Duration::ZERO, 2.0)
                    .expect("valid policy"),
            };
            ResearchWorkflow::new(Arc::new(self.generator.clone()), router, settings)
                .with_spreadsheet(Arc::new(self.sheets.clone()))
        }
    }

    fn ticker(value: &str) -> Ticker {
        Ticker::parse(value).expect("valid ticker")
    }

    #[test]
    fn prompt_requests_the_parser_schema() {
        let prompt = research_prompt(&ticker("NVDA"));
        assert!(prompt.contains("NVDA"));
        assert!(prompt.contains("Section,Insight,DataPoints,Risks,Opportunities"));
    }

    #[tokio::test]
    async fn nvda_scenario_writes_one_row_without_alerts() {
        let harness = Harness::new(ScriptedGenerator::text(NVDA_OUTPUT));

        let result = harness.workflow(3).run(&ticker("NVDA")).await.expect("run succeeds");

        assert_eq!(result.row_count, 1);
        assert_eq!(result.sheet_status, SheetStatus::Written);
        assert!(!result.risk_flagged);
        assert!(result.matched_terms.is_empty());
        assert!(result.notifications.is_empty());
        assert_eq!(harness.sheets.worksheets(), ["Research"]);
        assert_eq!(harness.sheets.appended()[0].section, "Valuation");
        assert_eq!(harness.sheets.appended()[0].ticker, ticker("NVDA"));
        assert!(harness.email.drafts().is_empty());
        assert!(harness.chat.messages().is_empty());
    }

    #[tokio::test]
    async fn risky_output_notifies_email_then_chat() {
        let harness = Harness::new(ScriptedGenerator::text(RISKY_OUTPUT));

        let result = harness.workflow(3).run(&ticker("NVDA")).await.expect("run succeeds");

        assert_eq!(result.row_count, 2);
        assert!(result.risk_flagged);
        assert_eq!(result.matched_terms, ["regulatory"]);
        let channels: Vec<_> = result.notifications.iter().map(|outcome| outcome.channel).collect();
        assert_eq!(channels, [Channel::Email, Channel::Chat]);
        assert_eq!(result.dispatched_count(), 2);
        let drafts = harness.email.drafts();
        assert!(drafts[0].body.contains("Google Sheet: https://docs.google.com"));
        assert_eq!(drafts[0].attachments[0].title, "NVDA_analysis.csv");
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let generator = ScriptedGenerator::new(vec![
            Err(IntegrationError::unavailable("gemini", "503 overloaded")),
            Err(IntegrationError::unavailable("gemini", "503 overloaded")),
            Ok(NVDA_OUTPUT.to_string()),
        ]);
        let harness = Harness::new(generator);

        let result = harness.workflow(3).run(&ticker("NVDA")).await.expect("third attempt wins");

        assert_eq!(result.row_count, 1);
        assert_eq!(harness.generator.prompts().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_generation_is_the_terminal_error() {
        let generator =
            ScriptedGenerator::new(vec![Err(IntegrationError::unavailable("gemini", "503"))]);
        let harness = Harness::new(generator);

        let error = harness.workflow(2).run(&ticker("NVDA")).await.expect_err("run fails");

        assert!(matches!(error, WorkflowError::Generation(RetryError::Exhausted { attempts: 2, .. })));
        assert!(harness.sheets.appended().is_empty());
    }

    #[tokio::test]
    async fn rejected_generation_is_not_retried() {
        let generator =
            ScriptedGenerator::new(vec![Err(IntegrationError::rejected("gemini", 400, "bad"))]);
        let harness = Harness::new(generator);

        let error = harness.workflow(5).run(&ticker("NVDA")).await.expect_err("run fails");

        assert_eq!(error.error_class(), "generation_rejected");
        assert_eq!(harness.generator.prompts().len(), 1);
    }

    #[tokio::test]
    async fn malformed_output_aborts_without_partial_write() {
        let harness = Harness::new(ScriptedGenerator::text("Sorry, I cannot provide that."));

        let error = harness.workflow(3).run(&ticker("NVDA")).await.expect_err("run fails");

        assert!(matches!(error, WorkflowError::Parse(DomainError::MalformedOutput { .. })));
        assert!(harness.sheets.worksheets().is_empty());
        assert!(harness.email.drafts().is_empty());
    }

    #[tokio::test]
    async fn sheet_failure_still_scans_and_notifies() {
        let mut harness = Harness::new(ScriptedGenerator::text(RISKY_OUTPUT));
        harness.sheets =
            RecordingSheets::failing_append(IntegrationError::rejected("googlesheets", 403, "denied"));

        let result = harness.workflow(3).run(&ticker("NVDA")).await.expect("run completes");

        assert_eq!(result.sheet_status, SheetStatus::Failed);
        assert_eq!(result.row_count, 0);
        assert!(result.sheet_error.as_deref().is_some_and(|message| message.contains("403")));
        assert_eq!(result.notifications.len(), 2);
    }

    #[tokio::test]
    async fn missing_spreadsheet_is_skipped() {
        let harness = Harness::new(ScriptedGenerator::text(NVDA_OUTPUT));
        let router = NotificationRouter::new(
            NotificationSettings {
                email_recipients: harness.recipients.clone(),
                chat_channel: "C0ALERTS".to_string(),
            },
            Arc::new(harness.email.clone()),
            Arc::new(harness.chat.clone()),
        );
        let settings = WorkflowSettings {
            worksheet: "Research".to_string(),
            links: SheetLinks::default(),
            risk_terms: RiskTerms::defaults(),
            retry: RetryPolicy::transient_upstream(1, Duration::ZERO, 2.0).expect("valid policy"),
        };
        let workflow =
            ResearchWorkflow::new(Arc::new(harness.generator.clone()), router, settings);

        let result = workflow.run(&ticker("NVDA")).await.expect("run completes");

        assert_eq!(result.sheet_status, SheetStatus::Skipped);
        assert_eq!(result.row_count, 0);
    }

    #[tokio::test]
    async fn invalid_recipients_become_a_failed_outcome() {
        let mut harness = Harness::new(ScriptedGenerator::text(RISKY_OUTPUT));
        harness.recipients.clear();

        let result = harness.workflow(3).run(&ticker("NVDA")).await.expect("run completes");

        assert_eq!(result.sheet_status, SheetStatus::Written);
        assert_eq!(result.notifications.len(), 1);
        assert!(!result.notifications[0].dispatched);
        assert!(result.notifications[0].reason.contains("recipient"));
    }

    #[tokio::test]
    async fn broker_session_url_is_reported() {
        let harness = Harness::new(ScriptedGenerator::text(NVDA_OUTPUT));
        let session = StaticBroker.create_session().await.expect("session");

        let result = harness
            .workflow(3)
            .with_session(session)
            .run(&ticker("NVDA"))
            .await
            .expect("run succeeds");

        assert_eq!(result.mcp_url.as_deref(), Some("https://mcp.example.test/trs_test"));
    }

    #[tokio::test]
    async fn independent_runs_can_share_one_workflow() {
        let harness = Harness::new(ScriptedGenerator::text(NVDA_OUTPUT));
        let workflow = harness.workflow(3);
        let nvda = ticker("NVDA");
        let googl = ticker("googl");

        let (first, second) = tokio::join!(workflow.run(&nvda), workflow.run(&googl));

        let first = first.expect("first run");
        let second = second.expect("second run");
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(second.ticker.as_str(), "GOOGL");
        assert_eq!(harness.sheets.appended().len(), 2);
    }
}
