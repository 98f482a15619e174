use std::io::{self, BufRead, Write};
use std::sync::Arc;

use hedgeflow_agent::build_generator;
use hedgeflow_composio::{ComposioClient, ComposioGmail, ComposioSheets, ComposioToolBroker};
use hedgeflow_core::config::AppConfig;
use hedgeflow_core::domain::record::Ticker;
use hedgeflow_core::domain::run::{RunResult, SheetStatus};
use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::notify::NotificationRouter;
use hedgeflow_core::ports::{BrokerSession, ToolBroker};
use hedgeflow_core::retry::RetryPolicy;
use hedgeflow_core::workflow::{ResearchWorkflow, WorkflowSettings};
use hedgeflow_slack::SlackWebClient;
use secrecy::SecretString;
use tracing::warn;

use crate::commands::{build_runtime, load_config, CommandResult};
use crate::logging;

const COMMAND: &str = "run";

pub fn run(ticker: Option<String>, json: bool) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let ticker = match resolve_ticker(ticker) {
        Ok(ticker) => ticker,
        Err(failure) => return failure,
    };

    let retry = match config.retry.policy() {
        Ok(retry) => retry,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            )
        }
    };

    logging::init(&config);

    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let outcome = runtime.block_on(async {
        let workflow = build_workflow(&config, retry)
            .map_err(|error| ("integration_setup", error.to_string(), 3u8))?;
        let workflow = match open_session(&config).await {
            Some(session) => workflow.with_session(session),
            None => workflow,
        };
        workflow.run(&ticker).await.map_err(|error| {
            (error.error_class(), format!("{} ({error})", error.user_message()), 4u8)
        })
    });

    match outcome {
        Ok(result) if json => match serde_json::to_value(&result) {
            Ok(data) => {
                CommandResult::success_with_data(COMMAND, summary_line(&result), Some(data))
            }
            Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 5),
        },
        Ok(result) => CommandResult { exit_code: 0, output: render_summary(&result) },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(COMMAND, error_class, message, exit_code)
        }
    }
}

fn resolve_ticker(ticker: Option<String>) -> Result<Ticker, CommandResult> {
    let invalid =
        || CommandResult::failure(COMMAND, "invalid_ticker", "a non-empty ticker symbol is required", 2);

    match ticker {
        Some(raw) => Ticker::parse(&raw).ok_or_else(invalid),
        None => {
            let stdin = io::stdin();
            let mut stderr = io::stderr();
            prompt_ticker(&mut stdin.lock(), &mut stderr)
                .map_err(|error| {
                    CommandResult::failure(COMMAND, "invalid_ticker", error.to_string(), 2)
                })?
                .ok_or_else(invalid)
        }
    }
}

/// Asks for a ticker on `output` and reads one line from `input`.
pub fn prompt_ticker<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<Ticker>> {
    write!(output, "Enter ticker symbol (e.g. NVDA): ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(Ticker::parse(&line))
}

fn build_workflow(
    config: &AppConfig,
    retry: RetryPolicy<IntegrationError>,
) -> Result<ResearchWorkflow, IntegrationError> {
    let generator = build_generator(&config.llm)?;
    let composio = Arc::new(composio_client(config)?);

    let gmail = ComposioGmail::new(
        Arc::clone(&composio),
        config.composio.gmail_account_id.clone().unwrap_or_default(),
    );
    let slack = SlackWebClient::new(&config.slack.api_base_url, config.slack.bot_token.clone())?;
    let router = NotificationRouter::new(
        config.notifications.settings(),
        Arc::new(gmail),
        Arc::new(slack),
    );

    let settings = WorkflowSettings {
        worksheet: config.sheets.worksheet.clone(),
        links: config.sheets.links(),
        risk_terms: config.notifications.risk_terms(),
        retry,
    };

    let workflow = ResearchWorkflow::new(generator, router, settings);
    let sheets = config
        .sheets
        .spreadsheet_id
        .as_ref()
        .zip(config.composio.sheets_account_id.as_ref())
        .map(|(spreadsheet_id, account_id)| {
            ComposioSheets::new(Arc::clone(&composio), spreadsheet_id.clone(), account_id.clone())
        });

    Ok(match sheets {
        Some(sheets) => workflow.with_spreadsheet(Arc::new(sheets)),
        None => workflow,
    })
}

pub(crate) fn composio_client(config: &AppConfig) -> Result<ComposioClient, IntegrationError> {
    let api_key: SecretString = config
        .composio
        .api_key
        .clone()
        .ok_or_else(|| IntegrationError::rejected("composio", 401, "composio.api_key is not configured"))?;
    ComposioClient::new(
        &config.composio.base_url,
        api_key,
        &config.composio.user_id,
        config.composio.timeout_secs,
    )
}

/// Session failures are logged; the run then reports no MCP URL.
async fn open_session(config: &AppConfig) -> Option<BrokerSession> {
    let client = match composio_client(config) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            warn!(event_name = "broker.session_skipped", error = %error, "tool router session unavailable");
            return None;
        }
    };
    let broker = ComposioToolBroker::new(client, config.composio.toolkits.clone());
    match broker.create_session().await {
        Ok(session) => Some(session),
        Err(error) => {
            warn!(event_name = "broker.session_failed", error = %error, "tool router session unavailable");
            None
        }
    }
}

fn sheet_status_label(status: SheetStatus) -> &'static str {
    match status {
        SheetStatus::Written => "written",
        SheetStatus::Skipped => "skipped",
        SheetStatus::Failed => "failed",
    }
}

fn summary_line(result: &RunResult) -> String {
    format!(
        "{}: {} rows, sheet {}, {} of {} notifications dispatched",
        result.ticker,
        result.row_count,
        sheet_status_label(result.sheet_status),
        result.dispatched_count(),
        result.notifications.len()
    )
}

/// Human readable run summary.
pub fn render_summary(result: &RunResult) -> String {
    let mut lines = vec![
        format!("research run {} for {} (provider: {})", result.run_id, result.ticker, result.provider),
        format!("- rows written = {}", result.row_count),
        format!("- sheet = {}", sheet_status_label(result.sheet_status)),
    ];
    if let Some(error) = &result.sheet_error {
        lines.push(format!("  sheet error: {error}"));
    }

    if result.risk_flagged {
        lines.push(format!("- risk terms = {}", result.matched_terms.join(", ")));
    } else {
        lines.push("- risk terms = none (notifications suppressed)".to_string());
    }

    for outcome in &result.notifications {
        if outcome.dispatched {
            lines.push(format!("- {} = dispatched", outcome.channel));
        } else {
            lines.push(format!("- {} = failed: {}", outcome.channel, outcome.reason));
        }
    }

    if let Some(mcp_url) = &result.mcp_url {
        lines.push(format!("- mcp url = {mcp_url}"));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::Utc;
    use hedgeflow_core::domain::record::Ticker;
    use hedgeflow_core::domain::run::{Channel, NotificationOutcome, RunResult, SheetStatus};

    use super::{prompt_ticker, render_summary, summary_line};

    fn result(risk_flagged: bool) -> RunResult {
        let now = Utc::now();
        RunResult {
            run_id: "run-1".to_string(),
            ticker: Ticker("NVDA".to_string()),
            provider: "gemini".to_string(),
            row_count: 4,
            sheet_status: SheetStatus::Failed,
            sheet_error: Some("composio rejected the request".to_string()),
            risk_flagged,
            matched_terms: if risk_flagged { vec!["debt".to_string()] } else { Vec::new() },
            notifications: if risk_flagged {
                vec![
                    NotificationOutcome::dispatched(Channel::Email, "body"),
                    NotificationOutcome::failed(Channel::Chat, "channel_not_found", "body"),
                ]
            } else {
                Vec::new()
            },
            mcp_url: Some("https://mcp.example.test/trs_1".to_string()),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn prompt_reads_and_normalizes_ticker() {
        let mut input = Cursor::new("  nvda \n");
        let mut output = Vec::new();

        let ticker = prompt_ticker(&mut input, &mut output).expect("io");

        assert_eq!(ticker, Some(Ticker("NVDA".to_string())));
        assert!(String::from_utf8_lossy(&output).contains("Enter ticker symbol"));
    }

    #[test]
    fn blank_prompt_yields_no_ticker() {
        let mut input = Cursor::new("\n");
        let mut output = Vec::new();
        assert_eq!(prompt_ticker(&mut input, &mut output).expect("io"), None);
    }

    #[test]
    fn summary_reports_each_channel() {
        let rendered = render_summary(&result(true));

        assert!(rendered.contains("- rows written = 4"));
        assert!(rendered.contains("- sheet = failed"));
        assert!(rendered.contains("- risk terms = debt"));
        assert!(rendered.contains("- email = dispatched"));
        assert!(rendered.contains("- chat = failed: channel_not_found"));
        assert!(rendered.contains("https://mcp.example.test/trs_1"));
    }

    #[test]
    fn summary_notes_suppressed_notifications() {
        let rendered = render_summary(&result(false));
        assert!(rendered.contains("notifications suppressed"));
        assert_eq!(summary_line(&result(false)), "NVDA: 4 rows, sheet failed, 0 of 0 notifications dispatched");
    }
}
