use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::IntegrationError;
use crate::notify::{NotificationSettings, SheetLinks};
use crate::retry::RetryPolicy;
use crate::risk::{RiskTerms, DEFAULT_RISK_TERMS};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub composio: ComposioConfig,
    pub sheets: SheetsConfig,
    pub slack: SlackConfig,
    pub notifications: NotificationConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    /// Endpoint of an OpenAI-compatible gateway (e.g. a LiteLLM proxy).
    pub openai_base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ComposioConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub user_id: String,
    pub sheets_account_id: Option<String>,
    pub gmail_account_id: Option<String>,
    pub toolkits: Vec<String>,
    pub catalog_cache_path: PathBuf,
    pub catalog_cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub worksheet: String,
    pub share_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub email_recipients: Vec<String>,
    pub chat_channel: String,
    pub risk_terms: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    OpenaiCompatible,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub composio_api_key: Option<String>,
    pub gmail_account_id: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub slack_bot_token: Option<String>,
    pub email_recipients: Option<Vec<String>>,
    pub chat_channel: Option<String>,
    pub retry_max_attempts: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                model: "gemini-2.0-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                openai_base_url: None,
                timeout_secs: 60,
            },
            composio: ComposioConfig {
                api_key: None,
                base_url: "https://backend.composio.dev".to_string(),
                user_id: "hedgeflow-operator".to_string(),
                sheets_account_id: None,
                gmail_account_id: None,
                toolkits: ["googlesheets", "googledocs", "gmail", "slack", "serpapi", "alpha_vantage"]
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                catalog_cache_path: PathBuf::from(".hedgeflow/tool_catalog.json"),
                catalog_cache_ttl_secs: 3600,
                timeout_secs: 30,
            },
            sheets: SheetsConfig {
                spreadsheet_id: None,
                worksheet: "Research".to_string(),
                share_url: None,
            },
            slack: SlackConfig {
                bot_token: String::new().into(),
                api_base_url: "https://slack.com/api".to_string(),
            },
            notifications: NotificationConfig {
                email_recipients: Vec::new(),
                chat_channel: String::new(),
                risk_terms: DEFAULT_RISK_TERMS.iter().map(|term| term.to_string()).collect(),
            },
            retry: RetryConfig { max_attempts: 4, base_delay_ms: 2_000, multiplier: 2.0 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai_compatible" | "litellm" => Ok(Self::OpenaiCompatible),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|openai_compatible)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl SheetsConfig {
    /// Link shared in notifications: the explicit share URL, else one derived
    /// from the spreadsheet id.
    pub fn sheet_link(&self) -> Option<String> {
        self.share_url.clone().or_else(|| {
            self.spreadsheet_id
                .as_ref()
                .map(|id| format!("https://docs.google.com/spreadsheets/d/{id}"))
        })
    }

    /// CSV download of the research worksheet, attached to email drafts.
    pub fn csv_export_url(&self) -> Option<String> {
        let worksheet = self.worksheet.trim().replace(' ', "%20");
        self.spreadsheet_id.as_ref().map(|id| {
            format!("https://docs.google.com/spreadsheets/d/{id}/gviz/tq?tqx=out:csv&sheet={worksheet}")
        })
    }

    pub fn links(&self) -> SheetLinks {
        SheetLinks { view: self.sheet_link(), csv_export: self.csv_export_url() }
    }
}

impl NotificationConfig {
    pub fn settings(&self) -> NotificationSettings {
        NotificationSettings {
            email_recipients: self.email_recipients.clone(),
            chat_channel: self.chat_channel.clone(),
        }
    }

    pub fn risk_terms(&self) -> RiskTerms {
        RiskTerms::new(&self.risk_terms)
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy<IntegrationError>, ConfigError> {
        RetryPolicy::transient_upstream(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.multiplier,
        )
        .map_err(|error| ConfigError::Validation(format!("retry: {error}")))
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("hedgeflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(openai_base_url) = llm.openai_base_url {
                self.llm.openai_base_url = Some(openai_base_url);
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(composio) = patch.composio {
            if let Some(composio_api_key_value) = composio.api_key {
                self.composio.api_key = Some(secret_value(composio_api_key_value));
            }
            if let Some(base_url) = composio.base_url {
                self.composio.base_url = base_url;
            }
            if let Some(user_id) = composio.user_id {
                self.composio.user_id = user_id;
            }
            if let Some(sheets_account_id) = composio.sheets_account_id {
                self.composio.sheets_account_id = Some(sheets_account_id);
            }
            if let Some(gmail_account_id) = composio.gmail_account_id {
                self.composio.gmail_account_id = Some(gmail_account_id);
            }
            if let Some(toolkits) = composio.toolkits {
                self.composio.toolkits = toolkits;
            }
            if let Some(catalog_cache_path) = composio.catalog_cache_path {
                self.composio.catalog_cache_path = catalog_cache_path;
            }
            if let Some(catalog_cache_ttl_secs) = composio.catalog_cache_ttl_secs {
                self.composio.catalog_cache_ttl_secs = catalog_cache_ttl_secs;
            }
            if let Some(timeout_secs) = composio.timeout_secs {
                self.composio.timeout_secs = timeout_secs;
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(spreadsheet_id) = sheets.spreadsheet_id {
                self.sheets.spreadsheet_id = Some(spreadsheet_id);
            }
            if let Some(worksheet) = sheets.worksheet {
                self.sheets.worksheet = worksheet;
            }
            if let Some(share_url) = sheets.share_url {
                self.sheets.share_url = Some(share_url);
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(slack_bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(slack_bot_token_value);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(email_recipients) = notifications.email_recipients {
                self.notifications.email_recipients = email_recipients;
            }
            if let Some(chat_channel) = notifications.chat_channel {
                self.notifications.chat_channel = chat_channel;
            }
            if let Some(risk_terms) = notifications.risk_terms {
                self.notifications.risk_terms = risk_terms;
            }
        }

        if let Some(retry) = patch.retry {
            if let Some(max_attempts) = retry.max_attempts {
                self.retry.max_attempts = max_attempts;
            }
            if let Some(base_delay_ms) = retry.base_delay_ms {
                self.retry.base_delay_ms = base_delay_ms;
            }
            if let Some(multiplier) = retry.multiplier {
                self.retry.multiplier = multiplier;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HEDGEFLOW_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let llm_api_key = read_env("HEDGEFLOW_LLM_API_KEY").or_else(|| read_env("GEMINI_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("HEDGEFLOW_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("HEDGEFLOW_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("HEDGEFLOW_LLM_OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(value);
        }
        if let Some(value) = read_env("HEDGEFLOW_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("HEDGEFLOW_LLM_TIMEOUT_SECS", &value)?;
        }

        let composio_api_key =
            read_env("HEDGEFLOW_COMPOSIO_API_KEY").or_else(|| read_env("COMPOSIO_API_KEY"));
        if let Some(value) = composio_api_key {
            self.composio.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("HEDGEFLOW_COMPOSIO_BASE_URL") {
            self.composio.base_url = value;
        }
        if let Some(value) = read_env("HEDGEFLOW_COMPOSIO_USER_ID") {
            self.composio.user_id = value;
        }
        if let Some(value) = read_env("HEDGEFLOW_COMPOSIO_SHEETS_ACCOUNT_ID") {
            self.composio.sheets_account_id = Some(value);
        }
        if let Some(value) = read_env("HEDGEFLOW_COMPOSIO_GMAIL_ACCOUNT_ID") {
            self.composio.gmail_account_id = Some(value);
        }
        if let Some(value) = read_env("HEDGEFLOW_COMPOSIO_TOOLKITS") {
            self.composio.toolkits = split_list(&value);
        }
        if let Some(value) = read_env("HEDGEFLOW_COMPOSIO_CATALOG_CACHE_PATH") {
            self.composio.catalog_cache_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("HEDGEFLOW_COMPOSIO_CATALOG_CACHE_TTL_SECS") {
            self.composio.catalog_cache_ttl_secs =
                parse_u64("HEDGEFLOW_COMPOSIO_CATALOG_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("HEDGEFLOW_COMPOSIO_TIMEOUT_SECS") {
            self.composio.timeout_secs = parse_u64("HEDGEFLOW_COMPOSIO_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HEDGEFLOW_SHEETS_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = Some(value);
        }
        if let Some(value) = read_env("HEDGEFLOW_SHEETS_WORKSHEET") {
            self.sheets.worksheet = value;
        }
        if let Some(value) = read_env("HEDGEFLOW_SHEETS_SHARE_URL") {
            self.sheets.share_url = Some(value);
        }

        if let Some(value) = read_env("HEDGEFLOW_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("HEDGEFLOW_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }

        if let Some(value) = read_env("HEDGEFLOW_NOTIFY_EMAIL_RECIPIENTS") {
            self.notifications.email_recipients = split_list(&value);
        }
        if let Some(value) = read_env("HEDGEFLOW_NOTIFY_CHAT_CHANNEL") {
            self.notifications.chat_channel = value;
        }
        if let Some(value) = read_env("HEDGEFLOW_NOTIFY_RISK_TERMS") {
            self.notifications.risk_terms = split_list(&value);
        }

        if let Some(value) = read_env("HEDGEFLOW_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_u32("HEDGEFLOW_RETRY_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("HEDGEFLOW_RETRY_BASE_DELAY_MS") {
            self.retry.base_delay_ms = parse_u64("HEDGEFLOW_RETRY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("HEDGEFLOW_RETRY_MULTIPLIER") {
            self.retry.multiplier = parse_f64("HEDGEFLOW_RETRY_MULTIPLIER", &value)?;
        }

        let log_level =
            read_env("HEDGEFLOW_LOGGING_LEVEL").or_else(|| read_env("HEDGEFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HEDGEFLOW_LOGGING_FORMAT").or_else(|| read_env("HEDGEFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(composio_api_key) = overrides.composio_api_key {
            self.composio.api_key = Some(secret_value(composio_api_key));
        }
        if let Some(gmail_account_id) = overrides.gmail_account_id {
            self.composio.gmail_account_id = Some(gmail_account_id);
        }
        if let Some(spreadsheet_id) = overrides.spreadsheet_id {
            self.sheets.spreadsheet_id = Some(spreadsheet_id);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(email_recipients) = overrides.email_recipients {
            self.notifications.email_recipients = email_recipients;
        }
        if let Some(chat_channel) = overrides.chat_channel {
            self.notifications.chat_channel = chat_channel;
        }
        if let Some(max_attempts) = overrides.retry_max_attempts {
            self.retry.max_attempts = max_attempts;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_composio(&self.composio, &self.sheets)?;
        validate_slack(&self.slack)?;
        validate_notifications(&self.notifications)?;
        validate_retry(&self.retry)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("hedgeflow.toml"), PathBuf::from("config/hedgeflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    // The Gemini client is the fallback for every provider choice, so its key
    // is always required.
    let missing =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "llm.api_key is required. Set HEDGEFLOW_LLM_API_KEY or GEMINI_API_KEY (https://aistudio.google.com/apikey)"
                .to_string(),
        ));
    }

    validate_http_url("llm.base_url", &llm.base_url)?;
    if let Some(openai_base_url) = &llm.openai_base_url {
        validate_http_url("llm.openai_base_url", openai_base_url)?;
    }

    Ok(())
}

fn validate_composio(composio: &ComposioConfig, sheets: &SheetsConfig) -> Result<(), ConfigError> {
    let missing_key = composio
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "composio.api_key is required. Set HEDGEFLOW_COMPOSIO_API_KEY or COMPOSIO_API_KEY"
                .to_string(),
        ));
    }

    validate_http_url("composio.base_url", &composio.base_url)?;

    if composio.gmail_account_id.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        return Err(ConfigError::Validation(
            "composio.gmail_account_id is required to create email drafts".to_string(),
        ));
    }

    if sheets.spreadsheet_id.is_some() && composio.sheets_account_id.is_none() {
        return Err(ConfigError::Validation(
            "composio.sheets_account_id is required when sheets.spreadsheet_id is set".to_string(),
        ));
    }

    if sheets.worksheet.trim().is_empty() {
        return Err(ConfigError::Validation("sheets.worksheet must not be empty".to_string()));
    }

    if composio.timeout_secs == 0 || composio.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "composio.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    validate_http_url("slack.api_base_url", &slack.api_base_url)
}

fn validate_notifications(notifications: &NotificationConfig) -> Result<(), ConfigError> {
    if notifications.email_recipients.is_empty() {
        return Err(ConfigError::Validation(
            "notifications.email_recipients needs at least one address".to_string(),
        ));
    }
    if let Some(bad) = notifications.email_recipients.iter().find(|address| !address.contains('@'))
    {
        return Err(ConfigError::Validation(format!(
            "notifications.email_recipients contains an invalid address `{bad}`"
        )));
    }
    if notifications.chat_channel.trim().is_empty() {
        return Err(ConfigError::Validation(
            "notifications.chat_channel is required (Slack channel id, e.g. C0123456789)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_retry(retry: &RetryConfig) -> Result<(), ConfigError> {
    if retry.max_attempts == 0 || retry.max_attempts > 10 {
        return Err(ConfigError::Validation(
            "retry.max_attempts must be in range 1..=10".to_string(),
        ));
    }
    if !retry.multiplier.is_finite() || retry.multiplier <= 1.0 {
        return Err(ConfigError::Validation(
            "retry.multiplier must be greater than 1".to_string(),
        ));
    }
    if retry.base_delay_ms > 60_000 {
        return Err(ConfigError::Validation(
            "retry.base_delay_ms must be at most 60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    composio: Option<ComposioPatch>,
    sheets: Option<SheetsPatch>,
    slack: Option<SlackPatch>,
    notifications: Option<NotificationPatch>,
    retry: Option<RetryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    openai_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ComposioPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    user_id: Option<String>,
    sheets_account_id: Option<String>,
    gmail_account_id: Option<String>,
    toolkits: Option<Vec<String>>,
    catalog_cache_path: Option<PathBuf>,
    catalog_cache_ttl_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    spreadsheet_id: Option<String>,
    worksheet: Option<String>,
    share_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    email_recipients: Option<Vec<String>>,
    chat_channel: Option<String>,
    risk_terms: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RetryPatch {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    multiplier: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
