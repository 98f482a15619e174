use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hedgeflow_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries = vec![
        entry("llm.provider", format!("{:?}", config.llm.provider), &["HEDGEFLOW_LLM_PROVIDER"]),
        entry("llm.model", config.llm.model.clone(), &["HEDGEFLOW_LLM_MODEL"]),
        entry("llm.base_url", config.llm.base_url.clone(), &["HEDGEFLOW_LLM_BASE_URL"]),
        entry(
            "llm.openai_base_url",
            config.llm.openai_base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["HEDGEFLOW_LLM_OPENAI_BASE_URL"],
        ),
        entry(
            "llm.api_key",
            redact_optional(config.llm.api_key.as_ref()),
            &["HEDGEFLOW_LLM_API_KEY", "GEMINI_API_KEY"],
        ),
        entry("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["HEDGEFLOW_LLM_TIMEOUT_SECS"]),
        entry(
            "composio.api_key",
            redact_optional(config.composio.api_key.as_ref()),
            &["HEDGEFLOW_COMPOSIO_API_KEY", "COMPOSIO_API_KEY"],
        ),
        entry("composio.base_url", config.composio.base_url.clone(), &["HEDGEFLOW_COMPOSIO_BASE_URL"]),
        entry("composio.user_id", config.composio.user_id.clone(), &["HEDGEFLOW_COMPOSIO_USER_ID"]),
        entry(
            "composio.sheets_account_id",
            unset_or(config.composio.sheets_account_id.as_deref()),
            &["HEDGEFLOW_COMPOSIO_SHEETS_ACCOUNT_ID"],
        ),
        entry(
            "composio.gmail_account_id",
            unset_or(config.composio.gmail_account_id.as_deref()),
            &["HEDGEFLOW_COMPOSIO_GMAIL_ACCOUNT_ID"],
        ),
        entry("composio.toolkits", config.composio.toolkits.join(","), &["HEDGEFLOW_COMPOSIO_TOOLKITS"]),
        entry(
            "composio.catalog_cache_path",
            config.composio.catalog_cache_path.display().to_string(),
            &["HEDGEFLOW_COMPOSIO_CATALOG_CACHE_PATH"],
        ),
        entry(
            "composio.catalog_cache_ttl_secs",
            config.composio.catalog_cache_ttl_secs.to_string(),
            &["HEDGEFLOW_COMPOSIO_CATALOG_CACHE_TTL_SECS"],
        ),
        entry(
            "sheets.spreadsheet_id",
            unset_or(config.sheets.spreadsheet_id.as_deref()),
            &["HEDGEFLOW_SHEETS_SPREADSHEET_ID"],
        ),
        entry("sheets.worksheet", config.sheets.worksheet.clone(), &["HEDGEFLOW_SHEETS_WORKSHEET"]),
        entry(
            "sheets.share_url",
            unset_or(config.sheets.share_url.as_deref()),
            &["HEDGEFLOW_SHEETS_SHARE_URL"],
        ),
        entry(
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            &["HEDGEFLOW_SLACK_BOT_TOKEN"],
        ),
        entry("slack.api_base_url", config.slack.api_base_url.clone(), &["HEDGEFLOW_SLACK_API_BASE_URL"]),
        entry(
            "notifications.email_recipients",
            config.notifications.email_recipients.join(","),
            &["HEDGEFLOW_NOTIFY_EMAIL_RECIPIENTS"],
        ),
        entry(
            "notifications.chat_channel",
            config.notifications.chat_channel.clone(),
            &["HEDGEFLOW_NOTIFY_CHAT_CHANNEL"],
        ),
        entry(
            "notifications.risk_terms",
            config.notifications.risk_terms.join(","),
            &["HEDGEFLOW_NOTIFY_RISK_TERMS"],
        ),
        entry("retry.max_attempts", config.retry.max_attempts.to_string(), &["HEDGEFLOW_RETRY_MAX_ATTEMPTS"]),
        entry("retry.base_delay_ms", config.retry.base_delay_ms.to_string(), &["HEDGEFLOW_RETRY_BASE_DELAY_MS"]),
        entry("retry.multiplier", config.retry.multiplier.to_string(), &["HEDGEFLOW_RETRY_MULTIPLIER"]),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["HEDGEFLOW_LOGGING_LEVEL", "HEDGEFLOW_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["HEDGEFLOW_LOGGING_FORMAT", "HEDGEFLOW_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("hedgeflow.toml"), PathBuf::from("config/hedgeflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|env_key| env::var_os(env_key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn entry(
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
) -> (&'static str, String, &'static [&'static str]) {
    (key, value, env_keys)
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn unset_or(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) => redact_token(secret.expose_secret()),
        None => "<unset>".to_string(),
    }
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("xoxb-123-456"), "xoxb-***");
        assert_eq!(redact_token("AIzaSyExample"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_toml() {
        let doc: toml::Value = "[sheets]\nworksheet = \"Research\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "sheets.worksheet"));
        assert!(!contains_path(&doc, "sheets.spreadsheet_id"));
    }
}
