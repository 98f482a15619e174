use std::sync::Arc;

use hedgeflow_composio::ToolCatalog;
use serde_json::json;

use crate::commands::run::composio_client;
use crate::commands::{build_runtime, load_config, CommandResult};
use crate::logging;

const COMMAND: &str = "tools";

pub fn run(refresh: bool) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    logging::init(&config);

    let client = match composio_client(&config) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            return CommandResult::failure(COMMAND, "integration_setup", error.to_string(), 3)
        }
    };
    let catalog = ToolCatalog::new(
        client,
        &config.composio.toolkits,
        &config.composio.catalog_cache_path,
        config.composio.catalog_cache_ttl_secs,
    );

    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(catalog.tools(refresh)) {
        Ok(tools) => {
            let slugs: Vec<&str> = tools.iter().map(|tool| tool.slug.as_str()).collect();
            CommandResult::success_with_data(
                COMMAND,
                format!("{} tools across toolkits {}", tools.len(), catalog.cache_key()),
                Some(json!({ "toolkits": catalog.toolkits(), "tools": slugs })),
            )
        }
        Err(error) => CommandResult::failure(COMMAND, "tool_discovery", error.to_string(), 4),
    }
}
