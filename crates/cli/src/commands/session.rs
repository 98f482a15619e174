use std::sync::Arc;

use hedgeflow_composio::ComposioToolBroker;
use hedgeflow_core::ports::ToolBroker;

use crate::commands::run::composio_client;
use crate::commands::{build_runtime, load_config, CommandResult};
use crate::logging;

const COMMAND: &str = "session";

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    logging::init(&config);

    let broker = match composio_client(&config) {
        Ok(client) => ComposioToolBroker::new(Arc::new(client), config.composio.toolkits.clone()),
        Err(error) => {
            return CommandResult::failure(COMMAND, "integration_setup", error.to_string(), 3)
        }
    };

    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(broker.create_session()) {
        Ok(session) => match serde_json::to_value(&session) {
            Ok(data) => CommandResult::success_with_data(
                COMMAND,
                format!("MCP URL: {}", session.mcp_url),
                Some(data),
            ),
            Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 5),
        },
        Err(error) => CommandResult::failure(COMMAND, "session_create", error.to_string(), 4),
    }
}
