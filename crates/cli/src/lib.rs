pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "hedgeflow",
    about = "Hedgeflow research workflow CLI",
    long_about = "Generate ticker research, append it to the research sheet, and alert the team when risk terms appear.",
    after_help = "Examples:\n  hedgeflow run --ticker NVDA\n  hedgeflow run --json\n  hedgeflow config\n  hedgeflow tools --refresh"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the research workflow for one ticker (prompts when omitted)")]
    Run {
        #[arg(long, short, help = "Ticker symbol, e.g. NVDA")]
        ticker: Option<String>,
        #[arg(long, help = "Emit the full run summary as JSON")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "List tools available for the configured toolkit whitelist")]
    Tools {
        #[arg(long, help = "Ignore the cached catalog and fetch again")]
        refresh: bool,
    },
    #[command(about = "Create a tool router session and print its MCP URL")]
    Session,
}

pub fn run() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { ticker, json } => commands::run::run(ticker, json),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Tools { refresh } => commands::tools::run(refresh),
        Command::Session => commands::session::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
