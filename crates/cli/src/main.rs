use std::process::ExitCode;

fn main() -> ExitCode {
    hedgeflow_cli::run()
}
