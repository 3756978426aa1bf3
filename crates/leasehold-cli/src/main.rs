use std::process::ExitCode;

use clap::Parser;
use leasehold_cli::cli::Cli;
use leasehold_cli::commands::{self, EXIT_FAILURE};
use leasehold_cli::logging::{LoggingConfig, init_logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file output is flushed on exit
    let _logging_guard = match init_logging(&LoggingConfig::from_env(&cli.log_level)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    leasehold_lock::metrics::describe_metrics();

    ExitCode::from(commands::execute(cli, &mut std::io::stdout()).await)
}
