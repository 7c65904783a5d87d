//! Baton: file-backed lock manager, preflight gate and handoff recorder.
//!
//! This is the main entry point for the `baton` CLI. It installs the
//! diagnostics subscriber, parses arguments, dispatches to the command
//! handlers, and maps the result to an exit code.

use baton::cli::Cli;
use baton::commands;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Diagnostics go to stderr so command output on stdout stays parseable.
    let filter = EnvFilter::try_from_env("BATON_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse_args();

    match commands::dispatch(cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
