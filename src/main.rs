//! Cutover CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use cutover::cli::{Cli, CommandDispatcher};
use cutover::config::{resolve_data_dir, ToolConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("cutover=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cutover=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("Cutover starting with args: {:?}", cli);

    let config = match ToolConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    let data_dir = resolve_data_dir(cli.data_dir.as_deref());

    let dispatcher = CommandDispatcher::new(config, data_dir);

    match dispatcher.dispatch(&cli) {
        Ok(exit_code) => ExitCode::from(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}
