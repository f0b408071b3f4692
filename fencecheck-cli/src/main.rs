//! fencecheck CLI -- network policy conformance runner

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;
use colored::Colorize;

use crate::cli::{Cli, Commands};
use crate::commands::LoadedConfig;
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = commands::load_config(cli.config.as_deref()).await;
    let general = loaded
        .as_ref()
        .map(|l| l.config.general.clone())
        .unwrap_or_default();

    if let Err(e) = logging::init_tracing(&general, cli.log_level.as_deref()) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(2);
    }

    tracing::debug!(command = ?cli.command, "fencecheck starting");

    let writer = OutputWriter::new(cli.output);
    if let Err(e) = dispatch(cli, loaded, &writer).await {
        tracing::debug!(error = %e, exit_code = e.exit_code(), "command failed");
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn dispatch(
    cli: Cli,
    loaded: Result<LoadedConfig, CliError>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match cli.command {
        Commands::Run(args) => commands::run::execute(args, loaded?, writer).await,
        Commands::List => commands::list::execute(loaded?, writer).await,
        Commands::Config(args) => {
            commands::config::execute(args, cli.config.as_deref(), writer).await
        }
    }
}
