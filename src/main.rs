//! BCI CLI entry point.

use anyhow::Context;
use clap::Parser;

use bci::cli::{handle_error, Cli, Commands};
use bci::infrastructure::config::ConfigLoader;
use bci::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config.context("Failed to load configuration") {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => bci::cli::commands::run::execute(args, config, cli.json).await,
        Commands::Lineage(args) => bci::cli::commands::lineage::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
