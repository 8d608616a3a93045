//! Seer CLI entry point.

use anyhow::Context;
use clap::Parser;

use seer::cli::{Cli, Commands};
use seer::infrastructure::config::ConfigLoader;
use seer::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => seer::cli::handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging))
        .context("Failed to initialize logging")
    {
        Ok(logger) => logger,
        Err(err) => seer::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => seer::cli::commands::run::execute(args, config, cli.json).await,
        Commands::Config(args) => seer::cli::commands::config::execute(&args, &config, cli.json),
        Commands::Tasks(args) => seer::cli::commands::tasks::execute(&args, cli.json),
    };

    if let Err(err) = result {
        seer::cli::handle_error(err, cli.json);
    }
}
