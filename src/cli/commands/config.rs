//! `seer config`: inspect the effective configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration
    Show,
    /// Validate the configuration and referenced files
    Validate,
}

#[derive(Debug, Serialize)]
struct ShowOutput<'a> {
    #[serde(flatten)]
    config: &'a Config,
}

impl CommandOutput for ShowOutput<'_> {
    fn to_human(&self) -> String {
        serde_yaml::to_string(self.config).unwrap_or_else(|e| format!("<unprintable: {e}>"))
    }
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    valid: bool,
    workflow: String,
    roles: Vec<String>,
    worker_count: usize,
    max_iterations: u32,
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        format!(
            "Configuration is valid\n  workflow: {}\n  roles: {}\n  workers: {}\n  max iterations: {}",
            self.workflow,
            self.roles.join(", "),
            self.worker_count,
            self.max_iterations
        )
    }
}

pub fn execute(args: &ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommand::Show => output(&ShowOutput { config }, json_mode),
        ConfigCommand::Validate => {
            ConfigLoader::validate(config).context("Configuration is invalid")?;
            output(
                &ValidateOutput {
                    valid: true,
                    workflow: format!("{:?}", config.workflow).to_lowercase(),
                    roles: config.roles.keys().cloned().collect(),
                    worker_count: config.worker_count,
                    max_iterations: config.max_iterations,
                },
                json_mode,
            );
        }
    }
    Ok(())
}
