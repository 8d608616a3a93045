//! Command-line interface.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigArgs;
use commands::run::RunArgs;
use commands::tasks::TasksArgs;

#[derive(Parser, Debug)]
#[command(name = "seer")]
#[command(about = "Seer - dreamer/coder refinement over grid puzzles", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to seer.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve a set of tasks
    Run(RunArgs),

    /// Configuration commands
    Config(ConfigArgs),

    /// Task file commands
    Tasks(TasksArgs),
}

/// Print an error the way the output mode expects and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "chain": chain,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_globals() {
        let cli = Cli::try_parse_from([
            "seer", "run", "--tasks", "data", "--task", "a", "--task", "b", "--workers", "3",
            "--workflow", "incremental", "--dry-run", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.task_ids, vec!["a", "b"]);
                assert_eq!(args.workers, Some(3));
                assert!(args.dry_run);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_workflow() {
        assert!(Cli::try_parse_from(["seer", "run", "--tasks", "d", "--workflow", "x"]).is_err());
    }
}
