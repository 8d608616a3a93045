//! `seer tasks`: inspect task files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Task;
use crate::infrastructure::tasks::load_tasks;

#[derive(Args, Debug)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub command: TasksCommand,
}

#[derive(Subcommand, Debug)]
pub enum TasksCommand {
    /// List tasks with their pair counts
    List {
        /// Directory of task JSON files, or a single task file
        #[arg(long, short = 't')]
        tasks: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct TaskRow {
    id: String,
    train: usize,
    test: usize,
    test_answers: bool,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    #[serde(skip)]
    tasks: Vec<Task>,
    rows: Vec<TaskRow>,
}

impl CommandOutput for ListOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\n{} task(s)",
            TableFormatter::new().format_tasks(&self.tasks),
            self.tasks.len()
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.rows).unwrap_or(serde_json::Value::Null)
    }
}

pub fn execute(args: &TasksArgs, json_mode: bool) -> Result<()> {
    match &args.command {
        TasksCommand::List { tasks } => {
            let loaded = load_tasks(tasks)
                .with_context(|| format!("Failed to load tasks from {}", tasks.display()))?;
            let rows = loaded
                .iter()
                .map(|t| TaskRow {
                    id: t.id.clone(),
                    train: t.train.len(),
                    test: t.test.len(),
                    test_answers: t.has_test_answers(),
                })
                .collect();
            output(&ListOutput { tasks: loaded, rows }, json_mode);
        }
    }
    Ok(())
}
