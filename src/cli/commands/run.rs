//! `seer run`: solve a set of tasks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::adapters::llm::{AnthropicClient, MockLlmClient};
use crate::adapters::recorder::FsRecorder;
use crate::adapters::sandbox::PythonSandbox;
use crate::application::{Scheduler, TaskRunner};
use crate::cli::output::progress::{record_result, task_progress_bar};
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, SessionSummary, WorkflowKind};
use crate::domain::ports::{LlmClient, Recorder};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::tasks::load_tasks;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory of task JSON files, or a single task file
    #[arg(long, short = 't')]
    pub tasks: PathBuf,

    /// Only run the given task id (repeatable)
    #[arg(long = "task", value_name = "ID")]
    pub task_ids: Vec<String>,

    /// Number of concurrent workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Refine iterations after the investigate phase
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Directory that receives the session directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Workflow: default or incremental
    #[arg(long)]
    pub workflow: Option<WorkflowKind>,

    /// Use a scripted model client instead of the API
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(workflow) = self.workflow {
            config.workflow = workflow;
        }
    }
}

#[derive(Debug, Serialize)]
struct RunOutput {
    session_dir: PathBuf,
    #[serde(flatten)]
    summary: SessionSummary,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\nsession directory: {}",
            TableFormatter::new().format_summary(&self.summary),
            self.session_dir.display()
        )
    }
}

pub async fn execute(args: RunArgs, mut config: Config, json_mode: bool) -> Result<()> {
    args.apply(&mut config);
    ConfigLoader::validate(&config).context("Invalid run options")?;

    let mut tasks = load_tasks(&args.tasks)
        .with_context(|| format!("Failed to load tasks from {}", args.tasks.display()))?;
    if !args.task_ids.is_empty() {
        let missing: Vec<&String> = args
            .task_ids
            .iter()
            .filter(|id| !tasks.iter().any(|t| &t.id == *id))
            .collect();
        if !missing.is_empty() {
            bail!("Unknown task id(s): {missing:?}");
        }
        tasks.retain(|t| args.task_ids.contains(&t.id));
    }

    let client: Arc<dyn LlmClient> = if args.dry_run {
        info!("dry run: using scripted model client");
        Arc::new(MockLlmClient::dry_run(&config.sandbox.entry_point))
    } else {
        let client = AnthropicClient::new(&config.llm).context("Failed to create model client")?;
        if !client.has_api_key() {
            bail!("No API key configured: set llm.api_key, SEER_LLM__API_KEY or ANTHROPIC_API_KEY");
        }
        Arc::new(client)
    };
    let sandbox = PythonSandbox::from_config(&config.sandbox).context("Invalid sandbox entry point")?;
    let recorder = Arc::new(FsRecorder::create(&config.output_dir, &config).await?);
    let session_dir = recorder.root().to_path_buf();
    let session_id = recorder.session_id().to_string();
    let recorder: Arc<dyn Recorder> = recorder;

    let runner = TaskRunner::from_config(&config, client, Arc::new(sandbox), recorder.clone())
        .context("Failed to build task runner")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight tasks");
            let _ = shutdown_tx.send(true);
        }
    });

    let pb = task_progress_bar(tasks.len() as u64, json_mode);
    let progress_pb = pb.clone();
    let scheduler = Scheduler::new(Arc::new(runner), config.worker_count, session_id, recorder)
        .with_shutdown(shutdown_rx)
        .with_progress(Arc::new(move |result| record_result(&progress_pb, result)));

    let (summary, _submission) = scheduler.run(tasks).await;
    pb.finish_and_clear();

    output(
        &RunOutput {
            session_dir,
            summary,
        },
        json_mode,
    );
    Ok(())
}
