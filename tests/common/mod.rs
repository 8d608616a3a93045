//! Common test utilities for integration tests
//!
//! Shared fixtures: grids and tasks, scripted model replies, a rule-driven
//! fake sandbox and runner wiring with fast retry and rate-limit settings.

#![allow(dead_code)]

use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use seer::application::TaskRunner;
use seer::domain::errors::{LlmError, SandboxError};
use seer::domain::models::{
    Config, ExamplePair, ExampleResult, Grid, Task, TokenUsage,
};
use seer::domain::ports::{CodeSandbox, LlmClient, LlmResponse, NullRecorder};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Initialize a tracing subscriber that writes through the test harness.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// True when a `python3` interpreter can be started.
pub fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

pub fn grid(rows: &[&[i64]]) -> Grid {
    Grid(rows.iter().map(|r| r.to_vec()).collect())
}

/// Two training pairs whose rule is "add one to every cell", plus one
/// unlabeled test input.
pub fn add_one_task(id: &str) -> Task {
    Task::new(
        id,
        vec![
            ExamplePair::new(grid(&[&[0, 0], &[0, 0]]), grid(&[&[1, 1], &[1, 1]])),
            ExamplePair::new(grid(&[&[2]]), grid(&[&[3]])),
        ],
        vec![ExamplePair::unlabeled(grid(&[&[5, 6]]))],
    )
}

/// Same as [`add_one_task`] but the test pair carries its answer.
pub fn add_one_task_with_answers(id: &str) -> Task {
    let mut task = add_one_task(id);
    task.test = vec![ExamplePair::new(grid(&[&[5, 6]]), grid(&[&[6, 7]]))];
    task
}

/// Python source tagged with a rule the fake sandbox understands.
pub fn code_for(rule: &str) -> String {
    let body = match rule {
        "add_one" => "    return [[c + 1 for c in row] for row in grid]",
        "identity" => "    return grid",
        "ones" => "    return [[1 for _ in row] for row in grid]",
        "raise" => "    raise ValueError('bad rule')",
        "hang" => "    while True:\n        pass",
        _ => "    return [[0]]",
    };
    format!("# rule: {rule}\ndef transform(grid):\n{body}\n")
}

pub fn usage(input: u64, output: u64) -> TokenUsage {
    TokenUsage {
        input_tokens: input,
        output_tokens: output,
    }
}

/// Dreamer-style reply without code.
pub fn prose_reply(text: &str) -> Result<LlmResponse, LlmError> {
    Ok(LlmResponse::text(text, usage(100, 20)))
}

/// Coder-style reply with one python block implementing `rule`.
pub fn code_reply(rule: &str) -> Result<LlmResponse, LlmError> {
    Ok(LlmResponse::text(
        format!("Here is the code.\n\n```python\n{}```\n", code_for(rule)),
        usage(120, 60),
    ))
}

/// Sandbox that reads the `# rule:` tag instead of running Python.
#[derive(Default)]
pub struct RuleSandbox {
    runs: AtomicUsize,
}

impl RuleSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeSandbox for RuleSandbox {
    async fn run(
        &self,
        code: &str,
        pairs: &[ExamplePair],
        timeout: Duration,
    ) -> Result<Vec<ExampleResult>, SandboxError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let rule = code
            .lines()
            .find_map(|l| l.strip_prefix("# rule: "))
            .ok_or_else(|| SandboxError::Parse("no rule tag".to_string()))?
            .trim()
            .to_string();

        if rule == "hang" {
            return Err(SandboxError::Timeout {
                secs: timeout.as_secs(),
            });
        }

        Ok(pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| match rule.as_str() {
                "add_one" => {
                    let out = Grid(
                        pair.input
                            .rows()
                            .iter()
                            .map(|r| r.iter().map(|c| c + 1).collect())
                            .collect(),
                    );
                    ExampleResult::evaluated(i, pair, out, String::new())
                }
                "identity" => ExampleResult::evaluated(i, pair, pair.input.clone(), String::new()),
                "ones" => {
                    let out = Grid(
                        pair.input
                            .rows()
                            .iter()
                            .map(|r| vec![1; r.len()])
                            .collect(),
                    );
                    ExampleResult::evaluated(i, pair, out, String::new())
                }
                "raise" => ExampleResult::errored(i, pair, "ValueError: bad rule", String::new()),
                _ => ExampleResult::evaluated(i, pair, grid(&[&[0]]), String::new()),
            })
            .collect())
    }
}

/// Configuration with no retry delay and an effectively unlimited budget.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.retry.delay_ms = 0;
    config.retry.max_attempts = 2;
    config.rate_limit.requests_per_minute = 100_000;
    config.rate_limit.acquire_timeout_secs = 5;
    config.max_iterations = 3;
    config.worker_count = 2;
    config
}

pub fn runner(
    config: &Config,
    client: Arc<dyn LlmClient>,
    sandbox: Arc<dyn CodeSandbox>,
) -> Arc<TaskRunner> {
    Arc::new(
        TaskRunner::from_config(config, client, sandbox, Arc::new(NullRecorder))
            .expect("fence pattern compiles"),
    )
}
