//! Task runner: one refinement cycle with guaranteed finalisation.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::domain::errors::FailureKind;
use crate::domain::models::{
    best_trial, Config, CycleState, Task, TaskFailure, TaskOutcome, TaskResult, TokenUsage,
};
use crate::domain::ports::{CodeSandbox, LlmClient, Recorder};
use crate::infrastructure::rate_limit::RateLimiter;
use crate::infrastructure::retry::RetryPolicy;
use crate::services::generation::StepExecutor;
use crate::services::response_parser::ResponseParser;
use crate::services::trial_evaluator::TrialEvaluator;
use crate::services::workflow::{CycleReport, RefinementCycle, Workflow};

/// Runs one task's cycle and converts every way it can end into a
/// [`TaskResult`]. Never panics and never returns an error.
pub struct TaskRunner {
    cycle: Arc<RefinementCycle>,
    workflow: Workflow,
    recorder: Arc<dyn Recorder>,
    require_test_pass: bool,
}

impl TaskRunner {
    pub fn new(
        cycle: Arc<RefinementCycle>,
        workflow: Workflow,
        recorder: Arc<dyn Recorder>,
        require_test_pass: bool,
    ) -> Self {
        Self {
            cycle,
            workflow,
            recorder,
            require_test_pass,
        }
    }

    /// Wire a runner from configuration. Every task run by it shares one
    /// rate limiter.
    pub fn from_config(
        config: &Config,
        client: Arc<dyn LlmClient>,
        sandbox: Arc<dyn CodeSandbox>,
        recorder: Arc<dyn Recorder>,
    ) -> Result<Self, regex::Error> {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let executor = StepExecutor::new(
            client,
            limiter,
            RetryPolicy::from_config(&config.retry),
            TrialEvaluator::from_config(sandbox, &config.sandbox),
            ResponseParser::new()?,
            config.roles.clone(),
            recorder.clone(),
        );
        let cycle = RefinementCycle::new(
            Arc::new(executor),
            config.instructions.clone(),
            config.max_iterations,
            config.require_test_pass,
        );
        Ok(Self::new(
            Arc::new(cycle),
            Workflow::from(config.workflow),
            recorder,
            config.require_test_pass,
        ))
    }

    pub async fn run(&self, task: Arc<Task>) -> TaskResult {
        let start = Instant::now();
        self.recorder.task_started(&task).await;

        let outcome = AssertUnwindSafe(self.workflow.execute(&self.cycle, &task))
            .catch_unwind()
            .await;

        let mut result = match outcome {
            Ok(report) => summarize(&task.id, report, self.require_test_pass),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(task_id = %task.id, panic = %message, "task cycle panicked");
                TaskResult::failed(task.id.clone(), FailureKind::Panicked, message)
            }
        };
        result.elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.recorder.task_finished(&result).await;
        match &result.outcome {
            TaskOutcome::Failed(failure) => warn!(
                task_id = %result.task_id,
                kind = %failure.kind,
                error = %failure.message,
                steps = result.steps,
                "task failed"
            ),
            outcome => info!(
                task_id = %result.task_id,
                outcome = outcome.label(),
                steps = result.steps,
                best_score = result.best_score,
                elapsed_ms = result.elapsed_ms,
                "task finished"
            ),
        }
        result
    }
}

/// Fold a cycle report into the task record.
pub fn summarize(task_id: &str, report: CycleReport, require_test_pass: bool) -> TaskResult {
    let mut usage = TokenUsage::default();
    for step in &report.steps {
        usage += step.usage;
    }
    let trials = report.steps.iter().map(|s| s.trials.len()).sum();
    let best_score = best_trial(report.steps.iter().flat_map(|s| &s.trials)).map(|t| t.score());
    let best_passing_trial = report.steps.iter().rev().find_map(|step| {
        best_trial(step.trials.iter().filter(|t| t.solves(require_test_pass)))
            .or_else(|| best_trial(step.trials.iter().filter(|t| t.all_training_passed())))
            .cloned()
    });

    let outcome = match (report.state, report.error) {
        (_, Some(err)) => TaskOutcome::Failed(TaskFailure {
            kind: err.kind(),
            message: err.to_string(),
        }),
        (CycleState::Solved, None) => TaskOutcome::Solved {
            step: report
                .solved_step
                .unwrap_or_else(|| report.steps.len().saturating_sub(1)),
        },
        (_, None) => TaskOutcome::Exhausted {
            iterations: report.iterations,
        },
    };

    TaskResult {
        task_id: task_id.to_string(),
        outcome,
        steps: report.steps.len(),
        trials,
        best_score,
        best_passing_trial,
        usage,
        elapsed_ms: 0,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{CycleError, GenerationError};

    fn report(state: CycleState, error: Option<CycleError>) -> CycleReport {
        CycleReport {
            state,
            steps: Vec::new(),
            error,
            solved_step: None,
            iterations: 2,
        }
    }

    #[test]
    fn test_failed_report_keeps_kind() {
        let err = CycleError::Generation {
            step: 0,
            source: GenerationError::UnknownRole("x".into()),
        };
        let result = summarize("t", report(CycleState::Failed, Some(err)), false);
        match result.outcome {
            TaskOutcome::Failed(f) => {
                assert_eq!(f.kind, FailureKind::UnknownRole);
                assert!(f.message.contains("unknown role"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_exhausted_report() {
        let result = summarize("t", report(CycleState::Exhausted, None), false);
        assert_eq!(result.outcome, TaskOutcome::Exhausted { iterations: 2 });
        assert_eq!(result.best_score, None);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
