//! Per-task and per-session aggregate records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::grid::Grid;
use super::step::TokenUsage;
use super::trial::Trial;
use crate::domain::errors::FailureKind;

/// States of the refinement state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CycleState {
    InvestigateDreamer,
    InvestigateCoder,
    RefineDreamer { iteration: u32 },
    RefineCoder { iteration: u32 },
    Solved,
    Exhausted,
    Failed,
}

impl CycleState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Solved | Self::Exhausted | Self::Failed)
    }
}

/// Error kind and message recorded for a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// How a task's cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Solved { step: usize },
    Exhausted { iterations: u32 },
    Failed(TaskFailure),
    /// Never started because the session was interrupted.
    Skipped,
}

impl TaskOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Solved { .. } => "solved",
            Self::Exhausted { .. } => "exhausted",
            Self::Failed(_) => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Finalised record for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub outcome: TaskOutcome,
    pub steps: usize,
    pub trials: usize,
    /// Score of the best trial produced anywhere in the cycle.
    pub best_score: Option<f64>,
    /// Best trial that passed every training example.
    pub best_passing_trial: Option<Trial>,
    pub usage: TokenUsage,
    pub elapsed_ms: u64,
}

impl TaskResult {
    /// Record for a task that did not get to run a cycle.
    pub fn without_cycle(task_id: impl Into<String>, outcome: TaskOutcome) -> Self {
        Self {
            task_id: task_id.into(),
            outcome,
            steps: 0,
            trials: 0,
            best_score: None,
            best_passing_trial: None,
            usage: TokenUsage::default(),
            elapsed_ms: 0,
        }
    }

    pub fn failed(task_id: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::without_cycle(
            task_id,
            TaskOutcome::Failed(TaskFailure {
                kind,
                message: message.into(),
            }),
        )
    }

    pub const fn is_solved(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Solved { .. })
    }

    /// Test outputs of the best passing trial, one per test pair.
    pub fn answers(&self) -> Option<Vec<Option<Grid>>> {
        self.best_passing_trial
            .as_ref()
            .map(Trial::test_outputs)
            .filter(|outputs| !outputs.is_empty())
    }
}

/// Aggregate of a whole run. Built once after every task finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub solved: usize,
    pub exhausted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub usage: TokenUsage,
    pub tasks: Vec<TaskResult>,
}

impl SessionSummary {
    /// Tally task results; `tasks` is expected in a stable order.
    pub fn from_results(
        session_id: impl Into<String>,
        started_at: DateTime<Utc>,
        tasks: Vec<TaskResult>,
    ) -> Self {
        let mut summary = Self {
            session_id: session_id.into(),
            started_at,
            finished_at: Utc::now(),
            total: tasks.len(),
            solved: 0,
            exhausted: 0,
            failed: 0,
            skipped: 0,
            usage: TokenUsage::default(),
            tasks: Vec::new(),
        };
        for task in &tasks {
            match task.outcome {
                TaskOutcome::Solved { .. } => summary.solved += 1,
                TaskOutcome::Exhausted { .. } => summary.exhausted += 1,
                TaskOutcome::Failed(_) => summary.failed += 1,
                TaskOutcome::Skipped => summary.skipped += 1,
            }
            summary.usage += task.usage;
        }
        summary.tasks = tasks;
        summary
    }
}

/// Two answer attempts for one test input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEntry {
    pub attempt_1: Option<Grid>,
    pub attempt_2: Option<Grid>,
}

/// Consolidated answers keyed by task id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submission(pub BTreeMap<String, Vec<SubmissionEntry>>);

impl Submission {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_every_outcome() {
        let tasks = vec![
            TaskResult::without_cycle("a", TaskOutcome::Solved { step: 1 }),
            TaskResult::without_cycle("b", TaskOutcome::Exhausted { iterations: 3 }),
            TaskResult::failed("c", FailureKind::Panicked, "boom"),
            TaskResult::without_cycle("d", TaskOutcome::Skipped),
        ];
        let summary = SessionSummary::from_results("s", Utc::now(), tasks);
        assert_eq!(summary.total, 4);
        assert_eq!(
            (summary.solved, summary.exhausted, summary.failed, summary.skipped),
            (1, 1, 1, 1)
        );
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let json = serde_json::to_value(TaskOutcome::Solved { step: 1 }).unwrap();
        assert_eq!(json["outcome"], "solved");
        assert!(CycleState::Exhausted.is_terminal());
        assert!(!CycleState::RefineCoder { iteration: 0 }.is_terminal());
    }
}
