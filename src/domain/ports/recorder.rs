//! Recorder port - durable storage of session artifacts.

use async_trait::async_trait;

use crate::domain::models::{
    GenerationStep, SessionSummary, StepPhase, Submission, Task, TaskResult, Trial,
};

/// Receives structured records at fixed points of a session.
///
/// Calls never fail from the caller's point of view; implementations log
/// their own storage errors.
#[async_trait]
pub trait Recorder: Send + Sync {
    async fn task_started(&self, task: &Task);

    async fn step_started(&self, task_id: &str, index: usize, phase: StepPhase, role: &str);

    async fn trial_completed(&self, task_id: &str, step_index: usize, trial: &Trial);

    async fn step_finished(&self, task_id: &str, step: &GenerationStep);

    async fn task_finished(&self, result: &TaskResult);

    async fn session_finished(&self, summary: &SessionSummary, submission: &Submission);
}

/// Recorder that drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

#[async_trait]
impl Recorder for NullRecorder {
    async fn task_started(&self, _task: &Task) {}

    async fn step_started(&self, _task_id: &str, _index: usize, _phase: StepPhase, _role: &str) {}

    async fn trial_completed(&self, _task_id: &str, _step_index: usize, _trial: &Trial) {}

    async fn step_finished(&self, _task_id: &str, _step: &GenerationStep) {}

    async fn task_finished(&self, _result: &TaskResult) {}

    async fn session_finished(&self, _summary: &SessionSummary, _submission: &Submission) {}
}
