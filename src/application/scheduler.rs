//! Scheduler: bounded worker pool over many tasks.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::registry::SessionRegistry;
use super::task_runner::TaskRunner;
use crate::domain::errors::FailureKind;
use crate::domain::models::{SessionSummary, Submission, Task, TaskOutcome, TaskResult};
use crate::domain::ports::Recorder;
use crate::services::submission::build_submission;

/// Called once per finished task, in completion order.
pub type ProgressCallback = Arc<dyn Fn(&TaskResult) + Send + Sync>;

/// Runs every task through a shared [`TaskRunner`] with at most
/// `worker_count` tasks in flight.
///
/// All workers share the runner and therefore one rate limiter. Tasks are
/// started in submission order; results are collected as they complete.
pub struct Scheduler {
    runner: Arc<TaskRunner>,
    worker_count: usize,
    session_id: String,
    recorder: Arc<dyn Recorder>,
    registry: Arc<SessionRegistry>,
    shutdown: Option<watch::Receiver<bool>>,
    progress: Option<ProgressCallback>,
}

impl Scheduler {
    pub fn new(
        runner: Arc<TaskRunner>,
        worker_count: usize,
        session_id: impl Into<String>,
        recorder: Arc<dyn Recorder>,
    ) -> Self {
        Self {
            runner,
            worker_count: worker_count.max(1),
            session_id: session_id.into(),
            recorder,
            registry: Arc::new(SessionRegistry::new()),
            shutdown: None,
            progress: None,
        }
    }

    /// Stop starting new tasks once `shutdown` turns true.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn complete(&self, result: TaskResult) {
        match &result.outcome {
            TaskOutcome::Failed(failure) => error!(
                task_id = %result.task_id,
                kind = %failure.kind,
                error = %failure.message,
                "task completed with failure"
            ),
            outcome => info!(task_id = %result.task_id, outcome = outcome.label(), "task completed"),
        }
        if let Some(progress) = &self.progress {
            progress(&result);
        }
        self.registry.insert(result).await;
    }

    /// Run all tasks and finalise the session.
    ///
    /// The summary and submission are produced and recorded even when some
    /// tasks failed or the run was interrupted. Task ids must be unique; a
    /// repeated id is dropped before anything starts.
    pub async fn run(&self, tasks: Vec<Task>) -> (SessionSummary, Submission) {
        let started_at = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut join_set: JoinSet<TaskResult> = JoinSet::new();
        let mut pending: BTreeSet<String> = BTreeSet::new();

        info!(
            session_id = %self.session_id,
            tasks = tasks.len(),
            workers = self.worker_count,
            "session started"
        );

        let mut seen: BTreeSet<String> = BTreeSet::new();
        let tasks: Vec<Task> = tasks
            .into_iter()
            .filter(|task| {
                let fresh = seen.insert(task.id.clone());
                if !fresh {
                    error!(task_id = %task.id, "duplicate task id, only the first occurrence runs");
                }
                fresh
            })
            .collect();

        let mut queue = tasks.into_iter();
        while let Some(task) = queue.next() {
            let permit = tokio::select! {
                biased;
                () = wait_for_shutdown(self.shutdown.clone()) => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit.filter(|_| !self.shutdown_requested()) else {
                warn!(session_id = %self.session_id, "shutdown requested, not starting remaining tasks");
                for skipped in std::iter::once(task).chain(queue.by_ref()) {
                    self.complete(TaskResult::without_cycle(skipped.id, TaskOutcome::Skipped))
                        .await;
                }
                break;
            };

            pending.insert(task.id.clone());
            let runner = self.runner.clone();
            join_set.spawn(async move {
                let _permit = permit;
                runner.run(Arc::new(task)).await
            });

            while let Some(joined) = join_set.try_join_next() {
                self.collect(joined, &mut pending).await;
            }
        }

        while let Some(joined) = join_set.join_next().await {
            self.collect(joined, &mut pending).await;
        }

        for task_id in std::mem::take(&mut pending) {
            error!(task_id = %task_id, "worker ended without reporting a result");
            self.complete(TaskResult::failed(
                task_id,
                FailureKind::WorkerLost,
                "worker ended without reporting a result",
            ))
            .await;
        }

        let results = self.registry.snapshot().await;
        let submission = build_submission(&results);
        let summary = SessionSummary::from_results(self.session_id.clone(), started_at, results);

        info!(
            session_id = %summary.session_id,
            total = summary.total,
            solved = summary.solved,
            exhausted = summary.exhausted,
            failed = summary.failed,
            skipped = summary.skipped,
            input_tokens = summary.usage.input_tokens,
            output_tokens = summary.usage.output_tokens,
            answers = submission.len(),
            "session finished"
        );
        self.recorder.session_finished(&summary, &submission).await;
        (summary, submission)
    }

    async fn collect(
        &self,
        joined: Result<TaskResult, tokio::task::JoinError>,
        pending: &mut BTreeSet<String>,
    ) {
        match joined {
            Ok(result) => {
                pending.remove(&result.task_id);
                self.complete(result).await;
            }
            Err(e) => error!(error = %e, "worker join failed"),
        }
    }
}

/// Resolves once shutdown is signalled; never when no channel is wired or
/// the sender is gone.
async fn wait_for_shutdown(shutdown: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = shutdown {
        if rx.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await;
}
