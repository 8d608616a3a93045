//! Filesystem session recorder.
//!
//! Layout under `output_dir/<yy.jjj.HHMM>/`:
//!
//! ```text
//! config.json
//! session_summary.json
//! submission.json
//! <task_id>/task.json
//! <task_id>/task_summary.json
//! <task_id>/NNN/{history,content,instructions,response}.md
//! <task_id>/NNN/step.json
//! <task_id>/NNN/code_XX.py
//! <task_id>/NNN/code_XX.trial.json
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::models::{
    Config, GenerationStep, SessionSummary, StepPhase, Submission, Task, TaskResult, Trial,
};
use crate::domain::ports::Recorder;

const SECTION_BREAK: &str = "\n\n---\n\n";

/// Writes session artifacts below one session directory.
#[derive(Debug, Clone)]
pub struct FsRecorder {
    session_id: String,
    root: PathBuf,
}

impl FsRecorder {
    /// Create a fresh session directory and write the effective config.
    pub async fn create(output_dir: &Path, config: &Config) -> Result<Self> {
        let base = Utc::now().format("%y.%j.%H%M").to_string();
        let mut session_id = base.clone();
        let mut suffix = 1;
        while tokio::fs::try_exists(output_dir.join(&session_id))
            .await
            .unwrap_or(false)
        {
            suffix += 1;
            session_id = format!("{base}-{suffix}");
        }

        let root = output_dir.join(&session_id);
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create session directory {}", root.display()))?;

        let recorder = Self { session_id, root };
        recorder
            .write_json(&recorder.root.join("config.json"), config)
            .await?;
        info!(session_id = %recorder.session_id, dir = %recorder.root.display(), "session directory created");
        Ok(recorder)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join(sanitize(task_id))
    }

    pub fn step_dir(&self, task_id: &str, index: usize) -> PathBuf {
        self.task_dir(task_id).join(format!("{index:03}"))
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value).context("failed to serialize record")?;
        self.write(path, body).await
    }

    async fn write(&self, path: &Path, body: impl AsRef<[u8]>) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), "record written");
        Ok(())
    }

    async fn write_step(&self, task_id: &str, step: &GenerationStep) -> Result<()> {
        let dir = self.step_dir(task_id, step.index);
        self.write(&dir.join("history.md"), step.history.join(SECTION_BREAK)).await?;
        self.write(&dir.join("content.md"), step.content.join(SECTION_BREAK)).await?;
        self.write(&dir.join("instructions.md"), step.instructions.join(SECTION_BREAK))
            .await?;
        self.write(&dir.join("response.md"), &step.response_text).await?;
        for candidate in &step.candidates {
            let name = format!("code_{:02}.{}", candidate.index, candidate.language.extension());
            self.write(&dir.join(name), &candidate.source).await?;
        }
        self.write_json(&dir.join("step.json"), step).await
    }
}

/// Keep task ids usable as a single path component.
///
/// Ids that need rewriting get a hash suffix of the raw id so that distinct
/// ids never share a directory.
fn sanitize(task_id: &str) -> String {
    let cleaned: String = task_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    let cleaned = match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    };
    if cleaned == task_id {
        return cleaned;
    }
    let mut hasher = DefaultHasher::new();
    task_id.hash(&mut hasher);
    format!("{cleaned}-{:08x}", hasher.finish() as u32)
}

fn log_failure(result: Result<()>, record: &str) {
    if let Err(e) = result {
        warn!(record, error = %format!("{e:#}"), "failed to write session record");
    }
}

#[async_trait]
impl Recorder for FsRecorder {
    async fn task_started(&self, task: &Task) {
        let path = self.task_dir(&task.id).join("task.json");
        log_failure(self.write_json(&path, task).await, "task");
    }

    async fn step_started(&self, task_id: &str, index: usize, phase: StepPhase, role: &str) {
        let dir = self.step_dir(task_id, index);
        let result = tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()));
        debug!(task_id, step = index, %phase, role, "step directory ready");
        log_failure(result, "step_start");
    }

    async fn trial_completed(&self, task_id: &str, step_index: usize, trial: &Trial) {
        let path = self
            .step_dir(task_id, step_index)
            .join(format!("code_{:02}.trial.json", trial.candidate_index));
        log_failure(self.write_json(&path, trial).await, "trial");
    }

    async fn step_finished(&self, task_id: &str, step: &GenerationStep) {
        log_failure(self.write_step(task_id, step).await, "step");
    }

    async fn task_finished(&self, result: &TaskResult) {
        let path = self.task_dir(&result.task_id).join("task_summary.json");
        log_failure(self.write_json(&path, result).await, "task_summary");
    }

    async fn session_finished(&self, summary: &SessionSummary, submission: &Submission) {
        log_failure(
            self.write_json(&self.root.join("session_summary.json"), summary).await,
            "session_summary",
        );
        log_failure(
            self.write_json(&self.root.join("submission.json"), submission).await,
            "submission",
        );
    }
}
