//! Generation step executor.
//!
//! One step is one request/response exchange with one role: admission
//! control, the model call (retried with a fixed delay), response parsing
//! and trial evaluation of every executable code block.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::response_parser::ResponseParser;
use super::trial_evaluator::TrialEvaluator;
use crate::domain::errors::{GenerationError, LlmError, RateLimitExhausted};
use crate::domain::models::{GenerationStep, RoleConfig, StepPhase, Task, TokenUsage};
use crate::domain::ports::{LlmClient, Recorder};
use crate::infrastructure::rate_limit::RateLimiter;
use crate::infrastructure::retry::{RetryPolicy, Retryable};

/// Inputs of one step. The payload sent is `history ++ content ++ instructions`.
#[derive(Debug, Clone)]
pub struct StepRequest<'a> {
    pub task: &'a Task,
    pub index: usize,
    pub phase: StepPhase,
    pub role: &'a str,
    pub history: Vec<String>,
    pub content: Vec<String>,
    pub instructions: Vec<String>,
}

impl StepRequest<'_> {
    /// Ordered payload parts.
    pub fn payload(&self) -> Vec<String> {
        self.history
            .iter()
            .chain(&self.content)
            .chain(&self.instructions)
            .cloned()
            .collect()
    }
}

/// Failure of a single attempt.
#[derive(Debug)]
enum AttemptError {
    Admission(RateLimitExhausted),
    Llm(LlmError),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admission(e) => write!(f, "{e}"),
            Self::Llm(e) => write!(f, "{e}"),
        }
    }
}

impl Retryable for AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Admission(_) => false,
            Self::Llm(e) => e.is_transient(),
        }
    }
}

/// Runs generation steps against shared infrastructure.
pub struct StepExecutor {
    client: Arc<dyn LlmClient>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    evaluator: TrialEvaluator,
    parser: ResponseParser,
    roles: BTreeMap<String, RoleConfig>,
    recorder: Arc<dyn Recorder>,
}

impl StepExecutor {
    pub fn new(
        client: Arc<dyn LlmClient>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        evaluator: TrialEvaluator,
        parser: ResponseParser,
        roles: BTreeMap<String, RoleConfig>,
        recorder: Arc<dyn Recorder>,
    ) -> Self {
        Self {
            client,
            limiter,
            retry,
            evaluator,
            parser,
            roles,
            recorder,
        }
    }

    /// Execute one step.
    ///
    /// # Errors
    /// - `RateLimitExhausted` when admission is denied (never retried)
    /// - `RetriesExhausted` when no attempt produced accessible text
    /// - `UnknownRole` when `request.role` is not configured
    pub async fn execute(&self, request: StepRequest<'_>) -> Result<GenerationStep, GenerationError> {
        let task_id = request.task.id.as_str();
        let role = self
            .roles
            .get(request.role)
            .ok_or_else(|| GenerationError::UnknownRole(request.role.to_string()))?;

        self.recorder
            .step_started(task_id, request.index, request.phase, request.role)
            .await;
        info!(task_id, step = request.index, phase = %request.phase, role = request.role, "step started");

        let started_at = Utc::now();
        let start = Instant::now();
        let payload = request.payload();
        let chars = role.system_prompt.as_ref().map_or(0, String::len)
            + payload.iter().map(String::len).sum::<usize>();
        let estimated_tokens = self.limiter.estimate_tokens(chars);
        let step_index = request.index;
        let role_name = request.role;

        let report = self
            .retry
            .execute(|attempt| {
                let payload = &payload;
                async move {
                    self.limiter
                        .admit(estimated_tokens)
                        .await
                        .map_err(AttemptError::Admission)?;
                    debug!(
                        task_id,
                        step = step_index,
                        role = role_name,
                        attempt,
                        estimated_tokens,
                        client = self.client.name(),
                        "calling model"
                    );
                    let response = self
                        .client
                        .generate(role, payload)
                        .await
                        .map_err(AttemptError::Llm)?;
                    let text = response.accessible_text().map_err(AttemptError::Llm)?.to_string();
                    Ok((text, response.usage))
                }
            })
            .await;

        let attempt_count = report.attempt_count();
        let attempts = report.attempts;
        let (response_text, usage): (String, TokenUsage) = match report.outcome {
            Ok(value) => value,
            Err(AttemptError::Admission(e)) => {
                error!(task_id, step = request.index, role = request.role, error = %e, "step denied admission");
                return Err(GenerationError::RateLimitExhausted(e));
            }
            Err(AttemptError::Llm(e)) => {
                error!(
                    task_id,
                    step = request.index,
                    role = request.role,
                    attempts = attempt_count,
                    error = %e,
                    "step exhausted retries"
                );
                return Err(GenerationError::RetriesExhausted {
                    attempts: attempt_count,
                    last_error: e,
                });
            }
        };

        let parsed = self.parser.parse(&response_text);
        let mut trials = Vec::new();
        for candidate in &parsed.candidates {
            if let Some(trial) = self.evaluator.evaluate(candidate, request.task).await {
                self.recorder
                    .trial_completed(task_id, request.index, &trial)
                    .await;
                trials.push(trial);
            }
        }

        let step = GenerationStep {
            index: request.index,
            phase: request.phase,
            role: request.role.to_string(),
            history: request.history,
            content: request.content,
            instructions: request.instructions,
            response_text,
            text_segments: parsed.text_segments,
            candidates: parsed.candidates,
            trials,
            attempts,
            usage,
            started_at,
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        info!(
            task_id,
            step = step.index,
            phase = %step.phase,
            candidates = step.candidates.len(),
            trials = step.trials.len(),
            best_score = step.best_trial().map(|t| t.score()),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            elapsed_ms = step.elapsed_ms,
            "step finished"
        );
        self.recorder.step_finished(task_id, &step).await;
        Ok(step)
    }
}
