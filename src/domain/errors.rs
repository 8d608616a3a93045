//! Error taxonomy for the refinement control loop.
//!
//! Errors below the step level (parse failures, sandbox timeouts, runtime
//! errors in generated code) are folded into trial data and never appear
//! here as propagated values. The enums in this module are the ones that
//! cross a component boundary.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A metered budget dimension guarded by its own token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// One unit per model call.
    Requests,
    /// Estimated prompt tokens per model call.
    Tokens,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requests => write!(f, "requests"),
            Self::Tokens => write!(f, "tokens"),
        }
    }
}

/// Admission was not granted before the acquire timeout elapsed.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("rate limit exhausted: {requested} {dimension} not available within {waited:?}")]
pub struct RateLimitExhausted {
    /// Dimension whose bucket denied the request.
    pub dimension: Dimension,
    /// Amount that was requested from that bucket.
    pub requested: u64,
    /// How long the caller waited before giving up.
    pub waited: Duration,
}

/// Errors raised by a model client for a single call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network failure, connect error or client-side timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the model API
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Response arrived but its text is not accessible (safety block, refusal, empty)
    #[error("response blocked: {reason}")]
    Blocked { reason: String },

    /// Response body could not be decoded
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No API key was configured or found in the environment
    #[error("API key not configured (set llm.api_key or ANTHROPIC_API_KEY)")]
    MissingApiKey,
}

impl LlmError {
    /// Returns true if another attempt may succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Blocked { .. } | Self::MalformedResponse(_) => true,
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::MissingApiKey => false,
        }
    }
}

/// Fatal outcomes of a single generation step.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Admission control denied the call. Not retried.
    #[error(transparent)]
    RateLimitExhausted(#[from] RateLimitExhausted),

    /// The model never produced a usable response.
    #[error("no usable response after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: LlmError,
    },

    /// The step asked for a role that is not configured.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// Sandbox outcomes that prevent per-example results from being produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SandboxError {
    /// The source does not parse or has no entry point.
    #[error("parse error: {0}")]
    Parse(String),

    /// The isolated process exceeded its wall-clock budget and was killed.
    #[error("execution exceeded {secs}s timeout")]
    Timeout { secs: u64 },

    /// The interpreter could not be started.
    #[error("failed to start sandbox: {0}")]
    Spawn(String),

    /// The harness exited without a readable result.
    #[error("sandbox harness failure: {0}")]
    Harness(String),
}

/// Fatal conditions that abort a refinement cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("step {step} failed: {source}")]
    Generation {
        step: usize,
        #[source]
        source: GenerationError,
    },

    #[error("refine iteration {iteration} has no code candidate to refine")]
    NoCandidate { iteration: u32 },
}

impl CycleError {
    /// Classification stored in the task record.
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Generation { source, .. } => match source {
                GenerationError::RateLimitExhausted(_) => FailureKind::RateLimitExhausted,
                GenerationError::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
                GenerationError::UnknownRole(_) => FailureKind::UnknownRole,
            },
            Self::NoCandidate { .. } => FailureKind::NoCandidate,
        }
    }
}

/// Serialisable failure classification for task records and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimitExhausted,
    RetriesExhausted,
    NoCandidate,
    UnknownRole,
    Panicked,
    WorkerLost,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RateLimitExhausted => "rate_limit_exhausted",
            Self::RetriesExhausted => "retries_exhausted",
            Self::NoCandidate => "no_candidate",
            Self::UnknownRole => "unknown_role",
            Self::Panicked => "panicked",
            Self::WorkerLost => "worker_lost",
        };
        write!(f, "{s}")
    }
}
