//! Generation step records.

use std::fmt;
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trial::{best_trial, Trial};

/// Position of a step in the refinement state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum StepPhase {
    /// `pair` is set when the dreamer sees one training pair at a time.
    InvestigateDreamer { pair: Option<usize> },
    InvestigateCoder,
    RefineDreamer { iteration: u32 },
    RefineCoder { iteration: u32 },
}

impl StepPhase {
    /// Short label used in file names and logs.
    pub fn label(&self) -> String {
        match self {
            Self::InvestigateDreamer { pair: None } => "investigate_dreamer".to_string(),
            Self::InvestigateDreamer { pair: Some(p) } => format!("investigate_dreamer_pair_{}", p + 1),
            Self::InvestigateCoder => "investigate_coder".to_string(),
            Self::RefineDreamer { iteration } => format!("refine_dreamer_{iteration}"),
            Self::RefineCoder { iteration } => format!("refine_coder_{iteration}"),
        }
    }
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Declared language of a fenced code block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeLanguage {
    /// Executable in the sandbox.
    Python,
    /// No tag on the fence.
    Text,
    Other(String),
}

impl CodeLanguage {
    /// Normalise a fence tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "" | "text" | "txt" => Self::Text,
            "python" | "py" | "python3" => Self::Python,
            other => Self::Other(other.to_string()),
        }
    }

    pub const fn is_executable(&self) -> bool {
        matches!(self, Self::Python)
    }

    /// File extension used when recording the block.
    pub fn extension(&self) -> &str {
        match self {
            Self::Python => "py",
            Self::Text => "txt",
            Self::Other(tag) => tag,
        }
    }
}

/// One fenced code block extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCandidate {
    pub index: usize,
    pub language: CodeLanguage,
    pub source: String,
}

/// Token accounting reported by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub const fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// Outcome of one model-call attempt inside a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// One-based attempt number.
    pub attempt: u32,
    pub succeeded: bool,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// One request/response exchange with one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStep {
    /// Zero-based position within the task's cycle.
    pub index: usize,
    pub phase: StepPhase,
    pub role: String,
    pub history: Vec<String>,
    pub content: Vec<String>,
    pub instructions: Vec<String>,
    pub response_text: String,
    pub text_segments: Vec<String>,
    pub candidates: Vec<CodeCandidate>,
    pub trials: Vec<Trial>,
    pub attempts: Vec<AttemptRecord>,
    pub usage: TokenUsage,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl GenerationStep {
    /// Best trial of this step, if any candidate was executable.
    pub fn best_trial(&self) -> Option<&Trial> {
        best_trial(&self.trials)
    }

    /// Best among trials that satisfy the success predicate.
    pub fn solving_trial(&self, require_test_pass: bool) -> Option<&Trial> {
        best_trial(self.trials.iter().filter(|t| t.solves(require_test_pass)))
    }

    pub fn candidate(&self, index: usize) -> Option<&CodeCandidate> {
        self.candidates.iter().find(|c| c.index == index)
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.last().map_or(0, |a| a.attempt)
    }
}
