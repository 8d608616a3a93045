use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::trial::TestGating;

/// Role every cycle uses for hypotheses.
pub const DREAMER: &str = "dreamer";
/// Role every cycle uses for code.
pub const CODER: &str = "coder";

/// Main configuration structure for seer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Refinement strategy
    #[serde(default)]
    pub workflow: WorkflowKind,

    /// Concurrent tasks (1-64)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Refine iterations after the investigate phase
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Success also requires every test pair to match
    #[serde(default)]
    pub require_test_pass: bool,

    /// Root directory for session output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Model roles keyed by name
    #[serde(default = "default_roles")]
    pub roles: BTreeMap<String, RoleConfig>,

    /// Per-phase instructions
    #[serde(default)]
    pub instructions: InstructionsConfig,

    /// Text appended to every role's system prompt
    #[serde(default)]
    pub task_context: Option<String>,

    #[serde(default)]
    pub task_context_file: Option<PathBuf>,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_worker_count() -> usize {
    4
}

const fn default_max_iterations() -> u32 {
    5
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("sessions")
}

fn default_roles() -> BTreeMap<String, RoleConfig> {
    let mut roles = BTreeMap::new();
    roles.insert(
        DREAMER.to_string(),
        RoleConfig {
            temperature: Some(0.7),
            system_prompt: Some(
                "You are a careful observer. Study example grid pairs and describe the \
                 transformation rule in natural language."
                    .to_string(),
            ),
            ..RoleConfig::default()
        },
    );
    roles.insert(
        CODER.to_string(),
        RoleConfig {
            temperature: Some(0.2),
            system_prompt: Some(
                "You are a precise Python programmer. Implement the described grid \
                 transformation as a function named `transform`."
                    .to_string(),
            ),
            ..RoleConfig::default()
        },
    );
    roles
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflow: WorkflowKind::default(),
            worker_count: default_worker_count(),
            max_iterations: default_max_iterations(),
            require_test_pass: false,
            output_dir: default_output_dir(),
            roles: default_roles(),
            instructions: InstructionsConfig::default(),
            task_context: None,
            task_context_file: None,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            sandbox: SandboxConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Refinement strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Investigate with all training pairs at once
    #[default]
    Default,
    /// Dreamer sees one training pair per step
    Incremental,
}

impl std::str::FromStr for WorkflowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "incremental" => Ok(Self::Incremental),
            other => Err(format!("unknown workflow '{other}' (expected default or incremental)")),
        }
    }
}

/// A named model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoleConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Inline system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// System prompt file, relative to the config file
    #[serde(default)]
    pub system_prompt_file: Option<PathBuf>,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

const fn default_max_output_tokens() -> u32 {
    8192
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: None,
            max_output_tokens: default_max_output_tokens(),
            system_prompt: None,
            system_prompt_file: None,
        }
    }
}

/// Instructions appended to each phase's payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InstructionsConfig {
    #[serde(default = "default_investigate_dreamer")]
    pub investigate_dreamer: String,
    #[serde(default)]
    pub investigate_dreamer_file: Option<PathBuf>,

    #[serde(default = "default_investigate_coder")]
    pub investigate_coder: String,
    #[serde(default)]
    pub investigate_coder_file: Option<PathBuf>,

    #[serde(default = "default_refine_dreamer")]
    pub refine_dreamer: String,
    #[serde(default)]
    pub refine_dreamer_file: Option<PathBuf>,

    #[serde(default = "default_refine_coder")]
    pub refine_coder: String,
    #[serde(default)]
    pub refine_coder_file: Option<PathBuf>,
}

fn default_investigate_dreamer() -> String {
    "Describe the rule that transforms each input grid into its output grid. \
     Be specific about objects, positions and values."
        .to_string()
}

fn default_investigate_coder() -> String {
    "Write a Python function `transform(input_grid)` that implements the rule \
     described above. Return the output grid as a list of lists of integers. \
     Put the code in a single ```python block."
        .to_string()
}

fn default_refine_dreamer() -> String {
    "The code above was run against the training examples. Review the report, \
     explain where the rule was wrong and state a corrected rule."
        .to_string()
}

fn default_refine_coder() -> String {
    "Update the `transform` function to implement the corrected rule. \
     Put the complete code in a single ```python block."
        .to_string()
}

impl Default for InstructionsConfig {
    fn default() -> Self {
        Self {
            investigate_dreamer: default_investigate_dreamer(),
            investigate_dreamer_file: None,
            investigate_coder: default_investigate_coder(),
            investigate_coder_file: None,
            refine_dreamer: default_refine_dreamer(),
            refine_dreamer_file: None,
            refine_coder: default_refine_coder(),
            refine_coder_file: None,
        }
    }
}

/// Rate limiting configuration
///
/// Each dimension is a token bucket with capacity equal to the per-minute
/// value and a refill rate of one minute's budget per 60 seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// 0 disables the token dimension
    #[serde(default = "default_tokens_per_minute")]
    pub tokens_per_minute: u64,

    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Characters per estimated prompt token
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,
}

const fn default_requests_per_minute() -> u32 {
    15
}

const fn default_tokens_per_minute() -> u64 {
    1_000_000
}

const fn default_acquire_timeout_secs() -> u64 {
    120
}

const fn default_chars_per_token() -> f64 {
    4.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            tokens_per_minute: default_tokens_per_minute(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

/// Retry policy for model calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

/// Code sandbox configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxConfig {
    /// Interpreter executable
    #[serde(default = "default_python")]
    pub python: String,

    /// Wall-clock limit per sandbox run
    #[serde(default = "default_sandbox_timeout_secs")]
    pub timeout_secs: u64,

    /// Function the generated code must define
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    #[serde(default)]
    pub test_gating: TestGating,
}

fn default_python() -> String {
    "python3".to_string()
}

const fn default_sandbox_timeout_secs() -> u64 {
    10
}

fn default_entry_point() -> String {
    "transform".to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            timeout_secs: default_sandbox_timeout_secs(),
            entry_point: default_entry_point(),
            test_gating: TestGating::default(),
        }
    }
}

/// Model API connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Falls back to `ANTHROPIC_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Also log to the console (stderr)
    #[serde(default = "default_true")]
    pub enable_console: bool,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_console: true,
            rotation: default_rotation(),
        }
    }
}
