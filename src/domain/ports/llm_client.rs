//! Model client port - interface for LLM backends.

use async_trait::async_trait;

use crate::domain::errors::LlmError;
use crate::domain::models::{RoleConfig, TokenUsage};

/// Response from one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    /// `None` when the backend returned no accessible text.
    pub text: Option<String>,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

impl LlmResponse {
    /// Plain text response.
    pub fn text(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: Some(text.into()),
            stop_reason: Some("end_turn".to_string()),
            usage,
        }
    }

    /// Accessible text, or `Blocked` when the response carries none.
    pub fn accessible_text(&self) -> Result<&str, LlmError> {
        match self.text.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(LlmError::Blocked {
                reason: self
                    .stop_reason
                    .clone()
                    .unwrap_or_else(|| "empty response".to_string()),
            }),
        }
    }
}

/// Trait for model client implementations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Send the ordered payload parts to the model configured by `role`.
    async fn generate(&self, role: &RoleConfig, payload: &[String]) -> Result<LlmResponse, LlmError>;
}
