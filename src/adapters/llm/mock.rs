//! Scripted model client for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::LlmError;
use crate::domain::models::{RoleConfig, TokenUsage};
use crate::domain::ports::{LlmClient, LlmResponse};

/// Computes a reply from the request when the script is empty.
pub type Responder = dyn Fn(&RoleConfig, &[String]) -> Result<LlmResponse, LlmError> + Send + Sync;

/// One observed call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub model: String,
    pub system_prompt: Option<String>,
    pub payload: Vec<String>,
}

/// Mock client: pops scripted replies in order, then falls back to a
/// responder if one is set.
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    responder: Option<Arc<Responder>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replies served in call order.
    pub fn scripted(replies: impl IntoIterator<Item = Result<LlmResponse, LlmError>>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::new()
        }
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&RoleConfig, &[String]) -> Result<LlmResponse, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::new()
        }
    }

    /// Responder used by `run --dry-run`: every reply proposes the identity
    /// transform so the whole pipeline runs without network access.
    pub fn dry_run(entry_point: &str) -> Self {
        let reply = format!(
            "Dry run: assume the output equals the input.\n\n```python\ndef {entry_point}(grid):\n    return grid\n```\n"
        );
        Self::with_responder(move |_role, payload| {
            let chars: usize = payload.iter().map(String::len).sum();
            Ok(LlmResponse::text(
                reply.clone(),
                TokenUsage {
                    input_tokens: (chars / 4) as u64,
                    output_tokens: (reply.len() / 4) as u64,
                },
            ))
        })
    }

    pub async fn push(&self, reply: Result<LlmResponse, LlmError>) {
        self.script.lock().await.push_back(reply);
    }

    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, role: &RoleConfig, payload: &[String]) -> Result<LlmResponse, LlmError> {
        self.calls.lock().await.push(MockCall {
            model: role.model.clone(),
            system_prompt: role.system_prompt.clone(),
            payload: payload.to_vec(),
        });

        if let Some(reply) = self.script.lock().await.pop_front() {
            return reply;
        }
        match &self.responder {
            Some(responder) => responder(role, payload),
            None => Err(LlmError::Transport("mock script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_exhausted() {
        let client = MockLlmClient::scripted(vec![Ok(LlmResponse::text("one", TokenUsage::default()))]);
        let role = RoleConfig::default();

        let first = client.generate(&role, &["a".to_string()]).await.unwrap();
        assert_eq!(first.text.as_deref(), Some("one"));
        assert!(matches!(
            client.generate(&role, &[]).await,
            Err(LlmError::Transport(_))
        ));
        assert_eq!(client.call_count().await, 2);
        assert_eq!(client.calls().await[0].payload, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_dry_run_proposes_identity() {
        let client = MockLlmClient::dry_run("transform");
        let reply = client.generate(&RoleConfig::default(), &["x".repeat(40)]).await.unwrap();
        let text = reply.accessible_text().unwrap();
        assert!(text.contains("def transform(grid):"));
        assert_eq!(reply.usage.input_tokens, 10);
    }
}
