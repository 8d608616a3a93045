//! Anthropic Messages API client.
//!
//! Makes direct, non-streaming HTTP calls to `/v1/messages`. Each payload
//! part becomes its own text block inside a single user message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::LlmError;
use crate::domain::models::{LlmConfig, RoleConfig, TokenUsage};
use crate::domain::ports::{LlmClient, LlmResponse};

/// Environment variable consulted when no key is configured.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MessageRole {
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize)]
struct Message {
    role: MessageRole,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

/// Client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_version: String,
    api_key: Option<String>,
}

impl AnthropicClient {
    /// Build a client; the key falls back to `ANTHROPIC_API_KEY`.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to create HTTP client: {e}")))?;

        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            api_key,
        })
    }

    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_request(role: &RoleConfig, payload: &[String]) -> MessagesRequest {
        let content = payload
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| ContentBlock::Text { text: part.clone() })
            .collect();

        MessagesRequest {
            model: role.model.clone(),
            max_tokens: role.max_output_tokens,
            system: role.system_prompt.clone().filter(|s| !s.trim().is_empty()),
            messages: vec![Message {
                role: MessageRole::User,
                content,
            }],
            temperature: role.temperature,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(&self, role: &RoleConfig, payload: &[String]) -> Result<LlmResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let request = Self::build_request(role, payload);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let texts: Vec<&str> = result
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();
        let text = (!texts.is_empty()).then(|| texts.join("\n"));

        debug!(
            model = %role.model,
            stop_reason = ?result.stop_reason,
            input_tokens = result.usage.input_tokens,
            output_tokens = result.usage.output_tokens,
            "messages call completed"
        );

        Ok(LlmResponse {
            text,
            stop_reason: result.stop_reason,
            usage: TokenUsage {
                input_tokens: result.usage.input_tokens,
                output_tokens: result.usage.output_tokens,
            },
        })
    }
}
