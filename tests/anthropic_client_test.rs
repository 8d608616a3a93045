//! Anthropic client against a mock HTTP server.

use mockito::{Matcher, Server};
use serde_json::json;

use seer::adapters::llm::anthropic::API_KEY_ENV;
use seer::adapters::llm::AnthropicClient;
use seer::domain::errors::LlmError;
use seer::domain::models::{LlmConfig, RoleConfig};
use seer::domain::ports::LlmClient;

fn config(base_url: String) -> LlmConfig {
    LlmConfig {
        base_url,
        api_key: Some("test-api-key".to_string()),
        request_timeout_secs: 5,
        ..LlmConfig::default()
    }
}

fn role() -> RoleConfig {
    RoleConfig {
        model: "claude-test".to_string(),
        temperature: Some(0.5),
        max_output_tokens: 256,
        system_prompt: Some("You solve puzzles.".to_string()),
        system_prompt_file: None,
    }
}

#[tokio::test]
async fn test_generate_success() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-api-key")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-test",
            "max_tokens": 256,
            "system": "You solve puzzles.",
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "first"},
                    {"type": "text", "text": "second"}
                ]
            }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "text", "text": "Add one."}
                ],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 42, "output_tokens": 7}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = AnthropicClient::new(&config(server.url())).unwrap();
    let response = client
        .generate(&role(), &["first".to_string(), String::new(), "second".to_string()])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.accessible_text().unwrap(), "Add one.");
    assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
    assert_eq!(response.usage.input_tokens, 42);
    assert_eq!(response.usage.output_tokens, 7);
}

#[tokio::test]
async fn test_server_error_is_transient_api_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(529)
        .with_body(r#"{"type":"error","error":{"type":"overloaded_error"}}"#)
        .create_async()
        .await;

    let client = AnthropicClient::new(&config(server.url())).unwrap();
    let err = client.generate(&role(), &["x".to_string()]).await.unwrap_err();

    match &err {
        LlmError::Api { status, body } => {
            assert_eq!(*status, 529);
            assert!(body.contains("overloaded_error"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_bad_request_is_not_transient() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(400)
        .with_body("bad request")
        .create_async()
        .await;

    let client = AnthropicClient::new(&config(server.url())).unwrap();
    let err = client.generate(&role(), &["x".to_string()]).await.unwrap_err();
    assert!(matches!(err, LlmError::Api { status: 400, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_response_without_text_is_blocked() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"content": [], "stop_reason": "refusal", "usage": {}}"#)
        .create_async()
        .await;

    let client = AnthropicClient::new(&config(server.url())).unwrap();
    let response = client.generate(&role(), &["x".to_string()]).await.unwrap();
    assert!(matches!(
        response.accessible_text(),
        Err(LlmError::Blocked { reason }) if reason == "refusal"
    ));
}

#[tokio::test]
async fn test_missing_key_fails_without_request() {
    let mut config = config("http://127.0.0.1:9".to_string());
    config.api_key = None;
    let client = temp_env::with_var_unset(API_KEY_ENV, || AnthropicClient::new(&config)).unwrap();

    assert!(!client.has_api_key());
    let err = client.generate(&role(), &["x".to_string()]).await.unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey));
}

#[tokio::test]
async fn test_key_falls_back_to_environment() {
    let mut config = config("http://127.0.0.1:9".to_string());
    config.api_key = None;
    let client =
        temp_env::with_var(API_KEY_ENV, Some("from-env"), || AnthropicClient::new(&config)).unwrap();
    assert!(client.has_api_key());
}
