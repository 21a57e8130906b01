//! External tests for the providers module and the HTTP client built on it:
//! wire-type edge cases for both chat APIs and failure handling of the client.

use rca_catalog::config::LlmConfig;
use rca_catalog::providers::*;
use rca_catalog::{LlmClient, TextGenerator};

// -- Provider tests -------------------------------------------------------

#[test]
fn test_provider_display_is_lowercase() {
    for p in [Provider::Openai, Provider::Anthropic] {
        let s = p.to_string();
        assert!(s.chars().all(|c| c.is_lowercase()));
    }
}

#[test]
fn test_provider_serde_roundtrip() {
    let json = serde_json::to_string(&Provider::Anthropic).expect("ser");
    assert_eq!(json, "\"anthropic\"");
    let back: Provider = serde_json::from_str(&json).expect("deser");
    assert_eq!(back, Provider::Anthropic);
}

#[test]
fn test_provider_unknown_rejected() {
    assert!(serde_json::from_str::<Provider>("\"ollama\"").is_err());
}

// -- Client against an unreachable service ------------------------------

fn unreachable_config(provider: Provider) -> LlmConfig {
    LlmConfig {
        provider,
        // Port 9 (discard) on localhost: nothing listens, the connect fails fast.
        openai_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
        anthropic_url: "http://127.0.0.1:9/v1/messages".to_string(),
        request_timeout_secs: 5,
        ..LlmConfig::default()
    }
}

#[test]
fn test_client_targets_provider_endpoint() {
    let client = LlmClient::with_api_key(&unreachable_config(Provider::Anthropic), "k").expect("client");
    assert_eq!(client.provider, Provider::Anthropic);
    assert_eq!(client.endpoint, "http://127.0.0.1:9/v1/messages");
    assert!(client.system_prompt.is_none());
}

#[tokio::test]
async fn test_unreachable_openai_is_service_failure() {
    let client = LlmClient::with_api_key(&unreachable_config(Provider::Openai), "k")
        .expect("client")
        .with_system_prompt("architect");
    let err = client.generate("cluster", "gpt-4o-mini").await.expect_err("no service");
    assert!(err.is_service_failure());
}

#[tokio::test]
async fn test_unreachable_anthropic_is_service_failure() {
    let client = LlmClient::with_api_key(&unreachable_config(Provider::Anthropic), "k").expect("client");
    let err = client.generate("cluster", "claude-sonnet-4-20250514").await.expect_err("no service");
    assert!(err.is_service_failure());
}

// -- OpenAI ---------------------------------------------------------------

#[test]
fn test_openai_response_null_content() {
    let json = r#"{"choices":[{"message":{"content":null},"finish_reason":null}]}"#;
    let resp: OpenAIChatResponse = serde_json::from_str(json).expect("deser");
    assert!(resp.first_text().is_none());
}

// -- Anthropic ------------------------------------------------------------

#[test]
fn test_anthropic_request_skips_absent_system() {
    let req = AnthropicRequest {
        model: "claude-sonnet-4-20250514".to_string(),
        messages: vec![AnthropicMessage { role: "user".to_string(), content: "hi".to_string() }],
        max_tokens: 4096,
        temperature: 0.2,
        system: None,
    };
    let json = serde_json::to_string(&req).expect("ser");
    assert!(!json.contains("\"system\""));
    assert!(json.contains("\"max_tokens\":4096"));
}

#[test]
fn test_anthropic_request_includes_system() {
    let req = AnthropicRequest {
        model: "m".to_string(),
        messages: vec![],
        max_tokens: 1,
        temperature: 0.0,
        system: Some("architect".to_string()),
    };
    let parsed: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&req).expect("ser")).expect("parse");
    assert_eq!(parsed["system"], "architect");
}

#[test]
fn test_anthropic_response_joins_text_blocks() {
    let json = r#"{"content":[
        {"type":"text","text":"[{\"pattern\":"},
        {"type":"tool_use","id":"x"},
        {"type":"text","text":"\"P\"}]"}]}"#;
    let resp: AnthropicResponse = serde_json::from_str(json).expect("deser");
    assert_eq!(resp.joined_text().as_deref(), Some(r#"[{"pattern":"P"}]"#));
}

#[test]
fn test_anthropic_response_without_text() {
    let resp: AnthropicResponse = serde_json::from_str(r#"{"content":[]}"#).expect("deser");
    assert!(resp.joined_text().is_none());
    let resp: AnthropicResponse = serde_json::from_str(r#"{}"#).expect("deser");
    assert!(resp.joined_text().is_none());
}
