use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Anthropic,
}

impl Provider {
    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Openai => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
        }
    }
}

// -- OpenAI chat completion types -------------------------------------------

#[derive(Debug, Serialize)]
pub struct OpenAIChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct OpenAIChatRequest {
    pub model: String,
    pub messages: Vec<OpenAIChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIResponseMessage,
    #[allow(dead_code)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIChatResponse {
    pub choices: Vec<OpenAIChoice>,
}

impl OpenAIChatResponse {
    /// Content of the first choice, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

// -- Anthropic messages types -----------------------------------------------

#[derive(Debug, Serialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,
}

impl AnthropicResponse {
    /// Concatenation of all text blocks, or `None` when there are none.
    pub fn joined_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.concat())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_display() {
        assert_eq!(Provider::Openai.to_string(), "openai");
        assert_eq!(Provider::Anthropic.to_string(), "anthropic");
    }

    #[test]
    fn test_provider_api_key_vars() {
        assert_eq!(Provider::Openai.api_key_var(), "OPENAI_API_KEY");
        assert_eq!(Provider::Anthropic.api_key_var(), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_provider_deserializes_lowercase() {
        let p: Provider = serde_json::from_str("\"anthropic\"").expect("deser");
        assert_eq!(p, Provider::Anthropic);
    }

    #[test]
    fn test_openai_request_serializes() {
        let req = OpenAIChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                OpenAIChatMessage { role: "system".into(), content: "sys".into() },
                OpenAIChatMessage { role: "user".into(), content: "hi".into() },
            ],
            temperature: 0.2,
        };
        let v: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&req).expect("ser")).expect("parse");
        assert_eq!(v["model"], "gpt-4o-mini");
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "hi");
        assert!(v.get("stream").is_none());
    }

    #[test]
    fn test_openai_response_first_text() {
        let json = r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"[]"},"finish_reason":"stop"}]}"#;
        let resp: OpenAIChatResponse = serde_json::from_str(json).expect("deser");
        assert_eq!(resp.first_text(), Some("[]"));
    }

    #[test]
    fn test_openai_response_no_choices() {
        let resp: OpenAIChatResponse = serde_json::from_str(r#"{"choices":[]}"#).expect("deser");
        assert!(resp.first_text().is_none());
    }

    #[test]
    fn test_openai_response_null_content() {
        let json = r#"{"choices":[{"message":{"content":null},"finish_reason":"stop"}]}"#;
        let resp: OpenAIChatResponse = serde_json::from_str(json).expect("deser");
        assert!(resp.first_text().is_none());
    }

    #[test]
    fn test_anthropic_request_skips_missing_system() {
        let req = AnthropicRequest {
            model: "claude".into(),
            messages: vec![AnthropicMessage { role: "user".into(), content: "x".into() }],
            max_tokens: 16,
            temperature: 0.2,
            system: None,
        };
        let json = serde_json::to_string(&req).expect("ser");
        assert!(!json.contains("system"));
    }

    #[test]
    fn test_anthropic_response_joins_text_blocks() {
        let json = r#"{"id":"msg_1","content":[{"type":"text","text":"[{"},{"type":"tool_use","id":"t"},{"type":"text","text":"}]"}]}"#;
        let resp: AnthropicResponse = serde_json::from_str(json).expect("deser");
        assert_eq!(resp.joined_text().as_deref(), Some("[{}]"));
    }

    #[test]
    fn test_anthropic_response_without_text() {
        let resp: AnthropicResponse = serde_json::from_str(r#"{"content":[]}"#).expect("deser");
        assert!(resp.joined_text().is_none());
    }
}
