//! Text-generation boundary.
//!
//! Everything above this module sees the service as
//! `generate(prompt, model) -> text`. The text is untrusted; see
//! [`crate::response`] for how it is parsed.

use crate::config::LlmConfig;
use crate::error::{RcaError, Result};
use crate::providers::*;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::VecDeque;
use std::env;
use std::sync::Mutex;

/// System role used for catalog clustering and prevention prompts.
pub const CATALOG_SYSTEM_PROMPT: &str =
    "You are an expert production architect analyzing RCA reports.";

/// System role used for diff analysis.
pub const DIFF_SYSTEM_PROMPT: &str = "You are a production deployment architect. Your task is to analyze code diffs against known RCA failure patterns.";

/// The external text-generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send one prompt, get the reply text back.
    ///
    /// `Err` means the service could not be reached or refused the request;
    /// callers treat that as fatal. A reply that is not the expected shape is
    /// still `Ok`.
    async fn generate(&self, prompt: &str, model: &str) -> Result<String>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        (**self).generate(prompt, model).await
    }
}

// ---------------------------------------------------------------------------
// LlmClient: OpenAI / Anthropic over HTTP
// ---------------------------------------------------------------------------

pub struct LlmClient {
    client: Client,
    api_key: String,
    pub provider: Provider,
    pub endpoint: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Optional system prompt prepended to the conversation.
    pub system_prompt: Option<String>,
}

impl LlmClient {
    /// Build a client for `config.provider`, reading its API key from the
    /// environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let var = config.provider.api_key_var();
        let api_key = env::var(var).map_err(|_| RcaError::MissingApiKey(var))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(LlmClient {
            client: builder.build()?,
            api_key: api_key.into(),
            provider: config.provider,
            endpoint: config.endpoint().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: None,
        })
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    // -----------------------------------------------------------------------
    // OpenAI
    // -----------------------------------------------------------------------

    fn openai_request(&self, prompt: &str, model: &str) -> OpenAIChatRequest {
        let mut messages = Vec::new();
        if let Some(sys) = &self.system_prompt {
            messages.push(OpenAIChatMessage { role: "system".to_string(), content: sys.clone() });
        }
        messages.push(OpenAIChatMessage { role: "user".to_string(), content: prompt.to_string() });
        OpenAIChatRequest {
            model: model.to_string(),
            messages,
            temperature: self.temperature,
        }
    }

    async fn generate_openai(&self, prompt: &str, model: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.openai_request(prompt, model))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(RcaError::Api { provider: self.provider.to_string(), status, body });
        }

        let parsed: OpenAIChatResponse = response.json().await?;
        parsed
            .first_text()
            .map(|t| t.trim().to_string())
            .ok_or_else(|| RcaError::EmptyResponse(self.provider.to_string()))
    }

    // -----------------------------------------------------------------------
    // Anthropic
    // -----------------------------------------------------------------------

    fn anthropic_request(&self, prompt: &str, model: &str) -> AnthropicRequest {
        AnthropicRequest {
            model: model.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: self.system_prompt.clone(),
        }
    }

    async fn generate_anthropic(&self, prompt: &str, model: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&self.anthropic_request(prompt, model))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(RcaError::Api { provider: self.provider.to_string(), status, body });
        }

        let parsed: AnthropicResponse = response.json().await?;
        parsed
            .joined_text()
            .map(|t| t.trim().to_string())
            .ok_or_else(|| RcaError::EmptyResponse(self.provider.to_string()))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        tracing::debug!(
            target: "rca_catalog::llm",
            provider = %self.provider,
            model,
            prompt_chars = prompt.len(),
            "calling text-generation service"
        );
        match self.provider {
            Provider::Openai => self.generate_openai(prompt, model).await,
            Provider::Anthropic => self.generate_anthropic(prompt, model).await,
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator: canned replies
// ---------------------------------------------------------------------------

/// One queued reply of a [`ScriptedGenerator`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// Simulates the service being unreachable.
    Unavailable(String),
}

/// A [`TextGenerator`] that replays queued replies in order and records every
/// prompt it receives. Running out of replies is reported as an empty
/// response, which callers treat as a service failure.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let generator = Self::new();
        for r in replies {
            generator.push_text(r);
        }
        generator
    }

    pub fn push_text(&self, text: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(ScriptedReply::Text(text.into()));
        }
    }

    pub fn push_unavailable(&self, detail: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(ScriptedReply::Unavailable(detail.into()));
        }
    }

    /// `(prompt, model)` pairs received so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push((prompt.to_string(), model.to_string()));
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Unavailable(detail)) => Err(RcaError::Api {
                provider: "scripted".to_string(),
                status: 503,
                body: detail,
            }),
            None => Err(RcaError::EmptyResponse("scripted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider: Provider) -> LlmClient {
        let config = LlmConfig { provider, ..LlmConfig::default() };
        LlmClient::with_api_key(&config, "test-key").expect("client")
    }

    #[test]
    fn test_new_requires_api_key() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        let config = LlmConfig { provider: Provider::Anthropic, ..LlmConfig::default() };
        match LlmClient::new(&config) {
            Err(RcaError::MissingApiKey(var)) => assert_eq!(var, "ANTHROPIC_API_KEY"),
            other => panic!("expected MissingApiKey, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_client_takes_endpoint_for_provider() {
        assert_eq!(client(Provider::Openai).endpoint, "https://api.openai.com/v1/chat/completions");
        assert_eq!(client(Provider::Anthropic).endpoint, "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_openai_request_has_system_then_user() {
        let c = client(Provider::Openai).with_system_prompt(CATALOG_SYSTEM_PROMPT);
        let req = c.openai_request("cluster these", "gpt-4o-mini");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.messages[0].content, CATALOG_SYSTEM_PROMPT);
        assert_eq!(req.messages[1].role, "user");
        assert_eq!(req.messages[1].content, "cluster these");
        assert_eq!(req.temperature, 0.2);
    }

    #[test]
    fn test_openai_request_without_system() {
        let req = client(Provider::Openai).openai_request("p", "m");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.model, "m");
    }

    #[test]
    fn test_anthropic_request_carries_system_field() {
        let c = client(Provider::Anthropic).with_system_prompt(DIFF_SYSTEM_PROMPT);
        let req = c.anthropic_request("diff", "claude");
        assert_eq!(req.system.as_deref(), Some(DIFF_SYSTEM_PROMPT));
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.max_tokens, 4096);
    }

    #[test]
    fn test_scripted_replays_in_order_and_records_prompts() {
        let g = ScriptedGenerator::with_replies(["one", "two"]);
        let a = tokio_test::block_on(g.generate("p1", "m")).expect("first");
        let b = tokio_test::block_on(g.generate("p2", "m")).expect("second");
        assert_eq!((a.as_str(), b.as_str()), ("one", "two"));
        assert_eq!(g.calls(), 2);
        assert_eq!(g.prompts()[1], ("p2".to_string(), "m".to_string()));
    }

    #[test]
    fn test_scripted_exhausted_is_service_failure() {
        let g = ScriptedGenerator::new();
        let err = tokio_test::block_on(g.generate("p", "m")).unwrap_err();
        assert!(err.is_service_failure());
    }

    #[test]
    fn test_scripted_unavailable() {
        let g = ScriptedGenerator::new();
        g.push_unavailable("connection refused");
        let err = tokio_test::block_on(g.generate("p", "m")).unwrap_err();
        assert!(matches!(err, RcaError::Api { status: 503, .. }));
    }

    #[test]
    fn test_boxed_generator_delegates() {
        let g: Box<dyn TextGenerator> = Box::new(ScriptedGenerator::with_replies(["ok"]));
        assert_eq!(tokio_test::block_on(g.generate("p", "m")).expect("reply"), "ok");
    }
}
