//! Configuration loading
//!
//! Values come from an optional `rca-catalog.toml`, then CLI flags override
//! them. API keys are never read from the file; see [`crate::llm::LlmClient`].

use crate::catalog::merge::MergePolicy;
use crate::error::Result;
use crate::providers::Provider;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "rca-catalog.toml";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_CATALOG_PATH: &str = "RCA_Master_Catalog.csv";

/// Find a config file by walking up the directory tree from `start`.
fn find_config_file(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

/// Top-level configuration (from rca-catalog.toml)
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Text-generation service section
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 0 disables the timeout.
    #[serde(default)]
    pub request_timeout_secs: u64,
    #[serde(default = "default_openai_url")]
    pub openai_url: String,
    #[serde(default = "default_anthropic_url")]
    pub anthropic_url: String,
}

/// Catalog store section
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub merge_policy: MergePolicy,
}

fn default_provider() -> Provider {
    Provider::Openai
}

fn default_model() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from(DEFAULT_CATALOG_PATH)
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: 0,
            openai_url: default_openai_url(),
            anthropic_url: default_anthropic_url(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            merge_policy: MergePolicy::default(),
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Endpoint for the configured provider.
    pub fn endpoint(&self) -> &str {
        match self.provider {
            Provider::Openai => &self.openai_url,
            Provider::Anthropic => &self.anthropic_url,
        }
    }
}

impl AgentConfig {
    /// Load config.
    ///
    /// Search order:
    /// 1. `explicit`, when given (must exist)
    /// 2. rca-catalog.toml walking up from the current directory
    /// 3. defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::debug!("Loading config from: {}", path.display());
            return Self::load_from_path(path);
        }
        let found = std::env::current_dir()
            .ok()
            .and_then(|cwd| find_config_file(&cwd, CONFIG_FILE_NAME));
        match found {
            Some(path) => {
                tracing::debug!("Loading config from: {}", path.display());
                Self::load_from_path(&path)
            }
            None => {
                tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Select the appropriate default model for the given provider when the user
/// hasn't explicitly chosen one (i.e. the model is still the OpenAI default).
pub fn resolve_model(provider: Provider, model: &str) -> String {
    if provider == Provider::Anthropic && model == DEFAULT_OPENAI_MODEL {
        DEFAULT_ANTHROPIC_MODEL.to_string()
    } else {
        model.to_string()
    }
}
