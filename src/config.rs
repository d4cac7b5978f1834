//! Application configuration
//!
//! The binary loads a YAML configuration file describing the chat endpoint,
//! default decoding parameters, the agent's system prompt, and where the
//! MCP-server document lives. Every section has serde defaults so a partial
//! (or absent) file works; the API key itself is never stored in the file,
//! only the name of the environment variable that holds it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::chat::decoding::DecodingConfig;
use crate::error::{McpilotError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat endpoint settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Default decoding parameters.
    #[serde(default)]
    pub decoding: DecodingConfig,
    /// Agent behavior settings.
    #[serde(default)]
    pub agent: AgentSettings,
    /// Path to the `{"mcpServers": {...}}` JSON document, if any.
    #[serde(default)]
    pub mcp_servers: Option<String>,
}

/// Chat endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root; `/chat/completions` is appended per request.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Agent behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// System prompt anchored at the top of every transcript.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// IO errors for an unreadable file, YAML errors for a malformed one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate endpoint and decoding settings.
    ///
    /// # Errors
    ///
    /// [`McpilotError::Config`] for an empty base URL or key variable name;
    /// decoding range violations propagate from
    /// [`DecodingConfig::validate`].
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(McpilotError::Config("api.base_url must not be empty".into()).into());
        }
        if self.api.api_key_env.trim().is_empty() {
            return Err(McpilotError::Config("api.api_key_env must not be empty".into()).into());
        }
        self.decoding.validate()
    }

    /// Read the API key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// [`McpilotError::Config`] when the variable is unset or empty.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(McpilotError::Config(format!(
                "environment variable {} is not set",
                self.api.api_key_env
            ))
            .into()),
        }
    }
}
