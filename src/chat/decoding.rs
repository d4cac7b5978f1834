//! Validated sampling parameters for chat requests
//!
//! [`DecodingConfig`] bundles the decoding parameters sent to the
//! chat-completions endpoint. Every field has a validated range;
//! `validate()` runs inside the chat client before each request, not only at
//! construction, so a config mutated through the agent's setters is still
//! checked. Wire serialization is snake_case with unset optionals omitted;
//! `logprobs` is always emitted.

use serde::{Deserialize, Serialize};

use crate::error::{McpilotError, Result};

/// Default model name.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Sampling parameters for one chat request.
///
/// # Examples
///
/// ```
/// use mcpilot::chat::decoding::DecodingConfig;
///
/// let config = DecodingConfig::default().with_temperature(0.2).with_max_tokens(1024);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.model, "deepseek-chat");
/// assert_eq!(config.max_tokens, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingConfig {
    /// Model name sent as the `model` field.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature, in `[0, 2]`.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Nucleus-sampling probability mass, in `[0, 1]`.
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Completion token budget, in `[1, 8192]`.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Frequency penalty, in `[-2, 2]`.
    #[serde(default)]
    pub frequency_penalty: f64,
    /// Presence penalty, in `[-2, 2]`.
    #[serde(default)]
    pub presence_penalty: f64,
    /// Optional stop sequences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Whether to request token logprobs. Always emitted on the wire.
    #[serde(default)]
    pub logprobs: bool,
    /// How many top logprobs to return per position, in `[0, 20]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f64 {
    1.0
}

fn default_top_p() -> f64 {
    1.0
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: None,
            logprobs: false,
            top_logprobs: None,
        }
    }
}

impl DecodingConfig {
    /// Check every parameter against its range.
    ///
    /// # Errors
    ///
    /// Returns [`McpilotError::InvalidArgument`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(McpilotError::InvalidArgument("model must not be empty".into()).into());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(McpilotError::InvalidArgument(format!(
                "temperature must be in [0, 2], got {}",
                self.temperature
            ))
            .into());
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(McpilotError::InvalidArgument(format!(
                "top_p must be in [0, 1], got {}",
                self.top_p
            ))
            .into());
        }
        if !(1..=8192).contains(&self.max_tokens) {
            return Err(McpilotError::InvalidArgument(format!(
                "max_tokens must be in [1, 8192], got {}",
                self.max_tokens
            ))
            .into());
        }
        if !(-2.0..=2.0).contains(&self.frequency_penalty) {
            return Err(McpilotError::InvalidArgument(format!(
                "frequency_penalty must be in [-2, 2], got {}",
                self.frequency_penalty
            ))
            .into());
        }
        if !(-2.0..=2.0).contains(&self.presence_penalty) {
            return Err(McpilotError::InvalidArgument(format!(
                "presence_penalty must be in [-2, 2], got {}",
                self.presence_penalty
            ))
            .into());
        }
        if let Some(top_logprobs) = self.top_logprobs {
            if top_logprobs > 20 {
                return Err(McpilotError::InvalidArgument(format!(
                    "top_logprobs must be in [0, 20], got {top_logprobs}"
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Override the model, keeping all other fields.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the temperature, keeping all other fields.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override top_p, keeping all other fields.
    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    /// Override max_tokens, keeping all other fields.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the frequency penalty, keeping all other fields.
    pub fn with_frequency_penalty(mut self, frequency_penalty: f64) -> Self {
        self.frequency_penalty = frequency_penalty;
        self
    }

    /// Override the presence penalty, keeping all other fields.
    pub fn with_presence_penalty(mut self, presence_penalty: f64) -> Self {
        self.presence_penalty = presence_penalty;
        self
    }

    /// Override the stop sequences, keeping all other fields.
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Override the logprobs flag, keeping all other fields.
    pub fn with_logprobs(mut self, logprobs: bool) -> Self {
        self.logprobs = logprobs;
        self
    }

    /// Override top_logprobs, keeping all other fields.
    pub fn with_top_logprobs(mut self, top_logprobs: u32) -> Self {
        self.top_logprobs = Some(top_logprobs);
        self
    }
}
