//! OpenAI-compatible chat-completions client
//!
//! [`ChatApi`] is the single-operation seam the agent talks through: submit
//! one turn (messages, advertised tools, decoding parameters) and get back
//! the assistant's message. [`HttpChatClient`] implements it against any
//! OpenAI-compatible endpoint. No retries happen at this layer; back-off
//! policy belongs to callers.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::chat::decoding::DecodingConfig;
use crate::chat::types::{ChatMessage, ToolCall, ToolDefinition, ROLE_ASSISTANT};
use crate::error::{McpilotError, Result};

/// Longest body excerpt carried inside an upstream error.
const BODY_EXCERPT_LEN: usize = 500;

/// One chat turn against an LLM.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Submit the transcript and tool catalogue; return the assistant reply.
    ///
    /// `decoding` falls back to [`DecodingConfig::default`] when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`McpilotError::InvalidArgument`] if the decoding config
    /// fails validation and [`McpilotError::Upstream`] for a non-success
    /// status or a malformed response body.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        decoding: Option<&DecodingConfig>,
    ) -> Result<ChatMessage>;
}

/// HTTP implementation of [`ChatApi`].
///
/// # Examples
///
/// ```no_run
/// use mcpilot::chat::client::HttpChatClient;
///
/// # fn example() -> mcpilot::error::Result<()> {
/// let client = HttpChatClient::new("https://api.deepseek.com", "sk-...")?;
/// # Ok(())
/// # }
/// ```
pub struct HttpChatClient {
    http: Client,
    base_url: String,
    api_key: String,
}

/// Response envelope, OpenAI chat-completions v1.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl HttpChatClient {
    /// Create a client for an OpenAI-compatible endpoint.
    ///
    /// `base_url` is the API root (e.g. `https://api.deepseek.com`); the
    /// `/chat/completions` path is appended per request.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("mcpilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(McpilotError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Assemble the request body: decoding fields flattened at top level,
    /// the transcript under `messages`, and `tools` only when non-empty.
    fn build_body(
        decoding: &DecodingConfig,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<serde_json::Value> {
        let mut body = serde_json::to_value(decoding)?;
        let object = body
            .as_object_mut()
            .ok_or_else(|| McpilotError::InvalidArgument("decoding config must serialize to an object".into()))?;
        object.insert("messages".to_string(), serde_json::to_value(messages)?);
        if !tools.is_empty() {
            object.insert("tools".to_string(), serde_json::to_value(tools)?);
        }
        Ok(body)
    }

    fn excerpt(body: &str) -> String {
        if body.len() <= BODY_EXCERPT_LEN {
            body.to_string()
        } else {
            let mut end = BODY_EXCERPT_LEN;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &body[..end])
        }
    }
}

#[async_trait]
impl ChatApi for HttpChatClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        decoding: Option<&DecodingConfig>,
    ) -> Result<ChatMessage> {
        let default_config;
        let decoding = match decoding {
            Some(config) => config,
            None => {
                default_config = DecodingConfig::default();
                &default_config
            }
        };
        decoding.validate()?;

        let body = Self::build_body(decoding, messages, tools)?;
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %decoding.model, tools = tools.len(), "submitting chat turn");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(McpilotError::Http)?;

        let status = response.status();
        let text = response.text().await.map_err(McpilotError::Http)?;

        if !status.is_success() {
            return Err(McpilotError::Upstream {
                status: status.as_u16(),
                body: Self::excerpt(&text),
            }
            .into());
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|_| McpilotError::Upstream {
                status: status.as_u16(),
                body: Self::excerpt(&text),
            })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| McpilotError::Upstream {
                status: status.as_u16(),
                body: "response carried no choices".to_string(),
            })?;

        Ok(ChatMessage {
            role: choice
                .message
                .role
                .unwrap_or_else(|| ROLE_ASSISTANT.to_string()),
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            tool_call_id: None,
        })
    }
}
