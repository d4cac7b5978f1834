//! Conversation message types and the chat-completions tool wire format
//!
//! [`ChatMessage`] is the transcript unit exchanged with the LLM. Messages
//! follow the OpenAI chat-completions shape: a role string, optional
//! content, optional tool calls (assistant only), and an optional
//! correlating tool-call id (tool only).

use serde::{Deserialize, Serialize};

/// Role string constants.
pub const ROLE_SYSTEM: &str = "system";
/// The user role.
pub const ROLE_USER: &str = "user";
/// The assistant role.
pub const ROLE_ASSISTANT: &str = "assistant";
/// The tool-result role.
pub const ROLE_TOOL: &str = "tool";

/// One transcript message.
///
/// # Examples
///
/// ```
/// use mcpilot::chat::types::ChatMessage;
///
/// let msg = ChatMessage::user("What's the weather in Hangzhou?");
/// assert_eq!(msg.role, "user");
/// assert!(msg.tool_calls.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant, tool).
    pub role: String,
    /// Text content; assistant messages that only carry tool calls omit it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the tool call this message answers (tool role only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_SYSTEM.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message that only requests tool calls.
    ///
    /// # Examples
    ///
    /// ```
    /// use mcpilot::chat::types::{ChatMessage, ToolCall};
    ///
    /// let call = ToolCall::new("c1", "get_weather", r#"{"location":"Hangzhou"}"#);
    /// let msg = ChatMessage::assistant_with_tools(vec![call]);
    /// assert!(msg.content.is_none());
    /// assert_eq!(msg.tool_calls.as_ref().unwrap().len(), 1);
    /// ```
    pub fn assistant_with_tools(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Create a tool-result message bound to the originating tool call.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ROLE_TOOL.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// The tool calls of this message, empty when absent.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    /// Whether this assistant message requests at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

/// A tool invocation requested by the assistant.
///
/// Ids are opaque strings minted by the LLM; the runtime only correlates
/// them, never parses them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id minted by the LLM.
    pub id: String,
    /// Call type; always `"function"` in the current wire format.
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    /// The function being called.
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    /// Build a function tool call.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// The tool name being invoked.
    pub fn tool_name(&self) -> &str {
        &self.function.name
    }
}

/// The function half of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments as a JSON document serialized into a string (the LLM emits
    /// it that way).
    pub arguments: String,
}

/// A tool advertised to the LLM in a chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The function descriptor.
    pub function: FunctionDefinition,
}

/// The function descriptor inside a [`ToolDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-Schema parameter document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Strict-schema flag, when the endpoint supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl ToolDefinition {
    /// Build a function tool definition.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: Some(description.into()),
                parameters: Some(parameters),
                strict: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_constructors() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
        assert_eq!(ChatMessage::assistant("a").role, "assistant");
        let tool = ChatMessage::tool_result("c1", "out");
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_assistant_with_tools_omits_content() {
        let msg = ChatMessage::assistant_with_tools(vec![ToolCall::new("c1", "echo", "{}")]);
        assert!(msg.content.is_none());
        assert!(msg.has_tool_calls());
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["tool_calls"][0]["type"], "function");
    }

    #[test]
    fn test_tool_call_deserializes_without_type_field() {
        let call: ToolCall = serde_json::from_value(serde_json::json!({
            "id": "c9",
            "function": { "name": "echo", "arguments": "{}" }
        }))
        .unwrap();
        assert_eq!(call.call_type, "function");
        assert_eq!(call.tool_name(), "echo");
    }

    #[test]
    fn test_message_wire_shape_for_tool_result() {
        let msg = ChatMessage::tool_result("c1", "24°C, Partly Cloudy");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "c1");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn test_tool_definition_wire_shape() {
        let def = ToolDefinition::function(
            "get_weather",
            "Look up current weather",
            serde_json::json!({ "type": "object", "properties": { "location": { "type": "string" } } }),
        );
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "get_weather");
        assert!(json["function"].get("strict").is_none());
    }

    #[test]
    fn test_tool_calls_accessor_defaults_empty() {
        let msg = ChatMessage::assistant("plain");
        assert!(msg.tool_calls().is_empty());
        assert!(!msg.has_tool_calls());
    }
}
