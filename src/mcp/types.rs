//! JSON-RPC 2.0 primitives and MCP wire types
//!
//! This module defines the subset of the Model Context Protocol wire format
//! that the runtime speaks: JSON-RPC framing, tool discovery entries, and
//! `tools/call` request/response shapes. All types derive `Debug`, `Clone`,
//! `Serialize`, and `Deserialize`. Struct fields are `camelCase` on the wire
//! via `#[serde(rename_all = "camelCase")]` where the protocol requires it,
//! and `Option<>` fields omit their key from JSON when `None`.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Method constants
// ---------------------------------------------------------------------------

/// Request a list of available tools.
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Invoke a named tool.
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Discovery methods tried in order until one returns a non-empty tool list.
///
/// `tools/list` is the standard method; the rest are fallbacks for servers
/// that predate or deviate from it.
pub const DISCOVERY_METHODS: &[&str] = &[
    METHOD_TOOLS_LIST,
    "list_tools",
    "tools.list",
    "get_tools",
    "tools/get",
];

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 wire types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request object.
///
/// `jsonrpc` MUST always be `"2.0"`. `id` is `None` only for notifications,
/// which this client never sends.
///
/// # Examples
///
/// ```
/// use mcpilot::mcp::types::JsonRpcRequest;
///
/// let req = JsonRpcRequest::new(1, "tools/list", serde_json::json!({}));
/// assert_eq!(req.jsonrpc, "2.0");
/// assert_eq!(req.method, "tools/list");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Request correlation identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Build a request with an integer id.
    pub fn new(id: u64, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.into(),
            params: Some(params),
        }
    }
}

/// A JSON-RPC 2.0 response object.
///
/// Exactly one of `result` or `error` is present in a valid response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Mirrors the `id` from the corresponding request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Successful result value; mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error object; mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a successful response mirroring the request id.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response mirroring the request id.
    pub fn failure(id: serde_json::Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// A JSON-RPC 2.0 error object.
///
/// Implements `Display` as `"JSON-RPC error {code}: {message}"`.
///
/// # Examples
///
/// ```
/// use mcpilot::mcp::types::JsonRpcError;
///
/// let e = JsonRpcError { code: -32601, message: "Method not found".to_string(), data: None };
/// assert_eq!(e.to_string(), "JSON-RPC error -32601: Method not found");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code as defined by JSON-RPC 2.0.
    pub code: i64,
    /// Human-readable error description.
    pub message: String,
    /// Optional additional error context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

// ---------------------------------------------------------------------------
// Tool discovery types
// ---------------------------------------------------------------------------

/// A tool entry as it appears in a discovery response.
///
/// # Examples
///
/// ```
/// use mcpilot::mcp::types::McpToolInfo;
///
/// let tool: McpToolInfo = serde_json::from_value(serde_json::json!({
///     "name": "echo",
///     "description": "Echo a message",
///     "inputSchema": { "type": "object" }
/// })).unwrap();
/// assert_eq!(tool.name, "echo");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolInfo {
    /// Unique name of the tool within its server.
    pub name: String,
    /// Human-readable description of the tool's purpose.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the tool's input parameters.
    #[serde(default = "default_input_schema")]
    pub input_schema: serde_json::Value,
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object" })
}

/// The `result` payload of a discovery response.
///
/// `tools` is optional so that a server answering `{"result": {}}` parses
/// cleanly and simply yields no tools (triggering the fallback methods).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Tools advertised by the server; absent means "none via this method".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<McpToolInfo>>,
}

// ---------------------------------------------------------------------------
// Tool call types
// ---------------------------------------------------------------------------

/// Parameters for a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments to pass to the tool, as a JSON object.
    pub arguments: serde_json::Value,
}

/// A single content item in a tool response, discriminated by `"type"`.
///
/// # Examples
///
/// ```
/// use mcpilot::mcp::types::ToolContent;
///
/// let c = ToolContent::Text { text: "hello".to_string() };
/// let json = serde_json::to_value(&c).unwrap();
/// assert_eq!(json["type"], "text");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text output.
    Text {
        /// The text content.
        text: String,
    },
    /// A base64-encoded image.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type of the image (e.g. `"image/png"`).
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// The `result` payload of a `tools/call` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// The content items produced by the tool.
    pub content: Vec<ToolContent>,
    /// When `true`, the tool signalled an error condition within its content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Build a successful single-text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// Build an in-band error result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: Some(true),
        }
    }
}

/// Render a `tools/call` result value as the string handed back to the LLM.
///
/// A result carrying a `content` array has all its `"text"` items
/// concatenated with `\n`; any other shape is returned stringified.
pub fn render_call_result(result: &serde_json::Value) -> String {
    match result.get("content").and_then(|c| c.as_array()) {
        Some(items) => items
            .iter()
            .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        None => result.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let req = JsonRpcRequest::new(42, METHOD_TOOLS_LIST, serde_json::json!({}));
        let val = serde_json::to_value(&req).unwrap();
        assert_eq!(val["jsonrpc"], "2.0");
        assert_eq!(val["id"], 42);
        let back: JsonRpcRequest = serde_json::from_value(val).unwrap();
        assert_eq!(back.method, "tools/list");
    }

    #[test]
    fn test_response_success_shape() {
        let resp = JsonRpcResponse::success(serde_json::json!(7), serde_json::json!({"ok": true}));
        let val = serde_json::to_value(&resp).unwrap();
        assert_eq!(val["id"], 7);
        assert_eq!(val["result"]["ok"], true);
        assert!(val.get("error").is_none());
    }

    #[test]
    fn test_response_failure_shape() {
        let resp = JsonRpcResponse::failure(serde_json::json!(7), -32601, "Method not found");
        let val = serde_json::to_value(&resp).unwrap();
        assert_eq!(val["error"]["code"], -32601);
        assert!(val.get("result").is_none());
    }

    #[test]
    fn test_json_rpc_error_display() {
        let e = JsonRpcError {
            code: -32600,
            message: "Invalid Request".to_string(),
            data: None,
        };
        assert_eq!(e.to_string(), "JSON-RPC error -32600: Invalid Request");
    }

    #[test]
    fn test_tool_info_parses_input_schema() {
        let tool: McpToolInfo = serde_json::from_value(serde_json::json!({
            "name": "search",
            "description": "Search the web",
            "inputSchema": { "type": "object", "properties": { "q": { "type": "string" } } }
        }))
        .unwrap();
        assert_eq!(tool.name, "search");
        assert_eq!(tool.input_schema["type"], "object");
    }

    #[test]
    fn test_tool_info_missing_schema_defaults_to_object() {
        let tool: McpToolInfo =
            serde_json::from_value(serde_json::json!({ "name": "bare" })).unwrap();
        assert_eq!(tool.input_schema, serde_json::json!({ "type": "object" }));
    }

    #[test]
    fn test_list_tools_result_tolerates_empty_object() {
        let result: ListToolsResult = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(result.tools.is_none());
    }

    #[test]
    fn test_tool_content_text_roundtrip() {
        let c = ToolContent::Text {
            text: "hello".to_string(),
        };
        let val = serde_json::to_value(&c).unwrap();
        assert_eq!(val["type"], "text");
        let back: ToolContent = serde_json::from_value(val).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_call_tool_result_error_flag() {
        let result = CallToolResult::error("boom");
        let val = serde_json::to_value(&result).unwrap();
        assert_eq!(val["isError"], true);
        assert_eq!(val["content"][0]["text"], "boom");
    }

    #[test]
    fn test_render_call_result_concatenates_text_items() {
        let result = serde_json::json!({
            "content": [
                { "type": "text", "text": "line one" },
                { "type": "image", "data": "...", "mimeType": "image/png" },
                { "type": "text", "text": "line two" }
            ]
        });
        assert_eq!(render_call_result(&result), "line one\nline two");
    }

    #[test]
    fn test_render_call_result_stringifies_non_content_results() {
        let result = serde_json::json!({ "value": 42 });
        assert_eq!(render_call_result(&result), r#"{"value":42}"#);
    }

    #[test]
    fn test_discovery_methods_order() {
        assert_eq!(DISCOVERY_METHODS[0], "tools/list");
        assert_eq!(
            &DISCOVERY_METHODS[1..],
            &["list_tools", "tools.list", "get_tools", "tools/get"]
        );
    }
}
