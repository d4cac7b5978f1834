//! Reference MCP server speaking newline-delimited JSON-RPC over stdio
//!
//! Exposes two demonstration tools: `echo(message)` returns its input, and
//! `get_weather(location)` returns a canned report. The server answers
//! `tools/list` and `tools/call`, replies with JSON-RPC errors for anything
//! else, and logs `[timestamp] [LEVEL] message` lines on stderr — the shape
//! the client's log forwarder parses. It exists so integration tests (and
//! curious users) can exercise the full stdio pipeline without an external
//! MCP server installed.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use mcpilot::mcp::types::{CallToolResult, JsonRpcResponse};

fn log(level: &str, message: &str) {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    eprintln!("[{ts}] [{level}] {message}");
}

fn tool_catalogue() -> serde_json::Value {
    serde_json::json!({
        "tools": [
            {
                "name": "echo",
                "description": "Echo the given message back verbatim",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string", "description": "Text to echo" }
                    },
                    "required": ["message"]
                }
            },
            {
                "name": "get_weather",
                "description": "Look up the current weather for a location",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "location": { "type": "string", "description": "City name" }
                    },
                    "required": ["location"]
                }
            }
        ]
    })
}

fn call_tool(name: &str, arguments: &serde_json::Value) -> Result<CallToolResult, String> {
    match name {
        "echo" => {
            let message = arguments
                .get("message")
                .and_then(|m| m.as_str())
                .ok_or_else(|| "echo requires a string 'message' argument".to_string())?;
            Ok(CallToolResult::text(message))
        }
        "get_weather" => {
            let location = arguments
                .get("location")
                .and_then(|l| l.as_str())
                .ok_or_else(|| "get_weather requires a string 'location' argument".to_string())?;
            let report = match location {
                "Tokyo" => "28°C, Clear",
                "Paris" => "20°C, Cloudy",
                _ => "24°C, Partly Cloudy",
            };
            Ok(CallToolResult::text(report))
        }
        other => Err(format!("unknown tool: {other}")),
    }
}

fn handle_request(request: &serde_json::Value) -> Option<JsonRpcResponse> {
    let id = request.get("id").cloned()?;
    let method = request.get("method").and_then(|m| m.as_str())?;

    let response = match method {
        "tools/list" => JsonRpcResponse::success(id, tool_catalogue()),
        "tools/call" => {
            let params = request.get("params").cloned().unwrap_or_default();
            let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            match call_tool(name, &arguments) {
                Ok(result) => match serde_json::to_value(&result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => JsonRpcResponse::failure(id, -32603, format!("internal error: {e}")),
                },
                Err(message) => {
                    log("WARN", &format!("tools/call failed: {message}"));
                    JsonRpcResponse::failure(id, -32602, message)
                }
            }
        }
        other => {
            log("DEBUG", &format!("unsupported method: {other}"));
            JsonRpcResponse::failure(id, -32601, format!("Method not found: {other}"))
        }
    };
    Some(response)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    log("INFO", "mcp-echo-server ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                log("WARN", &format!("dropping malformed request line: {e}"));
                continue;
            }
        };

        // Requests without an id are notifications; nothing to answer.
        let Some(response) = handle_request(&request) else {
            continue;
        };
        let serialized = serde_json::to_string(&response)?;
        stdout.write_all(serialized.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    log("INFO", "stdin closed; shutting down");
    Ok(())
}
