//! Agent loop over a real MCP subprocess
//!
//! Wires the full stack together: a scripted chat stub stands in for the
//! LLM, while tool calls flow through the registry, the server manager, and
//! a live `mcp-echo-server` subprocess.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mcpilot::agent::Agent;
use mcpilot::chat::client::ChatApi;
use mcpilot::chat::decoding::DecodingConfig;
use mcpilot::chat::types::{ChatMessage, ToolCall, ToolDefinition};
use mcpilot::error::Result;
use mcpilot::mcp::manager::ServerManager;
use mcpilot::tools::filtered::FilteredRegistry;
use mcpilot::tools::registry::McpToolRegistry;
use mcpilot::tools::ToolRegistry;

fn echo_server_exe() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_mcp-echo-server")
        .map(PathBuf::from)
        .expect("CARGO_BIN_EXE_mcp-echo-server is set by cargo for integration tests")
}

/// Chat stub replaying a fixed script; records the tool names it was shown.
struct ScriptedChat {
    responses: Mutex<Vec<ChatMessage>>,
    calls: AtomicUsize,
    seen_tools: Mutex<Vec<Vec<String>>>,
}

impl ScriptedChat {
    fn new(responses: Vec<ChatMessage>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
            seen_tools: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatApi for ScriptedChat {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        tools: &[ToolDefinition],
        _decoding: Option<&DecodingConfig>,
    ) -> Result<ChatMessage> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tools.lock().unwrap().push(
            tools
                .iter()
                .map(|t| t.function.name.clone())
                .collect(),
        );
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_else(|| ChatMessage::assistant("script exhausted")))
    }
}

async fn mcp_registry() -> (Arc<McpToolRegistry>, &'static ServerManager) {
    let manager: &'static ServerManager = Box::leak(Box::new(ServerManager::new()));
    let registry = Arc::new(McpToolRegistry::with_manager(manager));
    let document = serde_json::json!({
        "mcpServers": {
            "echo": { "command": echo_server_exe().to_string_lossy() }
        }
    })
    .to_string();
    registry.initialize(&document).await.unwrap();
    (registry, manager)
}

#[tokio::test]
async fn test_weather_turn_through_real_subprocess() {
    let (registry, manager) = mcp_registry().await;
    let chat = ScriptedChat::new(vec![
        ChatMessage::assistant_with_tools(vec![ToolCall::new(
            "c1",
            "get_weather",
            r#"{"location":"Hangzhou"}"#,
        )]),
        ChatMessage::assistant("The weather in Hangzhou is 24°C, Partly Cloudy"),
    ]);

    let mut agent = Agent::new(
        Arc::clone(&chat) as Arc<dyn ChatApi>,
        Arc::clone(&registry) as Arc<dyn ToolRegistry>,
        "You are a helpful assistant.",
        DecodingConfig::default(),
    );

    let reply = agent
        .send_message("What's the weather in Hangzhou?", None)
        .await
        .unwrap();
    assert_eq!(
        reply.content.as_deref(),
        Some("The weather in Hangzhou is 24°C, Partly Cloudy")
    );

    // The tool result that came off the subprocess is in the transcript.
    let tool_msg = agent
        .transcript()
        .iter()
        .find(|m| m.role == "tool")
        .unwrap();
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
    assert_eq!(tool_msg.content.as_deref(), Some("24°C, Partly Cloudy"));

    registry.shutdown().await.unwrap();
    assert_eq!(manager.server_count().await, 0);
}

#[tokio::test]
async fn test_filtered_view_restricts_catalogue_and_dispatch() {
    let (registry, manager) = mcp_registry().await;
    let filtered = Arc::new(FilteredRegistry::new(
        Arc::clone(&registry) as Arc<dyn ToolRegistry>,
        Some(["get_weather".to_string()].into_iter().collect()),
    ));

    let chat = ScriptedChat::new(vec![
        ChatMessage::assistant_with_tools(vec![ToolCall::new(
            "c1",
            "get_weather",
            r#"{"location":"Paris"}"#,
        )]),
        ChatMessage::assistant("Paris: 20°C, Cloudy"),
    ]);

    let mut agent = Agent::new(
        Arc::clone(&chat) as Arc<dyn ChatApi>,
        Arc::clone(&filtered) as Arc<dyn ToolRegistry>,
        "sys",
        DecodingConfig::default(),
    );
    agent.send_message("Paris weather?", None).await.unwrap();

    // The model only ever saw the filtered catalogue.
    let seen = chat.seen_tools.lock().unwrap().clone();
    for tools in &seen {
        assert_eq!(tools, &vec!["get_weather".to_string()]);
    }

    // Direct dispatch of the hidden tool is denied without reaching the
    // subprocess.
    let denied = filtered
        .execute(&ToolCall::new("c9", "echo", r#"{"message":"x"}"#), None)
        .await;
    assert!(denied.is_err());
    assert!(denied.unwrap_err().to_string().contains("Access denied"));

    registry.shutdown().await.unwrap();
    assert_eq!(manager.server_count().await, 0);
}
