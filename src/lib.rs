//! mcpilot - LLM orchestration over MCP tool servers
//!
//! This library lets an LLM reached over an OpenAI-compatible
//! chat-completions API drive tools served by out-of-process MCP servers.
//! It multiplexes concurrently-running MCP subprocesses behind a unified
//! tool catalogue, drives the model through iterative chat → tool-call →
//! tool-result → chat rounds until a terminal text reply, and enforces
//! per-conversation policy on which tools an agent may invoke.
//!
//! # Architecture
//!
//! - `mcp`: JSON-RPC framing, the per-server client, and the process-wide
//!   server manager
//! - `tools`: the uniform executor surface, the MCP-backed registry, and
//!   the allow-list view
//! - `chat`: transcript message types, decoding parameters, and the HTTP
//!   chat client
//! - `agent`: the per-conversation loop
//! - `config`: application configuration
//! - `error`: error types and the result alias
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcpilot::agent::Agent;
//! use mcpilot::chat::{DecodingConfig, HttpChatClient};
//! use mcpilot::tools::registry::McpToolRegistry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let chat = Arc::new(HttpChatClient::new("https://api.deepseek.com", "sk-...")?);
//!     let registry = Arc::new(McpToolRegistry::new());
//!     registry.initialize(r#"{ "mcpServers": {} }"#).await?;
//!
//!     let mut agent = Agent::new(
//!         chat,
//!         registry.clone(),
//!         "You are a helpful assistant.",
//!         DecodingConfig::default(),
//!     );
//!     let reply = agent.send_message("Hello!", None).await?;
//!     println!("{}", reply.content.unwrap_or_default());
//!
//!     registry.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod mcp;
pub mod tools;

// Re-export commonly used types
pub use agent::{Agent, MAX_ROUNDS};
pub use chat::{ChatApi, ChatMessage, DecodingConfig, HttpChatClient, ToolCall};
pub use config::Config;
pub use error::{McpilotError, Result};
pub use mcp::{McpClient, McpServerConfig, ServerManager};
pub use tools::filtered::FilteredRegistry;
pub use tools::registry::McpToolRegistry;
pub use tools::{ToolExecutor, ToolRegistry, ToolSpec};
