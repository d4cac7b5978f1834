//! MCP (Model Context Protocol) client support
//!
//! This module lets the runtime connect to external MCP servers over
//! newline-delimited JSON-RPC 2.0 stdio and consume their tools.
//!
//! # Module Layout
//!
//! - `types`     -- JSON-RPC primitives and the MCP wire subset the runtime speaks
//! - `config`    -- Per-server configuration and the `mcpServers` document
//! - `logging`   -- Subprocess stderr forwarding and the `MCP_LOG_LEVEL` threshold
//! - `transport` -- `Transport` trait with stdio and scripted-fake implementations
//! - `client`    -- `McpClient`: one subprocess, multiplexed requests, tool cache
//! - `manager`   -- `ServerManager`: process-wide dedup and refcounting

pub mod client;
pub mod config;
pub mod logging;
pub mod manager;
pub mod transport;
pub mod types;

pub use client::{ClientState, McpClient, DEFAULT_CALL_TIMEOUT, DISCOVERY_TIMEOUT};
pub use config::{McpServerConfig, McpServersDocument};
pub use manager::{ServerManager, ServerStatus};
