//! Error types for mcpilot
//!
//! This module defines all error types used throughout the runtime,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for mcpilot operations
///
/// This enum encompasses every failure class the runtime distinguishes:
/// argument validation, the upstream chat endpoint, MCP subprocess
/// lifecycle, tool dispatch, and agent policy enforcement.
#[derive(Error, Debug)]
pub enum McpilotError {
    /// Configuration file errors (missing sections, unreadable documents)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller-supplied value failed validation (decoding parameter out of
    /// range, duplicate initialization, allow-list naming an unknown tool)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The chat endpoint returned a non-success status or a malformed body
    #[error("Upstream error (status {status}): {body}")]
    Upstream {
        /// HTTP status code returned by the endpoint
        status: u16,
        /// Body excerpt for diagnostics
        body: String,
    },

    /// The MCP subprocess could not be spawned
    #[error("MCP spawn error: {0}")]
    McpSpawn(String),

    /// Tool discovery failed on the primary and every fallback method
    #[error("MCP discovery error: {0}")]
    McpDiscovery(String),

    /// An MCP request did not complete within its timeout
    #[error("MCP timeout: server={server}, method={method}")]
    McpTimeout {
        /// Server identifier
        server: String,
        /// JSON-RPC method that timed out
        method: String,
    },

    /// The MCP server reported a failure (JSON-RPC error or `isError` result)
    #[error("MCP tool failure: {0}")]
    McpToolFailure(String),

    /// Transport-level failure (closed channel, broken pipe)
    #[error("MCP transport error: {0}")]
    McpTransport(String),

    /// Operation attempted on a disposed client, or the client's reader
    /// terminated while requests were in flight
    #[error("MCP client disposed: {0}")]
    ClientDisposed(String),

    /// A tool name was rejected by the allow-list policy
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The agent loop exceeded its round bound within one user turn
    #[error("Runaway loop: conversation exceeded {limit} chat rounds")]
    RunawayLoop {
        /// The round bound that was hit
        limit: usize,
    },

    /// No executor is registered under the requested tool name
    #[error("No executor for tool: {0}")]
    NoExecutor(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for mcpilot operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
