//! MCP server configuration types
//!
//! This module defines the configuration of a single MCP server subprocess
//! and the `{"mcpServers": {...}}` document that names a set of them. The
//! canonical key derived from a configuration is what the
//! [`ServerManager`](crate::mcp::manager::ServerManager) uses to share one
//! subprocess between identical configurations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration for one MCP server subprocess.
///
/// Unknown fields in the source document are ignored. `env` is overlaid on
/// the parent process environment when the subprocess is spawned.
///
/// # Examples
///
/// ```
/// use mcpilot::mcp::config::McpServerConfig;
///
/// let cfg: McpServerConfig = serde_json::from_value(serde_json::json!({
///     "command": "npx",
///     "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
/// })).unwrap();
/// assert_eq!(cfg.command, "npx");
/// assert!(cfg.env.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    /// Executable to spawn.
    pub command: String,
    /// Command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables overlaid on the parent environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Optional working directory for the subprocess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

impl McpServerConfig {
    /// Build a config from a command and arguments, with empty environment.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            working_directory: None,
        }
    }

    /// The deterministic key under which this configuration is deduplicated.
    ///
    /// Two configurations with the same key share one subprocess. The key is
    /// the tuple `(command, space-joined args, pipe-joined "K=V" env entries,
    /// working directory)`; env entries are sorted by key so that map
    /// iteration order cannot produce distinct keys for equal configs.
    pub fn canonical_key(&self) -> String {
        let mut env_entries: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        env_entries.sort();

        format!(
            "{} :: {} :: {} :: {}",
            self.command,
            self.args.join(" "),
            env_entries.join("|"),
            self.working_directory
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    }
}

/// The `{"mcpServers": {...}}` configuration document.
///
/// # Examples
///
/// ```
/// use mcpilot::mcp::config::McpServersDocument;
///
/// let doc: McpServersDocument = serde_json::from_str(r#"{
///     "mcpServers": {
///         "files": { "command": "mcp-files", "args": [] }
///     }
/// }"#).unwrap();
/// assert_eq!(doc.mcp_servers.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServersDocument {
    /// Logical server name to its subprocess configuration.
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}
