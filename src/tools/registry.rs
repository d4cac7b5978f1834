//! MCP-backed tool registry
//!
//! [`McpToolRegistry`] is the concrete registry the runtime uses: an
//! executor map that can be populated by hand (built-ins, tests) or loaded
//! from a `{"mcpServers": {...}}` document. Loading acquires one shared
//! [`McpClient`](crate::mcp::client::McpClient) per server through the
//! [`ServerManager`](crate::mcp::manager::ServerManager) and registers an
//! executor for every discovered tool. A server that fails to come up is
//! logged and skipped; the registry still initializes with whatever tools
//! succeeded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::chat::types::ToolCall;
use crate::error::{McpilotError, Result};
use crate::mcp::client::McpClient;
use crate::mcp::config::{McpServerConfig, McpServersDocument};
use crate::mcp::manager::ServerManager;
use crate::tools::{McpToolExecutor, ToolExecutor, ToolRegistry, ToolSpec};

/// Executor map plus the MCP client references it holds alive.
pub struct McpToolRegistry {
    executors: RwLock<HashMap<String, Arc<dyn ToolExecutor>>>,
    /// Clients acquired during initialization, released on shutdown.
    acquired: Mutex<Vec<(McpServerConfig, Arc<McpClient>)>>,
    initialized: AtomicBool,
    manager: &'static ServerManager,
}

impl McpToolRegistry {
    /// Create an empty registry bound to the process-wide server manager.
    pub fn new() -> Self {
        Self::with_manager(ServerManager::global())
    }

    /// Create an empty registry bound to a specific manager (tests).
    pub fn with_manager(manager: &'static ServerManager) -> Self {
        Self {
            executors: RwLock::new(HashMap::new()),
            acquired: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
            manager,
        }
    }

    /// Load MCP servers from a `{"mcpServers": {...}}` JSON document.
    ///
    /// Initialization is idempotency-guarded: a second call fails. A parse
    /// failure of the document itself aborts (and clears the guard so a
    /// corrected document can be retried); a failure of one server does not
    /// abort the others.
    ///
    /// # Errors
    ///
    /// [`McpilotError::InvalidArgument`] on a repeated call;
    /// [`McpilotError::Config`] when the document does not parse.
    pub async fn initialize(&self, document: &str) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(
                McpilotError::InvalidArgument("tool registry is already initialized".into()).into(),
            );
        }

        let parsed: McpServersDocument = match serde_json::from_str(document) {
            Ok(doc) => doc,
            Err(e) => {
                self.initialized.store(false, Ordering::SeqCst);
                return Err(
                    McpilotError::Config(format!("invalid mcpServers document: {e}")).into(),
                );
            }
        };

        for (name, config) in parsed.mcp_servers {
            match self.manager.acquire(&name, &config).await {
                Ok(client) => {
                    self.register_client_tools(&name, Arc::clone(&client)).await;
                    self.acquired.lock().await.push((config, client));
                }
                Err(e) => {
                    tracing::warn!(server = %name, "skipping MCP server: {e}");
                }
            }
        }
        Ok(())
    }

    /// Register an executor for every tool the client discovered.
    async fn register_client_tools(&self, server: &str, client: Arc<McpClient>) {
        let mut executors = self.executors.write().await;
        for info in client.tools() {
            let spec = ToolSpec::from(info);
            if executors.contains_key(&spec.name) {
                tracing::warn!(
                    server = %server,
                    tool = %spec.name,
                    "tool name collision; later server wins"
                );
            }
            let executor: Arc<dyn ToolExecutor> =
                Arc::new(McpToolExecutor::new(Arc::clone(&client), spec.clone()));
            executors.insert(spec.name, executor);
        }
    }

    /// Whether `initialize` has run (successfully or with partial failures).
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Drop every executor and release every acquired client reference.
    pub async fn shutdown(&self) -> Result<()> {
        self.executors.write().await.clear();
        let acquired: Vec<_> = self.acquired.lock().await.drain(..).collect();
        for (config, client) in acquired {
            if let Err(e) = self.manager.release(&config, &client).await {
                tracing::warn!(server = %client.name(), "release during shutdown failed: {e}");
            }
        }
        Ok(())
    }
}

impl Default for McpToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRegistry for McpToolRegistry {
    async fn list_tools(&self) -> Vec<ToolSpec> {
        self.executors
            .read()
            .await
            .values()
            .map(|executor| executor.as_tool_spec())
            .collect()
    }

    async fn executor_count(&self) -> usize {
        self.executors.read().await.len()
    }

    async fn find(&self, call: &ToolCall) -> Option<Arc<dyn ToolExecutor>> {
        self.executors.read().await.get(call.tool_name()).cloned()
    }

    async fn execute(&self, call: &ToolCall, timeout: Option<Duration>) -> Result<String> {
        let executor = self
            .find(call)
            .await
            .ok_or_else(|| McpilotError::NoExecutor(call.tool_name().to_string()))?;
        executor.execute(call, timeout).await
    }

    async fn register(&self, executor: Arc<dyn ToolExecutor>) {
        let name = executor.name().to_string();
        self.executors.write().await.insert(name, executor);
    }

    async fn clear(&self) {
        self.executors.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::InProcessTool;

    fn in_process(name: &str, reply: &'static str) -> Arc<dyn ToolExecutor> {
        Arc::new(InProcessTool::new(
            name,
            format!("{name} tool"),
            serde_json::json!({ "type": "object" }),
            move |_args| Box::pin(async move { Ok(reply.to_string()) }),
        ))
    }

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let registry = McpToolRegistry::new();
        registry.register(in_process("alpha", "a")).await;
        registry.register(in_process("beta", "b")).await;

        assert_eq!(registry.executor_count().await, 2);
        let out = registry
            .execute(&ToolCall::new("c1", "beta", "{}"), None)
            .await
            .unwrap();
        assert_eq!(out, "b");
    }

    #[tokio::test]
    async fn test_listing_resolves_back_through_find() {
        let registry = McpToolRegistry::new();
        registry.register(in_process("alpha", "a")).await;

        for spec in registry.list_tools().await {
            let call = ToolCall::new("c", &spec.name, "{}");
            let executor = registry.find(&call).await.expect("listed tool must resolve");
            assert_eq!(executor.name(), spec.name);
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration_overwrites() {
        let registry = McpToolRegistry::new();
        registry.register(in_process("dup", "first")).await;
        registry.register(in_process("dup", "second")).await;

        assert_eq!(registry.executor_count().await, 1);
        let out = registry
            .execute(&ToolCall::new("c1", "dup", "{}"), None)
            .await
            .unwrap();
        assert_eq!(out, "second");
    }

    #[tokio::test]
    async fn test_execute_unknown_tool_is_no_executor_error() {
        let registry = McpToolRegistry::new();
        let result = registry
            .execute(&ToolCall::new("c1", "ghost", "{}"), None)
            .await;
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("No executor for tool"), "got: {msg}");
        assert!(msg.contains("ghost"));
    }

    #[tokio::test]
    async fn test_initialize_twice_fails() {
        let registry = McpToolRegistry::new();
        registry.initialize(r#"{ "mcpServers": {} }"#).await.unwrap();
        let second = registry.initialize(r#"{ "mcpServers": {} }"#).await;
        assert!(second.is_err());
        assert!(second
            .unwrap_err()
            .to_string()
            .contains("already initialized"));
    }

    #[tokio::test]
    async fn test_initialize_bad_document_aborts_and_allows_retry() {
        let registry = McpToolRegistry::new();
        let result = registry.initialize("{ not json").await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Configuration error"));
        assert!(!registry.is_initialized());

        registry.initialize(r#"{ "mcpServers": {} }"#).await.unwrap();
        assert!(registry.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_skips_failing_server() {
        let registry = McpToolRegistry::new();
        // The binary does not exist; the server is skipped, not fatal.
        let document = r#"{
            "mcpServers": {
                "ghost": { "command": "/nonexistent/mcpilot-test-binary" }
            }
        }"#;
        registry.initialize(document).await.unwrap();
        assert!(registry.is_initialized());
        assert_eq!(registry.executor_count().await, 0);
        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_empties_registry() {
        let registry = McpToolRegistry::new();
        registry.register(in_process("alpha", "a")).await;
        registry.clear().await;
        assert_eq!(registry.executor_count().await, 0);
        assert!(registry.list_tools().await.is_empty());
    }
}
