//! Process-wide MCP server deduplication and reference counting
//!
//! Nothing about an MCP subprocess is caller-specific: two registries built
//! over the same configuration can share one process. [`ServerManager`]
//! keys clients by the configuration's canonical key, hands out shared
//! references with a reference count, replaces entries that have gone
//! unhealthy, and disposes a client when its last reference is released.
//!
//! A single process-wide instance is reachable via
//! [`ServerManager::global`]; independent instances can be constructed for
//! tests.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;

use crate::error::{McpilotError, Result};
use crate::mcp::client::McpClient;
use crate::mcp::config::McpServerConfig;

/// One managed server: the shared client plus its reference count.
struct ManagedServer {
    client: Arc<McpClient>,
    ref_count: usize,
}

/// Snapshot of one entry, as returned by [`ServerManager::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    /// Outstanding references to the client.
    pub ref_count: usize,
    /// Size of the client's cached tool catalogue.
    pub tool_count: usize,
}

/// Deduplicating, reference-counted owner of all MCP clients.
///
/// # Examples
///
/// ```no_run
/// use mcpilot::mcp::config::McpServerConfig;
/// use mcpilot::mcp::manager::ServerManager;
///
/// # async fn example() -> mcpilot::error::Result<()> {
/// let manager = ServerManager::global();
/// let config = McpServerConfig::new("mcp-echo-server", vec![]);
/// let client = manager.acquire("echo", &config).await?;
/// // ... use the client ...
/// manager.release(&config, &client).await?;
/// # Ok(())
/// # }
/// ```
pub struct ServerManager {
    entries: Mutex<HashMap<String, ManagedServer>>,
}

impl ServerManager {
    /// Create an independent manager (tests, embedding).
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide manager instance.
    pub fn global() -> &'static ServerManager {
        static GLOBAL: OnceLock<ServerManager> = OnceLock::new();
        GLOBAL.get_or_init(ServerManager::new)
    }

    /// Get a shared client for `config`, spawning one if needed.
    ///
    /// An existing healthy entry is reused (its reference count grows); an
    /// existing unhealthy entry is disposed and replaced. `name` labels a
    /// newly spawned client in logs and errors.
    ///
    /// # Errors
    ///
    /// Propagates spawn and discovery failures from
    /// [`McpClient::initialize`]; no entry is left behind on failure.
    pub async fn acquire(&self, name: &str, config: &McpServerConfig) -> Result<Arc<McpClient>> {
        let key = config.canonical_key();
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(&key) {
            if entry.client.is_healthy() {
                entry.ref_count += 1;
                tracing::debug!(
                    server = %name,
                    ref_count = entry.ref_count,
                    "reusing MCP client"
                );
                return Ok(Arc::clone(&entry.client));
            }
            tracing::warn!(server = %name, "MCP client unhealthy; recreating");
            let stale = entries.remove(&key).expect("entry present");
            let _ = stale.client.dispose().await;
        }

        let client = Arc::new(McpClient::new(name, config.clone()));
        if let Err(e) = client.initialize().await {
            let _ = client.dispose().await;
            return Err(e);
        }

        entries.insert(
            key,
            ManagedServer {
                client: Arc::clone(&client),
                ref_count: 1,
            },
        );
        Ok(client)
    }

    /// Drop one reference to `client`.
    ///
    /// The entry is only touched when the passed client is the very client
    /// stored under the config's key; a stale reference (for instance one
    /// that was replaced after going unhealthy) is ignored. When the count
    /// reaches zero the client is disposed and the entry removed.
    pub async fn release(&self, config: &McpServerConfig, client: &Arc<McpClient>) -> Result<()> {
        let key = config.canonical_key();
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries.get_mut(&key) else {
            return Ok(());
        };
        if !Arc::ptr_eq(&entry.client, client) {
            return Ok(());
        }

        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count == 0 {
            let entry = entries.remove(&key).expect("entry present");
            drop(entries);
            entry.client.dispose().await?;
        }
        Ok(())
    }

    /// Dispose and remove every entry.
    pub async fn shutdown_all(&self) {
        let mut entries = self.entries.lock().await;
        for (key, entry) in entries.drain() {
            if let Err(e) = entry.client.dispose().await {
                tracing::warn!(server_key = %key, "dispose during shutdown failed: {e}");
            }
        }
    }

    /// Snapshot of every entry's reference count and tool count.
    pub async fn status(&self) -> HashMap<String, ServerStatus> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .map(|(key, entry)| {
                (
                    key.clone(),
                    ServerStatus {
                        ref_count: entry.ref_count,
                        tool_count: entry.client.tool_count(),
                    },
                )
            })
            .collect()
    }

    /// Number of live entries.
    pub async fn server_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Install an already-initialized client under its config key.
    ///
    /// Test seam: lets refcount behavior be exercised without spawning
    /// subprocesses.
    #[doc(hidden)]
    pub async fn install(&self, config: &McpServerConfig, client: Arc<McpClient>) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            config.canonical_key(),
            ManagedServer {
                client,
                ref_count: 1,
            },
        );
    }
}

impl Default for ServerManager {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
