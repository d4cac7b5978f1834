//! MCP client: one subprocess, multiplexed requests, cached tool catalogue
//!
//! [`McpClient`] owns a single MCP server connection (normally a subprocess
//! reached over [`StdioTransport`](crate::mcp::transport::stdio::StdioTransport))
//! and multiplexes concurrent requests over it. In-flight requests live in a
//! `pending` map keyed by `u64` request id; each entry is a
//! [`oneshot::Sender`] resolved by a single background reader task when the
//! matching response line arrives. Lines that are not JSON, or whose id
//! matches no pending request, are dropped — they may be stray server output
//! or responses whose caller already timed out.
//!
//! # Lifecycle
//!
//! `New → Initializing → Ready → Disposed`. [`McpClient::initialize`] spawns
//! the transport, starts the reader, waits a short settle interval, and runs
//! tool discovery; every other operation requires `Ready`. A second
//! `initialize` fails. [`McpClient::dispose`] fails all pending requests,
//! stops the reader (bounded, then aborted), and drops the transport, which
//! terminates the subprocess.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{McpilotError, Result};
use crate::mcp::config::McpServerConfig;
use crate::mcp::transport::stdio::StdioTransport;
use crate::mcp::transport::Transport;
use crate::mcp::types::{
    render_call_result, CallToolParams, JsonRpcError, JsonRpcRequest, ListToolsResult,
    McpToolInfo, DISCOVERY_METHODS, METHOD_TOOLS_CALL,
};

/// Default timeout applied to `execute` when the caller does not specify one.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout applied to each discovery-path request.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Interval the client waits after spawning before attempting discovery,
/// giving slow-starting servers time to come up.
pub const SETTLE_INTERVAL: Duration = Duration::from_millis(500);

/// Bound on the graceful reader shutdown during dispose.
const READER_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle state of an [`McpClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Constructed, not yet initialized.
    New,
    /// `initialize` is in progress (or failed partway; the client must be
    /// disposed, not re-initialized).
    Initializing,
    /// Fully operational.
    Ready,
    /// Disposed; all operations fail.
    Disposed,
}

/// The pending-response map: request id to the oneshot resolving it.
type PendingMap = HashMap<u64, oneshot::Sender<std::result::Result<serde_json::Value, JsonRpcError>>>;

/// A long-lived MCP server connection.
///
/// # Examples
///
/// ```no_run
/// use mcpilot::mcp::client::McpClient;
/// use mcpilot::mcp::config::McpServerConfig;
///
/// # async fn example() -> mcpilot::error::Result<()> {
/// let config = McpServerConfig::new("mcp-echo-server", vec![]);
/// let client = McpClient::new("echo", config);
/// client.initialize().await?;
/// let result = client.execute("echo", r#"{"message":"hi"}"#, None).await?;
/// client.dispose().await?;
/// # Ok(())
/// # }
/// ```
pub struct McpClient {
    name: String,
    config: McpServerConfig,
    state: StdMutex<ClientState>,
    /// Monotonically increasing request id counter, starting at 1.
    next_id: AtomicU64,
    pending: Arc<Mutex<PendingMap>>,
    transport: StdMutex<Option<Arc<dyn Transport>>>,
    /// Transport supplied up front instead of spawning a subprocess; the
    /// wiring seam used by tests and embedders.
    preset_transport: StdMutex<Option<Arc<dyn Transport>>>,
    cancel: CancellationToken,
    reader: StdMutex<Option<tokio::task::JoinHandle<()>>>,
    /// Cleared by the reader task on EOF or cancellation.
    reader_alive: Arc<AtomicBool>,
    tools: StdMutex<Vec<McpToolInfo>>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("tool_count", &self.tool_count())
            .finish_non_exhaustive()
    }
}

impl McpClient {
    /// Create an un-initialized client for the given server configuration.
    ///
    /// `name` is the logical server label used in logs and errors.
    pub fn new(name: impl Into<String>, config: McpServerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: StdMutex::new(ClientState::New),
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            transport: StdMutex::new(None),
            preset_transport: StdMutex::new(None),
            cancel: CancellationToken::new(),
            reader: StdMutex::new(None),
            reader_alive: Arc::new(AtomicBool::new(false)),
            tools: StdMutex::new(Vec::new()),
        }
    }

    /// Create a client that uses `transport` instead of spawning the
    /// configured subprocess.
    ///
    /// Used with [`FakeTransport`](crate::mcp::transport::fake::FakeTransport)
    /// in tests; also the seam for embedding a non-stdio connection.
    pub fn with_transport(
        name: impl Into<String>,
        config: McpServerConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let client = Self::new(name, config);
        *client
            .preset_transport
            .lock()
            .expect("preset transport lock") = Some(transport);
        client
    }

    /// The logical server name this client is labelled with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.state.lock().expect("state lock")
    }

    /// The tool catalogue discovered at initialization. Immutable afterwards;
    /// still served from cache after the connection is lost.
    pub fn tools(&self) -> Vec<McpToolInfo> {
        self.tools.lock().expect("tools lock").clone()
    }

    /// Number of cached tools.
    pub fn tool_count(&self) -> usize {
        self.tools.lock().expect("tools lock").len()
    }

    /// Cheap liveness check: the reader is running and discovery produced a
    /// non-empty catalogue. Never round-trips to the subprocess.
    pub fn is_healthy(&self) -> bool {
        self.reader_alive.load(Ordering::SeqCst) && self.tool_count() > 0
    }

    /// Spawn the server, start the reader, and discover its tools.
    ///
    /// # Errors
    ///
    /// - [`McpilotError::InvalidArgument`] if called more than once.
    /// - [`McpilotError::McpSpawn`] if the subprocess fails to spawn.
    /// - [`McpilotError::McpDiscovery`] if the primary and every fallback
    ///   discovery method yield no tools. The client is left un-ready and
    ///   must be disposed by the caller.
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("state lock");
            if *state != ClientState::New {
                return Err(McpilotError::InvalidArgument(format!(
                    "initialize called on MCP client '{}' in state {:?}",
                    self.name, *state
                ))
                .into());
            }
            *state = ClientState::Initializing;
        }

        let transport: Arc<dyn Transport> = {
            let preset = self
                .preset_transport
                .lock()
                .expect("preset transport lock")
                .take();
            match preset {
                Some(t) => t,
                None => StdioTransport::spawn_arc(&self.name, &self.config)?,
            }
        };
        *self.transport.lock().expect("transport lock") = Some(Arc::clone(&transport));

        self.reader_alive.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(read_loop(
            self.name.clone(),
            Arc::clone(&transport),
            Arc::clone(&self.pending),
            self.cancel.clone(),
            Arc::clone(&self.reader_alive),
        ));
        *self.reader.lock().expect("reader lock") = Some(handle);

        tokio::time::sleep(SETTLE_INTERVAL).await;

        let tools = self.discover_tools().await?;
        tracing::info!(
            server = %self.name,
            count = tools.len(),
            "MCP tool discovery complete"
        );
        *self.tools.lock().expect("tools lock") = tools;
        *self.state.lock().expect("state lock") = ClientState::Ready;
        Ok(())
    }

    /// Try each discovery method in order; the first non-empty `tools`
    /// sequence wins. Placeholder tools are never synthesized: a catalogue
    /// the server did not advertise would mislead the model.
    async fn discover_tools(&self) -> Result<Vec<McpToolInfo>> {
        for method in DISCOVERY_METHODS {
            match self
                .request(method, serde_json::json!({}), DISCOVERY_TIMEOUT)
                .await
            {
                Ok(value) => {
                    let parsed: ListToolsResult = match serde_json::from_value(value) {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::debug!(
                                server = %self.name,
                                method,
                                "discovery result did not parse: {e}"
                            );
                            continue;
                        }
                    };
                    match parsed.tools {
                        Some(tools) if !tools.is_empty() => return Ok(tools),
                        _ => {
                            tracing::debug!(
                                server = %self.name,
                                method,
                                "discovery returned no tools; trying next method"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        server = %self.name,
                        method,
                        "discovery request failed: {e}"
                    );
                }
            }
        }
        Err(McpilotError::McpDiscovery(format!(
            "server '{}' advertised no tools via any discovery method",
            self.name
        ))
        .into())
    }

    /// Invoke a tool on the server and return its rendered result string.
    ///
    /// `arguments` is the JSON document the LLM emitted (as a string); it is
    /// parsed into an object before being sent as `tools/call` params. A
    /// result carrying a `content` array has its `"text"` items concatenated
    /// with `\n`; any other result shape is returned stringified.
    ///
    /// # Errors
    ///
    /// - [`McpilotError::ClientDisposed`] if the client is disposed,
    ///   un-initialized, or its reader has terminated.
    /// - [`McpilotError::InvalidArgument`] if `arguments` is not valid JSON.
    /// - [`McpilotError::McpTimeout`] if no response arrives within
    ///   `timeout` (default 30 s); the subprocess stays alive.
    /// - [`McpilotError::McpToolFailure`] on a JSON-RPC error response or an
    ///   `isError: true` result.
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments: &str,
        timeout: Option<Duration>,
    ) -> Result<String> {
        match self.state() {
            ClientState::Ready => {}
            ClientState::Disposed => {
                return Err(McpilotError::ClientDisposed(format!(
                    "MCP client '{}' is disposed",
                    self.name
                ))
                .into())
            }
            other => {
                return Err(McpilotError::InvalidArgument(format!(
                    "MCP client '{}' is not ready (state {:?})",
                    self.name, other
                ))
                .into())
            }
        }
        if !self.reader_alive.load(Ordering::SeqCst) {
            return Err(McpilotError::ClientDisposed(format!(
                "connection to MCP server '{}' was lost",
                self.name
            ))
            .into());
        }

        let arguments: serde_json::Value = if arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(arguments).map_err(|e| {
                McpilotError::InvalidArgument(format!(
                    "arguments for tool '{tool_name}' are not valid JSON: {e}"
                ))
            })?
        };

        let params = CallToolParams {
            name: tool_name.to_string(),
            arguments,
        };
        let result = self
            .request(
                METHOD_TOOLS_CALL,
                serde_json::to_value(params)?,
                timeout.unwrap_or(DEFAULT_CALL_TIMEOUT),
            )
            .await?;

        if result.get("isError").and_then(|e| e.as_bool()) == Some(true) {
            return Err(McpilotError::McpToolFailure(render_call_result(&result)).into());
        }
        Ok(render_call_result(&result))
    }

    /// Send one JSON-RPC request and await its matching response.
    ///
    /// The pending slot is registered before the request is written, so a
    /// response can never arrive before the reader can resolve it. A timeout
    /// removes the slot *before* failing, so a late response line with that
    /// id is stale and silently dropped by the reader.
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        let transport = self
            .transport
            .lock()
            .expect("transport lock")
            .clone()
            .ok_or_else(|| {
                McpilotError::ClientDisposed(format!(
                    "MCP client '{}' has no live transport",
                    self.name
                ))
            })?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let message = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        if let Err(e) = transport.send(message).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(received) => received,
            Err(_) => {
                // Unregister first so the reader drops the stale line.
                self.pending.lock().await.remove(&id);
                return Err(McpilotError::McpTimeout {
                    server: self.name.clone(),
                    method: method.to_string(),
                }
                .into());
            }
        };

        let rpc_result = outcome.map_err(|_| {
            McpilotError::ClientDisposed(format!(
                "MCP client '{}' shut down before a response arrived",
                self.name
            ))
        })?;

        rpc_result.map_err(|e| McpilotError::McpToolFailure(e.to_string()).into())
    }

    /// Tear the client down.
    ///
    /// Every still-pending request fails with a disposed-client error, the
    /// reader task is given [`READER_CLOSE_TIMEOUT`] to exit before being
    /// aborted, and dropping the transport terminates the subprocess.
    /// Idempotent.
    pub async fn dispose(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("state lock");
            if *state == ClientState::Disposed {
                return Ok(());
            }
            *state = ClientState::Disposed;
        }

        self.cancel.cancel();
        self.reader_alive.store(false, Ordering::SeqCst);

        // Dropping the senders resolves every waiting caller with a
        // disposed-client error.
        self.pending.lock().await.clear();

        let handle = self.reader.lock().expect("reader lock").take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(READER_CLOSE_TIMEOUT, handle)
                .await
                .is_err()
            {
                abort.abort();
            }
        }

        // Last transport reference outside the reader; dropping it kills the
        // subprocess (stdio transport sends SIGTERM on drop).
        self.transport.lock().expect("transport lock").take();

        tracing::debug!(server = %self.name, "MCP client disposed");
        Ok(())
    }
}

/// The background reader: takes lines off the transport, resolves pending
/// requests by id, and drops everything else.
async fn read_loop(
    server: String,
    transport: Arc<dyn Transport>,
    pending: Arc<Mutex<PendingMap>>,
    cancel: CancellationToken,
    alive: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            line = transport.recv() => match line {
                Some(raw) => dispatch_line(&server, &raw, &pending).await,
                // EOF: the subprocess exited or closed its stdout.
                None => break,
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
    // Fail any requests still in flight.
    pending.lock().await.clear();
    tracing::debug!(server = %server, "MCP reader task exited");
}

/// Classify and dispatch a single inbound line.
///
/// Extracted from the loop body so the resolution logic is directly
/// unit-testable.
async fn dispatch_line(server: &str, raw: &str, pending: &Arc<Mutex<PendingMap>>) {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => {
            // Stray non-JSON output on stdout; servers are expected to log
            // on stderr, so this is noise.
            tracing::debug!(server = %server, "dropping non-JSON stdout line");
            return;
        }
    };

    let id = match value.get("id") {
        Some(id_val) => match id_val.as_u64() {
            Some(n) => n,
            None => match id_val.as_str().and_then(|s| s.parse::<u64>().ok()) {
                Some(n) => n,
                None => {
                    tracing::debug!(server = %server, "dropping message with non-integer id");
                    return;
                }
            },
        },
        // No id: a server-initiated notification; this runtime discards them.
        None => return,
    };

    let has_result = value.get("result").is_some();
    let has_error = value.get("error").is_some();
    if !has_result && !has_error {
        tracing::debug!(server = %server, id, "dropping message that is not a response");
        return;
    }

    let tx = pending.lock().await.remove(&id);
    let Some(tx) = tx else {
        // Either a server-initiated id or a response whose caller timed out;
        // both are stale from this client's point of view.
        tracing::debug!(server = %server, id, "dropping response for unknown or stale id");
        return;
    };

    let outcome: std::result::Result<serde_json::Value, JsonRpcError> =
        if let Some(error_val) = value.get("error") {
            match serde_json::from_value::<JsonRpcError>(error_val.clone()) {
                Ok(e) => Err(e),
                Err(_) => Err(JsonRpcError {
                    code: -32603,
                    message: format!("malformed error object: {error_val}"),
                    data: None,
                }),
            }
        } else {
            Ok(value
                .get("result")
                .cloned()
                .unwrap_or(serde_json::Value::Null))
        };

    // The caller may have timed out between our remove and this send.
    let _ = tx.send(outcome);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
