//! In-process scripted transport for tests
//!
//! [`FakeTransport`] stands in for an MCP subprocess: tests script per-method
//! behaviors (succeed with a result, fail with a JSON-RPC error, or stay
//! silent) and the fake answers each outbound request accordingly. Every
//! outbound line is recorded for inspection, and arbitrary inbound lines can
//! be injected to exercise demultiplexing, noise tolerance, and EOF
//! handling.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::{McpilotError, Result};
use crate::mcp::transport::Transport;
use crate::mcp::types::JsonRpcResponse;

/// How the fake answers one request for a given method.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Reply with `{"result": <value>}`.
    Result(serde_json::Value),
    /// Reply with a JSON-RPC error object.
    Error {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
    },
    /// Produce no reply; the caller's timeout fires.
    Silent,
}

/// Scripted in-process transport.
///
/// # Examples
///
/// ```
/// use mcpilot::mcp::transport::fake::{FakeBehavior, FakeTransport};
///
/// let fake = FakeTransport::new();
/// fake.on("tools/list", FakeBehavior::Result(serde_json::json!({
///     "tools": [{ "name": "echo", "inputSchema": { "type": "object" } }]
/// })));
/// ```
pub struct FakeTransport {
    /// Per-method queues of scripted behaviors; a queue's last entry repeats.
    script: StdMutex<HashMap<String, VecDeque<FakeBehavior>>>,
    /// Every line the client sent, in order.
    sent: StdMutex<Vec<String>>,
    inbound_tx: StdMutex<Option<mpsc::UnboundedSender<String>>>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    closed: AtomicBool,
}

impl FakeTransport {
    /// Create an empty fake; unscripted methods answer `Method not found`.
    pub fn new() -> std::sync::Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        std::sync::Arc::new(Self {
            script: StdMutex::new(HashMap::new()),
            sent: StdMutex::new(Vec::new()),
            inbound_tx: StdMutex::new(Some(inbound_tx)),
            inbound_rx: Mutex::new(inbound_rx),
            closed: AtomicBool::new(false),
        })
    }

    /// Queue one behavior for `method`. Repeated calls build a FIFO queue;
    /// once the queue has a single entry left, that entry repeats forever.
    pub fn on(&self, method: impl Into<String>, behavior: FakeBehavior) {
        self.script
            .lock()
            .expect("fake script lock")
            .entry(method.into())
            .or_default()
            .push_back(behavior);
    }

    /// All lines the client has sent so far.
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent.lock().expect("fake sent lock").clone()
    }

    /// Push a raw line onto the inbound side, bypassing the script.
    pub fn inject_line(&self, line: impl Into<String>) {
        if let Some(tx) = self.inbound_tx.lock().expect("fake inbound lock").as_ref() {
            let _ = tx.send(line.into());
        }
    }

    /// Simulate peer EOF: subsequent `recv` calls return `None` once the
    /// buffered lines drain, and `send` fails.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.inbound_tx.lock().expect("fake inbound lock").take();
    }

    fn next_behavior(&self, method: &str) -> FakeBehavior {
        let mut script = self.script.lock().expect("fake script lock");
        match script.get_mut(method) {
            Some(queue) if queue.len() > 1 => queue.pop_front().expect("non-empty queue"),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| FakeBehavior::Error {
                    code: -32601,
                    message: format!("Method not found: {method}"),
                }),
            None => FakeBehavior::Error {
                code: -32601,
                message: format!("Method not found: {method}"),
            },
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(
                McpilotError::McpTransport("fake transport closed".to_string()).into(),
            );
        }
        self.sent.lock().expect("fake sent lock").push(message.clone());

        let parsed: serde_json::Value = match serde_json::from_str(&message) {
            Ok(v) => v,
            // Not JSON: nothing to answer.
            Err(_) => return Ok(()),
        };
        let (Some(method), Some(id)) = (
            parsed.get("method").and_then(|m| m.as_str()),
            parsed.get("id").cloned(),
        ) else {
            return Ok(());
        };

        let response = match self.next_behavior(method) {
            FakeBehavior::Result(value) => JsonRpcResponse::success(id, value),
            FakeBehavior::Error { code, message } => JsonRpcResponse::failure(id, code, message),
            FakeBehavior::Silent => return Ok(()),
        };

        if let Ok(line) = serde_json::to_string(&response) {
            self.inject_line(line);
        }
        Ok(())
    }

    async fn recv(&self) -> Option<String> {
        self.inbound_rx.lock().await.recv().await
    }
}
