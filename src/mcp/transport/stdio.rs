//! Stdio transport for MCP child-process servers
//!
//! [`StdioTransport`] spawns a child process and exchanges newline-delimited
//! JSON with it over stdin/stdout. The child's stderr carries human-readable
//! logs and is forwarded through `tracing` (see [`crate::mcp::logging`]);
//! per the MCP convention, stderr output is never treated as an error
//! condition.
//!
//! # Lifecycle
//!
//! [`StdioTransport::spawn`] starts three background tasks: a writer that
//! drains the outbound channel into the child's stdin, a stdout reader that
//! feeds the inbound channel one line at a time, and a stderr reader that
//! forwards log lines. Dropping the transport sends a best-effort SIGTERM
//! (Unix) or `start_kill` (elsewhere) to the child.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

use crate::error::{McpilotError, Result};
use crate::mcp::config::McpServerConfig;
use crate::mcp::logging::{forward_stderr_line, McpLogLevel};
use crate::mcp::transport::Transport;

/// Stdio-based MCP transport driving a child process.
///
/// # Examples
///
/// ```no_run
/// use mcpilot::mcp::config::McpServerConfig;
/// use mcpilot::mcp::transport::stdio::StdioTransport;
///
/// # fn example() -> mcpilot::error::Result<()> {
/// let config = McpServerConfig::new("mcp-echo-server", vec![]);
/// let transport = StdioTransport::spawn("echo", &config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StdioTransport {
    /// Sender side of the stdin channel; `send()` writes here.
    stdin_tx: mpsc::UnboundedSender<String>,
    /// Receiver for stdout lines, one JSON message per item.
    stdout_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    /// Handle to the spawned child process; used by `Drop`.
    child: std::sync::Mutex<Option<Child>>,
}

impl StdioTransport {
    /// Spawn the configured subprocess and wire up its stdio pipes.
    ///
    /// The child inherits the parent environment with the config's `env`
    /// map overlaid on top; a configured working directory is applied when
    /// present. `server_name` labels forwarded stderr lines.
    ///
    /// # Errors
    ///
    /// Returns [`McpilotError::McpSpawn`] if the process cannot be spawned
    /// or any stdio pipe is unavailable.
    pub fn spawn(server_name: &str, config: &McpServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);
        cmd.envs(&config.env);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        if let Some(dir) = &config.working_directory {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            McpilotError::McpSpawn(format!(
                "failed to spawn MCP server `{}`: {}",
                config.command, e
            ))
        })?;

        // All three handles are Some because Stdio::piped() was set above.
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpilotError::McpSpawn("child stdin unavailable after spawn".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpilotError::McpSpawn("child stdout unavailable after spawn".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpilotError::McpSpawn("child stderr unavailable after spawn".into()))?;

        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel::<String>();

        // Writer task: drain the outbound channel into child stdin.
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = stdin_rx.recv().await {
                let line = format!("{}\n", msg);
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        // Stdout reader task: one JSON message per line.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if stdout_tx.send(line).is_err() {
                    break;
                }
            }
        });

        // Stderr reader task: forward log lines at their parsed level.
        let threshold = McpLogLevel::from_env();
        let label = server_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                forward_stderr_line(&label, &line, threshold);
            }
        });

        Ok(Self {
            stdin_tx,
            stdout_rx: Mutex::new(stdout_rx),
            child: std::sync::Mutex::new(Some(child)),
        })
    }

    /// Spawn with an `Arc` wrapper, the shape the MCP client consumes.
    pub fn spawn_arc(server_name: &str, config: &McpServerConfig) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::spawn(server_name, config)?))
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: String) -> Result<()> {
        self.stdin_tx.send(message).map_err(|_| {
            anyhow::anyhow!(McpilotError::McpTransport(
                "stdin channel closed; writer task has exited".to_string()
            ))
        })
    }

    async fn recv(&self) -> Option<String> {
        self.stdout_rx.lock().await.recv().await
    }
}

impl Drop for StdioTransport {
    /// Best-effort termination of the child process on drop.
    ///
    /// On Unix, sends SIGTERM to the child PID; elsewhere, `start_kill` is
    /// used. Must not block.
    fn drop(&mut self) {
        let child = match self.child.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(mut child) = child {
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    // SAFETY: pid is a live process id obtained from tokio::process::Child.
                    unsafe {
                        libc::kill(pid as libc::pid_t, libc::SIGTERM);
                    }
                }
            }
            #[cfg(not(unix))]
            {
                let _ = child.start_kill();
            }
        }
    }
}
