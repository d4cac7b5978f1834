//! Transport abstraction for MCP connections
//!
//! A [`Transport`] carries newline-free JSON-RPC message strings in both
//! directions; framing (newline-delimited for stdio) is the transport's
//! business. Two implementations exist: [`stdio::StdioTransport`] drives a
//! subprocess over its stdin/stdout pipes, and [`fake::FakeTransport`] is an
//! in-process scripted peer for tests.

pub mod fake;
pub mod stdio;

use crate::error::Result;
use async_trait::async_trait;

/// Bidirectional line-oriented message transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one serialized JSON-RPC message to the peer.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the underlying channel or pipe is
    /// closed.
    async fn send(&self, message: String) -> Result<()>;

    /// Receive the next message from the peer.
    ///
    /// Returns `None` once the peer has closed the connection (subprocess
    /// exit, pipe EOF). Only one task may consume the inbound side; the MCP
    /// client's reader task is that consumer.
    async fn recv(&self) -> Option<String>;
}
