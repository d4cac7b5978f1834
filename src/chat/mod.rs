//! Chat layer: message model, decoding parameters, and the HTTP client
//!
//! - `types`    -- transcript messages, tool calls, and the tool wire format
//! - `decoding` -- validated sampling parameters
//! - `client`   -- `ChatApi` seam and the OpenAI-compatible HTTP client

pub mod client;
pub mod decoding;
pub mod types;

pub use client::{ChatApi, HttpChatClient};
pub use decoding::{DecodingConfig, DEFAULT_MODEL};
pub use types::{ChatMessage, FunctionCall, ToolCall, ToolDefinition};
