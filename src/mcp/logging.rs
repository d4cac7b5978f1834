//! MCP subprocess log forwarding
//!
//! MCP servers write human-readable logs to stderr. This module parses lines
//! of the shape `[timestamp] [LEVEL] message` and re-emits them through
//! `tracing` at the corresponding level; anything that does not match the
//! shape is forwarded verbatim at debug level. The `MCP_LOG_LEVEL`
//! environment variable (`none`, `error`, `warn`, `info`, `debug`; default
//! `info`) sets the forwarding threshold, and `MCP_DEBUG=true` or
//! `MCP_VERBOSE=true` forces `debug`.

use regex::Regex;
use std::sync::OnceLock;

/// Verbosity threshold for forwarding MCP server stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum McpLogLevel {
    /// Drop all subprocess log output.
    None,
    /// Forward only error lines.
    Error,
    /// Forward warnings and errors.
    Warn,
    /// Forward info, warnings, and errors.
    Info,
    /// Forward everything, including unparseable lines.
    Debug,
}

impl McpLogLevel {
    /// Parse a level name; unknown names map to the default (`Info`).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "error" => Self::Error,
            "warn" | "warning" => Self::Warn,
            "info" => Self::Info,
            "debug" => Self::Debug,
            _ => Self::Info,
        }
    }

    /// Read the threshold from the process environment.
    ///
    /// `MCP_DEBUG=true` and `MCP_VERBOSE=true` take precedence and force
    /// `Debug`; otherwise `MCP_LOG_LEVEL` decides, defaulting to `Info`.
    pub fn from_env() -> Self {
        let truthy = |var: &str| {
            std::env::var(var)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false)
        };
        if truthy("MCP_DEBUG") || truthy("MCP_VERBOSE") {
            return Self::Debug;
        }
        match std::env::var("MCP_LOG_LEVEL") {
            Ok(v) => Self::parse(&v),
            Err(_) => Self::Info,
        }
    }

    /// Whether a message at `level` passes this threshold.
    pub fn allows(self, level: McpLogLevel) -> bool {
        self != Self::None && level <= self
    }
}

/// A parsed stderr line: severity plus the message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStderrLine {
    /// Severity parsed from the `[LEVEL]` bracket.
    pub level: McpLogLevel,
    /// The message after the level bracket.
    pub message: String,
}

fn stderr_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[[^\]]*\]\s*\[([A-Za-z]+)\]\s*(.*)$").expect("stderr pattern is valid")
    })
}

/// Parse a stderr line of the shape `[timestamp] [LEVEL] message`.
///
/// Returns `None` for lines that do not match the shape (they are forwarded
/// verbatim at debug level by [`forward_stderr_line`]).
pub fn parse_stderr_line(line: &str) -> Option<ParsedStderrLine> {
    let captures = stderr_pattern().captures(line)?;
    let level = match captures[1].to_ascii_lowercase().as_str() {
        "error" | "err" => McpLogLevel::Error,
        "warn" | "warning" => McpLogLevel::Warn,
        "info" => McpLogLevel::Info,
        "debug" | "trace" => McpLogLevel::Debug,
        _ => return None,
    };
    Some(ParsedStderrLine {
        level,
        message: captures[2].to_string(),
    })
}

/// Re-emit one subprocess stderr line through `tracing`.
///
/// Parsed lines go out at their own level when the threshold allows;
/// unparseable lines go out verbatim at debug.
pub fn forward_stderr_line(server: &str, line: &str, threshold: McpLogLevel) {
    let (level, message) = match parse_stderr_line(line) {
        Some(parsed) => (parsed.level, parsed.message),
        None => (McpLogLevel::Debug, line.to_string()),
    };

    if !threshold.allows(level) {
        return;
    }

    match level {
        McpLogLevel::Error => tracing::error!(target: "mcpilot::mcp", server, "{message}"),
        McpLogLevel::Warn => tracing::warn!(target: "mcpilot::mcp", server, "{message}"),
        McpLogLevel::Info => tracing::info!(target: "mcpilot::mcp", server, "{message}"),
        McpLogLevel::Debug | McpLogLevel::None => {
            tracing::debug!(target: "mcpilot::mcp", server, "{message}")
        }
    }
}
