//! Command-line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Client-side LLM orchestration runtime driving MCP tool servers.
#[derive(Debug, Parser)]
#[command(name = "mcpilot", version, about)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, global = true, default_value = "mcpilot.yaml")]
    pub config: PathBuf,

    /// Path to the mcpServers JSON document (overrides the config file).
    #[arg(long, global = true)]
    pub mcp_config: Option<PathBuf>,

    /// Model name override.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// System prompt override.
    #[arg(long, global = true)]
    pub system: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive conversation on stdin.
    Chat,
    /// One-shot prompt; prints the final assistant reply.
    Ask {
        /// The user prompt.
        prompt: String,
    },
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["mcpilot", "ask", "hello there"]).unwrap();
        match cli.command {
            Commands::Ask { prompt } => assert_eq!(prompt, "hello there"),
            _ => panic!("expected ask command"),
        }
        assert_eq!(cli.config, PathBuf::from("mcpilot.yaml"));
    }

    #[test]
    fn test_parse_chat_with_overrides() {
        let cli = Cli::try_parse_from([
            "mcpilot",
            "chat",
            "--config",
            "custom.yaml",
            "--mcp-config",
            "servers.json",
            "--model",
            "deepseek-reasoner",
            "--system",
            "Be terse.",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Chat));
        assert_eq!(cli.config, PathBuf::from("custom.yaml"));
        assert_eq!(cli.mcp_config, Some(PathBuf::from("servers.json")));
        assert_eq!(cli.model.as_deref(), Some("deepseek-reasoner"));
        assert_eq!(cli.system.as_deref(), Some("Be terse."));
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["mcpilot"]).is_err());
    }
}
