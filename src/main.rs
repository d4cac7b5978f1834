//! mcpilot - CLI entry point

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcpilot::agent::Agent;
use mcpilot::chat::HttpChatClient;
use mcpilot::cli::{Cli, Commands};
use mcpilot::config::Config;
use mcpilot::mcp::ServerManager;
use mcpilot::tools::registry::McpToolRegistry;
use mcpilot::tools::ToolRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse_args();

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(model) = &cli.model {
        config.decoding.model = model.clone();
    }
    if let Some(system) = &cli.system {
        config.agent.system_prompt = system.clone();
    }
    config.validate()?;

    let chat = Arc::new(HttpChatClient::new(
        config.api.base_url.clone(),
        config.api_key()?,
    )?);

    let registry = Arc::new(McpToolRegistry::new());
    let mcp_document_path = cli
        .mcp_config
        .clone()
        .or_else(|| config.mcp_servers.clone().map(Into::into));
    if let Some(path) = mcp_document_path {
        tracing::info!(path = %path.display(), "loading MCP servers");
        let document = std::fs::read_to_string(&path)?;
        registry.initialize(&document).await?;
        tracing::info!(tools = registry.executor_count().await, "tool registry ready");
    }

    let mut agent = Agent::new(
        chat,
        Arc::clone(&registry) as Arc<dyn ToolRegistry>,
        config.agent.system_prompt.clone(),
        config.decoding.clone(),
    );

    let outcome = match cli.command {
        Commands::Ask { prompt } => run_ask(&mut agent, &prompt).await,
        Commands::Chat => run_chat(&mut agent).await,
    };

    registry.shutdown().await?;
    ServerManager::global().shutdown_all().await;

    outcome
}

/// One-shot prompt: print the final assistant reply.
async fn run_ask(agent: &mut Agent, prompt: &str) -> Result<()> {
    let reply = agent.send_message(prompt, None).await?;
    println!("{}", reply.content.unwrap_or_default());
    Ok(())
}

/// Interactive loop on stdin until EOF or an exit command.
async fn run_chat(agent: &mut Agent) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }
        if input == "/clear" {
            agent.clear_conversation();
            println!("(conversation cleared)");
            continue;
        }

        match agent.send_message(input, None).await {
            Ok(reply) => println!("{}", reply.content.unwrap_or_default()),
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

/// Initialize tracing subscriber with environment filter
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mcpilot=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
