use anyhow::Result;
use clap::{Parser, Subcommand};
use insight_agent::Agent;
use insight_config::AgentConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "insight-agent")]
#[command(about = "MCP tool server bridging search, transcript, and filesystem capabilities", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tool registry over stdio
    Serve,

    /// List available tools
    Tools,

    /// List configured external MCP servers and their state
    Servers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = if cli.config.exists() {
        info!("Loading configuration from: {:?}", cli.config);
        AgentConfig::from_yaml(&cli.config)?
    } else {
        info!("Using default configuration");
        AgentConfig::default()
    };

    let agent = Agent::new(config).await?;

    match cli.command {
        Commands::Serve => serve(&agent).await?,
        Commands::Tools => list_tools(&agent),
        Commands::Servers => list_servers(&agent).await,
    }

    agent.shutdown().await?;

    Ok(())
}

async fn serve(agent: &Agent) -> Result<()> {
    info!("Serving tool registry over stdio");

    tokio::select! {
        result = agent.serve_stdio() => {
            result?;
            info!("Client disconnected");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}

fn list_tools(agent: &Agent) {
    println!("\n🛠️  Available Tools:");
    println!("═══════════════════════════════════════");

    let tool_registry = agent.get_tool_registry();
    let mut names = tool_registry.list();
    names.sort();

    for tool_name in names {
        if let Some(tool) = tool_registry.get(&tool_name) {
            println!("\n📦 {}", tool.name());
            println!("   {}", tool.description());
        }
    }
    println!();
}

async fn list_servers(agent: &Agent) {
    println!("\n🔌 External MCP Servers:");
    println!("═══════════════════════════════════════");

    let servers = agent.list_mcp_servers().await;
    if servers.is_empty() {
        println!("\n(none running)");
    }
    for name in servers {
        if let Some((tools, connected)) = agent.mcp_server_info(&name).await {
            let state = if connected { "connected" } else { "disconnected" };
            println!("\n{name} [{state}]");
            for tool in tools {
                println!("   - {tool}");
            }
        }
    }
    println!();
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };

    // stdout carries the protocol in serve mode; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
