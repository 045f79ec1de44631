use insight_config::AgentConfig;
use insight_core::Result;
use insight_mcp::{McpManager, McpServer, PromptRegistry};
use insight_tools::{ToolRegistry, TranscriptTool, WebSearchTool};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

pub mod prompts;

pub use prompts::BusinessInsightPrompt;

/// Wires configuration, the built-in tools, and any external MCP servers
/// into one registry, then exposes the whole set over an MCP server.
pub struct Agent {
    config: Arc<AgentConfig>,
    tool_registry: Arc<ToolRegistry>,
    mcp_manager: Option<tokio::sync::RwLock<McpManager>>,
}

impl Agent {
    pub async fn new(config: AgentConfig) -> Result<Self> {
        let tool_registry = Arc::new(ToolRegistry::new());
        tool_registry
            .register(WebSearchTool::new().with_max_results(config.search.max_results))?;
        tool_registry.register(TranscriptTool::new().with_language(&config.transcript.language))?;

        let mcp_manager = if config.mcp.enabled {
            info!("Initializing MCP integration");
            let mut manager = McpManager::new(tool_registry.clone());

            for config_file in &config.mcp.config_files {
                if let Err(e) = manager.load_config_file(config_file).await {
                    warn!("Failed to load MCP config from {}: {}", config_file, e);
                }
            }

            manager.add_servers_from_values(&config.mcp.inline_servers);

            if let Err(e) = manager.start_servers(config.mcp.servers.clone()).await {
                // The built-in tools still work without external servers.
                warn!("Failed to start MCP servers: {}", e);
            }

            Some(tokio::sync::RwLock::new(manager))
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            tool_registry,
            mcp_manager,
        })
    }

    pub async fn from_config_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config = AgentConfig::from_yaml(path)?;
        Self::new(config).await
    }

    pub fn get_tool_registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.tool_registry)
    }

    fn build_server(&self) -> Result<McpServer> {
        let mut prompts = PromptRegistry::new();
        prompts.register(BusinessInsightPrompt)?;

        Ok(McpServer::new(
            &self.config.agent.name,
            &self.config.agent.version,
            self.tool_registry.clone(),
        )
        .with_prompts(prompts))
    }

    /// Expose the registry over stdio until the stream closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.build_server()?.serve_stdio().await
    }

    /// Expose the registry over an arbitrary duplex stream.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.build_server()?.serve(reader, writer).await
    }

    /// Names of running external MCP servers.
    pub async fn list_mcp_servers(&self) -> Vec<String> {
        match &self.mcp_manager {
            Some(manager) => manager.read().await.list_servers(),
            None => Vec::new(),
        }
    }

    /// Tool names and connection state for one external server.
    pub async fn mcp_server_info(&self, name: &str) -> Option<(Vec<String>, bool)> {
        match &self.mcp_manager {
            Some(manager) => manager.read().await.server_info(name).await,
            None => None,
        }
    }

    /// Stop every external MCP server.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(manager) = &self.mcp_manager {
            manager.write().await.stop_all().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn test_agent() -> Agent {
        Agent::new(AgentConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn registers_builtin_tools() {
        let agent = test_agent().await;
        let tools = agent.get_tool_registry().list();

        assert!(tools.contains(&"web_search".to_string()));
        assert!(tools.contains(&"fetch_youtube_transcript".to_string()));
        assert!(agent.list_mcp_servers().await.is_empty());
    }

    #[tokio::test]
    async fn serves_registry_over_duplex_stream() {
        let agent = test_agent().await;

        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_side);
        let (client_read, mut client_write) = tokio::io::split(client_side);
        let mut client_read = BufReader::new(client_read);

        let serve = async move { agent.serve(server_read, server_write).await };
        let drive = async move {
            let mut line = String::new();

            let initialize = json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test", "version": "0.0.0"}
                }
            });
            client_write
                .write_all(format!("{initialize}\n").as_bytes())
                .await
                .unwrap();
            client_read.read_line(&mut line).await.unwrap();
            let response: Value = serde_json::from_str(line.trim()).unwrap();
            assert_eq!(response["result"]["serverInfo"]["name"], "insight-agent");

            client_write
                .write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n")
                .await
                .unwrap();

            let list = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});
            client_write
                .write_all(format!("{list}\n").as_bytes())
                .await
                .unwrap();
            line.clear();
            client_read.read_line(&mut line).await.unwrap();
            let response: Value = serde_json::from_str(line.trim()).unwrap();
            let names: Vec<&str> = response["result"]["tools"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| t["name"].as_str().unwrap())
                .collect();
            assert_eq!(names, vec!["fetch_youtube_transcript", "web_search"]);

            client_write.shutdown().await.unwrap();
        };

        let (served, ()) = tokio::join!(serve, drive);
        served.unwrap();
    }
}
