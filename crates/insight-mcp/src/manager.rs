//! Manager for external MCP servers: configuration loading, lifecycle, and
//! tool registration into the local registry.

use insight_core::{InsightError, Result};
use insight_tools::ToolRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::client::McpClient;
use crate::config::{McpConfig, McpServerConfig};
use crate::tool_wrapper::RemoteToolWrapper;

/// Handle to a running MCP server
pub struct McpServerHandle {
    /// Server name
    pub name: String,

    /// MCP client
    pub client: Arc<RwLock<McpClient>>,

    /// Discovered tool names
    pub tools: Vec<String>,
}

/// Owns the connections to every configured external server and registers
/// their tools into the shared registry.
pub struct McpManager {
    /// Running servers indexed by name
    servers: HashMap<String, McpServerHandle>,

    /// Tool registry for registering discovered tools
    tool_registry: Arc<ToolRegistry>,

    /// Configuration (merged from all sources)
    config: McpConfig,
}

impl McpManager {
    pub fn new(tool_registry: Arc<ToolRegistry>) -> Self {
        Self {
            servers: HashMap::new(),
            tool_registry,
            config: McpConfig::new(),
        }
    }

    /// Load configuration from a specific file
    pub async fn load_config_file(&mut self, path: &str) -> Result<()> {
        let config = McpConfig::load_from_file(path).await?;
        self.config.merge(config);
        Ok(())
    }

    /// Load configurations from a directory
    pub async fn load_config_directory(&mut self, dir: &str) -> Result<()> {
        let configs = McpConfig::load_from_directory(dir).await?;
        for config in configs {
            self.config.merge(config);
        }
        Ok(())
    }

    /// Add inline server definitions from the agent configuration.
    pub fn add_servers_from_values(&mut self, servers: &HashMap<String, Value>) {
        for (name, value) in servers {
            match serde_json::from_value::<McpServerConfig>(value.clone()) {
                Ok(server_config) => {
                    self.config.mcp_servers.insert(name.clone(), server_config);
                }
                Err(e) => {
                    warn!("Failed to parse inline MCP server '{}': {}", name, e);
                }
            }
        }
    }

    /// Start the named servers, or every enabled server when `server_names`
    /// is empty. Individual failures are logged; the call only errors when
    /// nothing could be started at all.
    pub async fn start_servers(&mut self, server_names: Vec<String>) -> Result<()> {
        let enabled_servers = self.config.enabled_servers();

        if enabled_servers.is_empty() {
            info!("No enabled MCP servers to start");
            return Ok(());
        }

        let servers_to_start: HashMap<String, McpServerConfig> = if server_names.is_empty() {
            enabled_servers
        } else {
            enabled_servers
                .into_iter()
                .filter(|(name, _)| server_names.contains(name))
                .collect()
        };

        info!("Starting {} MCP servers", servers_to_start.len());

        let mut started = 0;
        let mut failed = 0;

        for (name, server_config) in servers_to_start {
            match self.start_server(name.clone(), server_config).await {
                Ok(()) => started += 1,
                Err(e) => {
                    error!("Failed to start MCP server '{}': {}", name, e);
                    failed += 1;
                }
            }
        }

        info!(
            "MCP server startup complete: {} started, {} failed",
            started, failed
        );

        if started == 0 && failed > 0 {
            return Err(InsightError::McpError(
                "Failed to start any MCP servers".into(),
            ));
        }

        Ok(())
    }

    async fn start_server(&mut self, name: String, config: McpServerConfig) -> Result<()> {
        info!("Starting MCP server: {}", name);

        if self.servers.contains_key(&name) {
            warn!("MCP server '{}' is already running", name);
            return Ok(());
        }

        let mut client = McpClient::connect(name.clone(), &config).await?;
        client.initialize().await?;

        let tools = client.list_tools().await?;
        let tool_names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();

        info!(
            "MCP server '{}' started with {} tools",
            name,
            tool_names.len()
        );

        let client_arc = Arc::new(RwLock::new(client));
        for tool in &tools {
            let wrapper = RemoteToolWrapper::new(tool.clone(), client_arc.clone(), name.clone());
            self.tool_registry.register(wrapper)?;
            debug!("Registered MCP tool: {} from server {}", tool.name, name);
        }

        self.servers.insert(
            name.clone(),
            McpServerHandle {
                name,
                client: client_arc,
                tools: tool_names,
            },
        );

        Ok(())
    }

    /// Stop a specific MCP server
    pub async fn stop_server(&mut self, name: &str) -> Result<()> {
        info!("Stopping MCP server: {}", name);

        if let Some(handle) = self.servers.remove(name) {
            let mut client = handle.client.write().await;
            if let Err(e) = client.close().await {
                warn!("Error closing MCP client '{}': {}", name, e);
            }
            info!("MCP server '{}' stopped", name);
        } else {
            warn!("MCP server '{}' not found", name);
        }

        Ok(())
    }

    /// Stop all MCP servers
    pub async fn stop_all(&mut self) -> Result<()> {
        let server_names: Vec<String> = self.servers.keys().cloned().collect();
        for name in server_names {
            self.stop_server(&name).await?;
        }
        Ok(())
    }

    /// List running MCP servers
    pub fn list_servers(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    /// Tool names and connection state for a specific server.
    pub async fn server_info(&self, name: &str) -> Option<(Vec<String>, bool)> {
        let handle = self.servers.get(name)?;
        let connected = handle.client.read().await.is_connected();
        Some((handle.tools.clone(), connected))
    }
}
