//! Configuration for external MCP servers
//!
//! Follows the common `mcpServers` map format so existing server definitions
//! can be dropped in unchanged.

use insight_core::{InsightError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// MCP servers configuration container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    /// Map of server name to configuration
    #[serde(rename = "mcpServers")]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

/// One stdio-based MCP server definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to execute (e.g., "npx", "node", "/path/to/binary")
    pub command: String,

    /// Arguments to pass to the command
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables for the process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Timeout in milliseconds (default: 30000)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Whether this server is disabled
    #[serde(default)]
    pub disabled: bool,
}

fn default_timeout() -> u64 {
    30000
}

impl McpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading MCP configuration from: {}", path.display());

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            InsightError::ConfigError(format!(
                "Failed to read MCP config file {}: {e}",
                path.display()
            ))
        })?;

        let config: McpConfig = serde_yaml::from_str(&content).map_err(|e| {
            InsightError::ConfigError(format!(
                "Failed to parse MCP config YAML from {}: {e}",
                path.display()
            ))
        })?;

        Ok(config)
    }

    /// Load all YAML files from a directory
    pub async fn load_from_directory<P: AsRef<Path>>(dir: P) -> Result<Vec<Self>> {
        let dir = dir.as_ref();
        let mut configs = Vec::new();

        if !dir.exists() {
            return Ok(configs);
        }

        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            InsightError::ConfigError(format!("Failed to read directory {}: {e}", dir.display()))
        })?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if let Some(ext) = path.extension() {
                if ext == "yaml" || ext == "yml" {
                    match Self::load_from_file(&path).await {
                        Ok(config) => {
                            info!("Loaded MCP config from: {}", path.display());
                            configs.push(config);
                        }
                        Err(e) => {
                            warn!("Failed to load MCP config from {}: {e}", path.display());
                        }
                    }
                }
            }
        }

        Ok(configs)
    }

    /// Merge another configuration into this one; the other takes precedence.
    pub fn merge(&mut self, other: McpConfig) {
        for (name, config) in other.mcp_servers {
            self.mcp_servers.insert(name, config);
        }
    }

    /// Get enabled servers (not disabled)
    pub fn enabled_servers(&self) -> HashMap<String, McpServerConfig> {
        self.mcp_servers
            .iter()
            .filter(|(_, config)| !config.disabled)
            .map(|(name, config)| (name.clone(), config.clone()))
            .collect()
    }
}
