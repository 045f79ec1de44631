//! Wrapper exposing a remote MCP tool through the local `Tool` trait

use async_trait::async_trait;
use insight_core::{InsightError, Result};
use insight_tools::Tool;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::McpClient;
use crate::conversions::flatten_content;
use crate::types::McpTool;

/// A tool discovered on an external server, registered locally under its
/// remote name. Execution failures surface as `Err` so the serving adapter
/// converts them the same way as built-in tool failures.
pub struct RemoteToolWrapper {
    /// Tool definition from the MCP server
    tool_def: McpTool,

    /// Client connected to the server that owns the tool
    client: Arc<RwLock<McpClient>>,

    /// Server name (for tracking, not exposed in the tool name)
    server_name: String,
}

impl RemoteToolWrapper {
    pub fn new(tool_def: McpTool, client: Arc<RwLock<McpClient>>, server_name: String) -> Self {
        Self {
            tool_def,
            client,
            server_name,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

#[async_trait]
impl Tool for RemoteToolWrapper {
    fn name(&self) -> &str {
        &self.tool_def.name
    }

    fn description(&self) -> &str {
        &self.tool_def.description
    }

    fn schema(&self) -> Value {
        self.tool_def.input_schema.clone()
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        debug!(
            "Executing remote tool '{}' from server '{}'",
            self.tool_def.name, self.server_name
        );

        let mut client = self.client.write().await;
        let content = client
            .call_tool(&self.tool_def.name, args)
            .await
            .map_err(|e| {
                let message = match e {
                    InsightError::McpError(m) => m,
                    other => other.to_string(),
                };
                InsightError::tool(self.tool_def.name.clone(), message)
            })?;

        Ok(flatten_content(content))
    }
}
