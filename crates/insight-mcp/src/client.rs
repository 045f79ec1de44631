//! MCP client for external tool servers

use insight_core::{InsightError, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::config::McpServerConfig;
use crate::transport::{StdioTransport, Transport};
use crate::types::{
    ClientCapabilities, ClientInfo, ContentItem, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool, RequestId,
    ToolCallParams, ToolCallResult, PROTOCOL_VERSION,
};

/// Client half of one MCP connection. Requests are sequential; responses are
/// correlated by id with a per-server timeout.
pub struct McpClient {
    /// Server name for identification
    name: String,

    /// Transport carrying the frames
    transport: Box<dyn Transport>,

    /// Request id counter
    request_id: AtomicU64,

    /// Server identity and capabilities (set after initialization)
    capabilities: Option<InitializeResult>,

    /// Timeout for a single request round trip, in milliseconds
    timeout_ms: u64,
}

impl McpClient {
    /// Build a client over an already-open transport.
    pub fn new(name: String, transport: Box<dyn Transport>, timeout_ms: u64) -> Self {
        Self {
            name,
            transport,
            request_id: AtomicU64::new(1),
            capabilities: None,
            timeout_ms,
        }
    }

    /// Spawn the configured stdio server and connect to it.
    pub async fn connect(name: String, config: &McpServerConfig) -> Result<Self> {
        let transport = StdioTransport::spawn(
            config.command.clone(),
            config.args.clone(),
            config.env.clone(),
        )
        .await?;
        Ok(Self::new(name, Box::new(transport), config.timeout))
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.request_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Perform the initialization handshake.
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        info!("Initializing MCP client: {}", self.name);

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo::default(),
        };

        let request = JsonRpcRequest::new(
            self.next_request_id(),
            "initialize",
            Some(serde_json::to_value(params)?),
        );

        let response = self.send_request(request).await?;

        if let Some(error) = response.error {
            return Err(InsightError::McpError(format!(
                "Failed to initialize MCP connection: {}",
                error.message
            )));
        }

        let result: InitializeResult = serde_json::from_value(response.result.ok_or_else(
            || InsightError::McpError("Initialize response missing result".into()),
        )?)?;

        info!(
            "MCP client '{}' initialized with protocol version: {}",
            self.name, result.protocol_version
        );
        if let Some(ref server_info) = result.server_info {
            info!(
                "Connected to MCP server: {} v{}",
                server_info.name, server_info.version
            );
        }

        self.transport
            .send_notification(JsonRpcNotification::new(
                "notifications/initialized",
                Some(serde_json::json!({})),
            ))
            .await?;

        self.capabilities = Some(result.clone());
        Ok(result)
    }

    /// List the tools the server advertises.
    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        debug!("Listing tools from MCP server: {}", self.name);

        let request = JsonRpcRequest::new(self.next_request_id(), "tools/list", None);
        let response = self.send_request(request).await?;

        if let Some(error) = response.error {
            return Err(InsightError::McpError(format!(
                "Failed to list tools: {}",
                error.message
            )));
        }

        let result: ListToolsResult = serde_json::from_value(response.result.ok_or_else(
            || InsightError::McpError("List tools response missing result".into()),
        )?)?;

        info!(
            "Discovered {} tools from MCP server '{}'",
            result.tools.len(),
            self.name
        );

        Ok(result.tools)
    }

    /// Call a tool on the server and return its content sequence.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Vec<ContentItem>> {
        debug!("Calling MCP tool '{}' on server '{}'", name, self.name);

        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        let request = JsonRpcRequest::new(
            self.next_request_id(),
            "tools/call",
            Some(serde_json::to_value(params)?),
        );

        let response = self.send_request(request).await?;

        if let Some(error) = response.error {
            return Err(InsightError::McpError(format!(
                "Tool '{}' execution failed: {}",
                name, error.message
            )));
        }

        let result: ToolCallResult =
            serde_json::from_value(response.result.ok_or_else(|| {
                InsightError::McpError(format!("Tool '{name}' response missing result"))
            })?)?;

        if result.is_error.unwrap_or(false) {
            return Err(InsightError::McpError(format!(
                "Tool '{name}' returned an error"
            )));
        }

        Ok(result.content)
    }

    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let request_id = request.id.clone();
        self.transport.send_request(request).await?;

        let deadline = Duration::from_millis(self.timeout_ms);
        timeout(deadline, self.wait_for_response(&request_id))
            .await
            .map_err(|_| {
                InsightError::McpError(format!(
                    "Request {} timed out after {}ms",
                    request_id, self.timeout_ms
                ))
            })?
    }

    async fn wait_for_response(&mut self, request_id: &RequestId) -> Result<JsonRpcResponse> {
        loop {
            match self.transport.receive_response().await? {
                Some(response) if response.id.as_ref() == Some(request_id) => {
                    return Ok(response)
                }
                Some(response) => {
                    // Stale responses can only come from a request we already
                    // timed out on; drop them and keep draining.
                    warn!(
                        "Discarding response for stale request: {:?} (expected: {})",
                        response.id, request_id
                    );
                }
                None => {
                    return Err(InsightError::McpError(
                        "Connection closed while awaiting response".into(),
                    ))
                }
            }
        }
    }

    /// Server identity and capabilities captured during initialization.
    pub fn capabilities(&self) -> Option<&InitializeResult> {
        self.capabilities.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub async fn close(&mut self) -> Result<()> {
        debug!("Closing MCP client: {}", self.name);
        self.transport.close().await
    }
}
