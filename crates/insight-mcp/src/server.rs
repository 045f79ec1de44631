//! MCP server adapter: exposes a tool registry over a framed duplex stream

use insight_core::{InsightError, Result};
use insight_tools::ToolRegistry;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::conversions::{tool_execution_failed, tool_not_implemented, value_to_content};
use crate::prompts::PromptRegistry;
use crate::types::{
    ContentItem, GetPromptParams, GetPromptResult, IncomingMessage, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListPromptsResult, ListToolsResult, McpTool, PromptMessage, PromptsCapability, RequestId,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolCallResult, ToolsCapability,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION, SERVER_NOT_INITIALIZED,
};

/// Connection lifecycle. There is no transition back to Serving once the
/// session terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Uninitialized,
    Handshaking,
    Serving,
    Terminated,
}

/// Serves one connection per process lifetime: `tools/list`, `tools/call`,
/// and optionally `prompts/*` against registries injected at construction.
pub struct McpServer {
    info: ServerInfo,
    registry: Arc<ToolRegistry>,
    prompts: Arc<PromptRegistry>,
}

impl McpServer {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            registry,
            prompts: Arc::new(PromptRegistry::new()),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptRegistry) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
            prompts: if self.prompts.is_empty() {
                None
            } else {
                Some(PromptsCapability {
                    list_changed: Some(false),
                })
            },
            experimental: None,
        }
    }

    /// Run the server over the process stdio streams.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve a single connection over any duplex stream of newline-framed
    /// JSON-RPC messages, until the read side reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server '{}' awaiting handshake", self.info.name);

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut state = SessionState::Uninitialized;

        while state != SessionState::Terminated {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("Client stream closed");
                    state = SessionState::Terminated;
                }
                Ok(_) => {
                    let frame = line.trim();
                    if frame.is_empty() {
                        continue;
                    }
                    debug!("Received frame: {}", frame);
                    if let Some(response) = self.handle_frame(frame, &mut state).await {
                        let payload = serde_json::to_string(&response)?;
                        debug!("Sending response: {}", payload);
                        writer.write_all(payload.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        writer.flush().await?;
                    }
                }
                Err(e) => {
                    error!("Error reading client stream: {}", e);
                    return Err(InsightError::IoError(e));
                }
            }
        }

        info!("MCP server '{}' session terminated", self.info.name);
        Ok(())
    }

    async fn handle_frame(
        &self,
        frame: &str,
        state: &mut SessionState,
    ) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<IncomingMessage>(frame) {
            Ok(IncomingMessage::Request(request)) => {
                Some(self.handle_request(request, state).await)
            }
            Ok(IncomingMessage::Notification(notification)) => {
                self.handle_notification(notification, state);
                None
            }
            Err(e) => {
                warn!("Unparseable frame from client: {}", e);
                Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::new(PARSE_ERROR, "Parse error"),
                ))
            }
        }
    }

    fn handle_notification(&self, notification: JsonRpcNotification, state: &mut SessionState) {
        match notification.method.as_str() {
            "notifications/initialized" => {
                if *state == SessionState::Handshaking {
                    debug!("Client completed initialization handshake");
                    *state = SessionState::Serving;
                } else {
                    warn!("Ignoring notifications/initialized outside handshake");
                }
            }
            other => debug!("Ignoring notification: {}", other),
        }
    }

    async fn handle_request(
        &self,
        request: JsonRpcRequest,
        state: &mut SessionState,
    ) -> JsonRpcResponse {
        let id = request.id.clone();
        match (request.method.as_str(), *state) {
            ("initialize", SessionState::Uninitialized) => {
                if let Some(params) = request.params {
                    match serde_json::from_value::<InitializeParams>(params) {
                        Ok(p) => info!(
                            "Initialize from client '{}' (protocol {})",
                            p.client_info.name, p.protocol_version
                        ),
                        Err(e) => warn!("Malformed initialize params: {}", e),
                    }
                }
                *state = SessionState::Handshaking;
                success_response(
                    id,
                    &InitializeResult {
                        protocol_version: PROTOCOL_VERSION.to_string(),
                        capabilities: self.capabilities(),
                        server_info: Some(self.info.clone()),
                    },
                )
            }
            ("initialize", _) => JsonRpcResponse::error(
                Some(id),
                JsonRpcError::new(INVALID_REQUEST, "Initialize may only be sent once"),
            ),
            ("tools/list", SessionState::Serving) => {
                debug!("Received tools/list request");
                success_response(
                    id,
                    &ListToolsResult {
                        tools: self.tool_descriptors(),
                    },
                )
            }
            ("tools/call", SessionState::Serving) => {
                self.handle_tool_call(id, request.params).await
            }
            ("prompts/list", SessionState::Serving) => success_response(
                id,
                &ListPromptsResult {
                    prompts: self.prompts.descriptors(),
                },
            ),
            ("prompts/get", SessionState::Serving) => self.handle_prompt_get(id, request.params),
            ("tools/list" | "tools/call" | "prompts/list" | "prompts/get", _) => {
                JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::new(SERVER_NOT_INITIALIZED, "Server not initialized"),
                )
            }
            (other, _) => JsonRpcResponse::error(
                Some(id),
                JsonRpcError::new(METHOD_NOT_FOUND, format!("Method not found: {other}")),
            ),
        }
    }

    /// Descriptors for every registered tool, sorted by name. Registry
    /// iteration order is not stable; listings must be.
    fn tool_descriptors(&self) -> Vec<McpTool> {
        let mut tools: Vec<McpTool> = self
            .registry
            .get_all()
            .iter()
            .map(|tool| McpTool {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.schema(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    async fn handle_tool_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(p)) => p,
            Ok(None) => {
                return JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::new(INVALID_PARAMS, "Missing params for tools/call"),
                )
            }
            Err(e) => {
                return JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")),
                )
            }
        };

        debug!("Received tool execution request for '{}'", params.name);

        let content = match self.registry.get(&params.name) {
            Some(tool) => match tool.execute(params.arguments).await {
                Ok(value) => {
                    debug!("Executed tool '{}' successfully", params.name);
                    value_to_content(value)
                }
                Err(e) => {
                    warn!("Error executing tool '{}': {}", params.name, e);
                    tool_execution_failed(&params.name, &e)
                }
            },
            None => {
                warn!("Tool '{}' not found", params.name);
                tool_not_implemented(&params.name)
            }
        };

        success_response(
            id,
            &ToolCallResult {
                content,
                is_error: None,
            },
        )
    }

    fn handle_prompt_get(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: GetPromptParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(p)) => p,
            Ok(None) => {
                return JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::new(INVALID_PARAMS, "Missing params for prompts/get"),
                )
            }
            Err(e) => {
                return JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")),
                )
            }
        };

        let Some(prompt) = self.prompts.get(&params.name) else {
            return JsonRpcResponse::error(
                Some(id),
                JsonRpcError::new(INVALID_PARAMS, format!("Unknown prompt: {}", params.name)),
            );
        };

        match prompt.render(&params.arguments) {
            Ok(text) => success_response(
                id,
                &GetPromptResult {
                    description: Some(prompt.description().to_string()),
                    messages: vec![PromptMessage {
                        role: "user".to_string(),
                        content: ContentItem::Text { text },
                    }],
                },
            ),
            Err(e) => JsonRpcResponse::error(
                Some(id),
                JsonRpcError::new(INVALID_PARAMS, e.to_string()),
            ),
        }
    }
}

fn success_response(id: RequestId, result: &impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            Some(id),
            JsonRpcError::new(INTERNAL_ERROR, format!("Internal error: {e}")),
        ),
    }
}
