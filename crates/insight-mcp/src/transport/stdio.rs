//! Stdio transport: spawns an MCP server process and frames JSON-RPC
//! messages over its standard input/output, one message per line.

use async_trait::async_trait;
use insight_core::{InsightError, Result};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

use super::Transport;

pub struct StdioTransport {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    responses: mpsc::Receiver<JsonRpcResponse>,
    command: String,
    connected: Arc<AtomicBool>,
}

impl StdioTransport {
    /// Spawn the server process and wire up its streams. Env values support
    /// `${VAR}` and `${VAR:-default}` references.
    pub async fn spawn(
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    ) -> Result<Self> {
        info!("Starting MCP server via stdio: {} {:?}", command, args);

        let mut cmd = Command::new(&command);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &env {
            cmd.env(key, resolve_env_value(value));
        }

        let mut child = cmd.spawn().map_err(|e| {
            InsightError::McpError(format!("Failed to spawn MCP server process: {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InsightError::McpError("Failed to get process stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InsightError::McpError("Failed to get process stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| InsightError::McpError("Failed to get process stderr".into()))?;

        let (response_tx, response_rx) = mpsc::channel::<JsonRpcResponse>(64);
        let connected = Arc::new(AtomicBool::new(true));

        // Reader task: forward well-formed responses, drop everything else.
        let connected_flag = connected.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let frame = line.trim();
                        if frame.is_empty() {
                            continue;
                        }
                        debug!("Received from MCP server: {}", frame);
                        match serde_json::from_str::<JsonRpcResponse>(frame) {
                            Ok(response) => {
                                if response_tx.send(response).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!("Non-response message from server: {} - {}", frame, e);
                            }
                        }
                    }
                    Ok(None) => {
                        info!("MCP server process stdout closed");
                        break;
                    }
                    Err(e) => {
                        error!("Error reading from MCP server stdout: {}", e);
                        break;
                    }
                }
            }
            connected_flag.store(false, Ordering::SeqCst);
        });

        // Stderr goes to our logs.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    debug!("MCP server stderr: {}", line.trim());
                }
            }
        });

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            responses: response_rx,
            command,
            connected,
        })
    }

    async fn write_frame(&mut self, payload: String) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| InsightError::McpError("Process stdin not available".into()))?;

        debug!("Sending to MCP server: {}", payload);
        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| InsightError::McpError(format!("Failed to write to stdin: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| InsightError::McpError(format!("Failed to write newline: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| InsightError::McpError(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<()> {
        let payload = serde_json::to_string(&request)?;
        self.write_frame(payload).await
    }

    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        let payload = serde_json::to_string(&notification)?;
        self.write_frame(payload).await
    }

    async fn receive_response(&mut self) -> Result<Option<JsonRpcResponse>> {
        Ok(self.responses.recv().await)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        info!("Closing stdio transport for '{}'", self.command);

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        if let Some(mut child) = self.child.take() {
            match child.kill().await {
                Ok(_) => info!("MCP server process terminated"),
                Err(e) => error!("Failed to kill MCP server process: {}", e),
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Resolve `${VAR}` / `${VAR:-default}` references in an env value.
fn resolve_env_value(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let inner = &value[2..value.len() - 1];

        if let Some((var_name, default)) = inner.split_once(":-") {
            std::env::var(var_name).unwrap_or_else(|_| default.to_string())
        } else {
            std::env::var(inner).unwrap_or_else(|_| value.to_string())
        }
    } else {
        value.to_string()
    }
}
