//! Transport layer for talking to external MCP servers
//!
//! The shipped deployment spawns stdio servers; the trait keeps the client
//! independent of how frames reach the process on the other side.

use async_trait::async_trait;
use insight_core::Result;

use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

pub mod stdio;

pub use stdio::StdioTransport;

/// One duplex connection to an MCP server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a JSON-RPC request
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<()>;

    /// Send a JSON-RPC notification (no response expected)
    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()>;

    /// Await the next JSON-RPC response; `None` once the connection is gone.
    async fn receive_response(&mut self) -> Result<Option<JsonRpcResponse>>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;
}
