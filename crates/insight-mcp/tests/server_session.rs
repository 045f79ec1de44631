//! End-to-end server sessions over an in-memory duplex stream.

use async_trait::async_trait;
use insight_core::{InsightError, Result};
use insight_mcp::prompts::{Prompt, PromptRegistry};
use insight_mcp::server::McpServer;
use insight_mcp::types::PromptArgument;
use insight_tools::{Tool, ToolRegistry};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;

struct FixedTranscriptTool;

#[async_trait]
impl Tool for FixedTranscriptTool {
    fn name(&self) -> &str {
        "fetch_transcript"
    }

    fn description(&self) -> &str {
        "Fetch a transcript for a video id"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "video_id": {"type": "string"}
            },
            "required": ["video_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let video_id = args["video_id"].as_str().unwrap_or_default();
        if video_id == "abc123" {
            Ok(Value::String("welcome to the business show".to_string()))
        } else {
            Err(InsightError::tool(
                self.name(),
                format!("No transcript available for video '{video_id}'"),
            ))
        }
    }
}

struct ExplodingTool;

#[async_trait]
impl Tool for ExplodingTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        Err(InsightError::tool(self.name(), "boom"))
    }
}

struct VideoPrompt;

impl Prompt for VideoPrompt {
    fn name(&self) -> &str {
        "business_insight"
    }

    fn description(&self) -> &str {
        "Analyze a business video"
    }

    fn arguments(&self) -> Vec<PromptArgument> {
        vec![PromptArgument {
            name: "video_link".to_string(),
            description: Some("Link to the video".to_string()),
            required: Some(true),
        }]
    }

    fn render(&self, args: &HashMap<String, String>) -> Result<String> {
        let link = args
            .get("video_link")
            .ok_or_else(|| InsightError::prompt(self.name(), "Missing required argument 'video_link'"))?;
        Ok(format!("Analyze the video at {link}"))
    }
}

struct TestClient {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl TestClient {
    async fn send_raw(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.unwrap();
        assert!(n > 0, "server closed the stream unexpectedly");
        serde_json::from_str(line.trim()).unwrap()
    }

    async fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        let frame = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        self.send_raw(&frame.to_string()).await;
        self.recv().await
    }

    async fn notify(&mut self, method: &str) {
        let frame = json!({"jsonrpc": "2.0", "method": method});
        self.send_raw(&frame.to_string()).await;
    }

    /// Run the initialize round trip plus the initialized notification.
    async fn handshake(&mut self) -> Value {
        let response = self
            .request(
                1,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-harness", "version": "0.0.0"}
                }),
            )
            .await;
        self.notify("notifications/initialized").await;
        response
    }

    async fn close(mut self) {
        self.writer.shutdown().await.unwrap();
    }
}

fn test_registry() -> Arc<ToolRegistry> {
    let registry = ToolRegistry::new();
    registry.register(FixedTranscriptTool).unwrap();
    registry.register(ExplodingTool).unwrap();
    Arc::new(registry)
}

fn start_server(server: McpServer) -> (TestClient, JoinHandle<Result<()>>) {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_side);
    let (client_read, client_write) = tokio::io::split(client_side);

    let handle = tokio::spawn(async move { server.serve(server_read, server_write).await });

    (
        TestClient {
            reader: BufReader::new(client_read),
            writer: client_write,
        },
        handle,
    )
}

fn start_default_server() -> (TestClient, JoinHandle<Result<()>>) {
    let server = McpServer::new("test-server", "0.1.0", test_registry());
    start_server(server)
}

/// Extract the text of the single content item in a tools/call result.
fn single_text(response: &Value) -> &str {
    let content = response["result"]["content"].as_array().unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0]["type"], "text");
    content[0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn initialize_advertises_identity_and_capabilities() {
    let (mut client, handle) = start_default_server();

    let response = client.handshake().await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(response["result"]["serverInfo"]["name"], "test-server");
    assert!(response["result"]["capabilities"]["tools"].is_object());
    // No prompts registered, so the capability is absent.
    assert!(response["result"]["capabilities"]
        .get("prompts")
        .is_none());

    client.close().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn list_names_match_call_dispatch_and_are_stable() {
    let (mut client, handle) = start_default_server();
    client.handshake().await;

    let first = client.request(2, "tools/list", json!({})).await;
    let second = client.request(3, "tools/list", json!({})).await;
    assert_eq!(first["result"], second["result"]);

    let names: Vec<&str> = first["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["explode", "fetch_transcript"]);

    // Every advertised name dispatches without raising past the adapter.
    for (id, name) in names.iter().enumerate() {
        let response = client
            .request(
                10 + id as u64,
                "tools/call",
                json!({"name": name, "arguments": {"video_id": "abc123"}}),
            )
            .await;
        assert!(response["result"]["content"].is_array());
        assert!(response.get("error").is_none());
    }

    client.close().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn transcript_round_trip_returns_fixed_string() {
    let (mut client, handle) = start_default_server();
    client.handshake().await;

    let response = client
        .request(
            2,
            "tools/call",
            json!({"name": "fetch_transcript", "arguments": {"video_id": "abc123"}}),
        )
        .await;

    assert_eq!(single_text(&response), "welcome to the business show");

    client.close().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_tool_yields_not_implemented_payload() {
    let (mut client, handle) = start_default_server();
    client.handshake().await;

    let response = client
        .request(
            2,
            "tools/call",
            json!({"name": "nonexistent_tool", "arguments": {}}),
        )
        .await;

    let payload: Value = serde_json::from_str(single_text(&response)).unwrap();
    assert_eq!(
        payload,
        json!({"error": "Tool 'nonexistent_tool' not implemented."})
    );

    client.close().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn failing_tool_yields_execution_failed_payload() {
    let (mut client, handle) = start_default_server();
    client.handshake().await;

    let response = client
        .request(
            2,
            "tools/call",
            json!({"name": "explode", "arguments": {}}),
        )
        .await;

    let payload: Value = serde_json::from_str(single_text(&response)).unwrap();
    assert_eq!(
        payload,
        json!({"error": "Failed to execute tool 'explode': boom"})
    );

    client.close().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn requests_before_handshake_are_rejected() {
    let (mut client, handle) = start_default_server();

    let response = client.request(1, "tools/list", json!({})).await;
    assert_eq!(response["error"]["code"], -32002);

    // The session is still usable after a proper handshake.
    client.handshake().await;
    let response = client.request(2, "tools/list", json!({})).await;
    assert!(response["result"]["tools"].is_array());

    client.close().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_method_and_parse_errors() {
    let (mut client, handle) = start_default_server();
    client.handshake().await;

    let response = client.request(2, "resources/list", json!({})).await;
    assert_eq!(response["error"]["code"], -32601);

    client.send_raw("{this is not json").await;
    let response = client.recv().await;
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);

    client.close().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn double_initialize_is_rejected() {
    let (mut client, handle) = start_default_server();
    client.handshake().await;

    let response = client
        .request(
            2,
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-harness", "version": "0.0.0"}
            }),
        )
        .await;
    assert_eq!(response["error"]["code"], -32600);

    client.close().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn prompts_are_listed_and_rendered() {
    let mut prompts = PromptRegistry::new();
    prompts.register(VideoPrompt).unwrap();
    let server = McpServer::new("test-server", "0.1.0", test_registry()).with_prompts(prompts);
    let (mut client, handle) = start_server(server);

    let response = client.handshake().await;
    assert!(response["result"]["capabilities"]["prompts"].is_object());

    let listed = client.request(2, "prompts/list", json!({})).await;
    assert_eq!(listed["result"]["prompts"][0]["name"], "business_insight");

    let rendered = client
        .request(
            3,
            "prompts/get",
            json!({
                "name": "business_insight",
                "arguments": {"video_link": "https://www.youtube.com/watch?v=abc123"}
            }),
        )
        .await;
    let message = &rendered["result"]["messages"][0];
    assert_eq!(message["role"], "user");
    assert_eq!(
        message["content"]["text"],
        "Analyze the video at https://www.youtube.com/watch?v=abc123"
    );

    let unknown = client
        .request(4, "prompts/get", json!({"name": "no_such_prompt"}))
        .await;
    assert_eq!(unknown["error"]["code"], -32602);

    client.close().await;
    handle.await.unwrap().unwrap();
}
