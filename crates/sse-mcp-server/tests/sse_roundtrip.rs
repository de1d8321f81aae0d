//! End-to-end tests over a real socket
//!
//! A client opens the push stream, posts requests to the announced endpoint
//! and reads the responses back off the stream.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use sse_mcp_server::prelude::*;

struct EchoTool;

#[async_trait]
impl McpTool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn input_schema(&self) -> ToolSchema {
        ToolSchema::object().with_property(
            "message",
            JsonSchema::string().with_description("Message to echo back"),
        )
    }

    async fn call(
        &self,
        arguments: Map<String, Value>,
        _session: Option<&SessionContext>,
    ) -> McpResult<String> {
        let message = arguments.get("message").and_then(Value::as_str).unwrap_or("");
        Ok(format!("Echo: {}", message))
    }
}

struct TestServer {
    base_url: String,
    server: SseMcpServer,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(strict: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = SseMcpServer::builder()
            .name("roundtrip-test")
            .version("1.0.0")
            .bind_address(addr)
            .strict_lifecycle(strict)
            .stream_config(StreamConfig {
                keepalive_interval_seconds: 1,
                ..StreamConfig::default()
            })
            .tool(EchoTool)
            .build()
            .unwrap();

        let (tx, rx) = oneshot::channel();
        let running = server.clone();
        let handle = tokio::spawn(async move {
            running
                .serve_with_shutdown(listener, async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            server,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap();
    }
}

/// Incremental reader over an SSE response body
struct EventReader {
    response: reqwest::Response,
    buffer: String,
}

impl EventReader {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: String::new(),
        }
    }

    /// Next non-ping event as `(event, data)`.
    async fn next(&mut self) -> (String, String) {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let raw: String = self.buffer.drain(..end + 2).collect();
                let mut event = String::new();
                let mut data = Vec::new();
                for line in raw.lines() {
                    if let Some(value) = line.strip_prefix("event: ") {
                        event = value.to_string();
                    } else if let Some(value) = line.strip_prefix("data: ") {
                        data.push(value);
                    }
                }
                if event == "ping" {
                    continue;
                }
                return (event, data.join("\n"));
            }

            let chunk = tokio::time::timeout(Duration::from_secs(5), self.response.chunk())
                .await
                .expect("timed out waiting for an event")
                .unwrap()
                .expect("push stream ended");
            self.buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }

    async fn next_message(&mut self) -> Value {
        let (event, data) = self.next().await;
        assert_eq!(event, "message");
        serde_json::from_str(&data).unwrap()
    }
}

async fn connect(client: &reqwest::Client, base_url: &str, query: &str) -> (EventReader, String) {
    let response = client
        .get(format!("{}/sse{}", base_url, query))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let mut reader = EventReader::new(response);
    let (event, endpoint) = reader.next().await;
    assert_eq!(event, "endpoint");
    (reader, endpoint)
}

async fn post(client: &reqwest::Client, endpoint: &str, body: Value) -> reqwest::Response {
    client.post(endpoint).json(&body).send().await.unwrap()
}

#[tokio::test]
async fn test_echo_round_trip() {
    let server = TestServer::start(false).await;
    let client = reqwest::Client::new();

    let (mut reader, endpoint) = connect(&client, &server.base_url, "?clientId=s1").await;
    assert!(endpoint.ends_with("/message/s1"), "endpoint was {}", endpoint);

    let response = post(
        &client,
        &endpoint,
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {"name": "echo", "arguments": {"message": "hi"}},
            "id": "1"
        }),
    )
    .await;
    assert_eq!(response.status(), 202);
    assert!(response.bytes().await.unwrap().is_empty());

    let message = reader.next_message().await;
    assert_eq!(message["id"], "1");
    assert_eq!(message["result"]["content"][0]["type"], "text");
    assert_eq!(message["result"]["content"][0]["text"], "Echo: hi");

    let response = post(&client, &endpoint, json!({"method": "bogus", "id": "2"})).await;
    assert_eq!(response.status(), 202);

    let message = reader.next_message().await;
    assert_eq!(message["id"], "2");
    assert_eq!(message["error"]["code"], -32601);

    server.stop().await;
}

#[tokio::test]
async fn test_handshake_and_tool_listing_in_strict_mode() {
    let server = TestServer::start(true).await;
    let client = reqwest::Client::new();
    let (mut reader, endpoint) = connect(&client, &server.base_url, "").await;
    assert!(endpoint.contains("/message/client-"));

    post(&client, &endpoint, json!({"jsonrpc": "2.0", "method": "tools/list", "id": 1})).await;
    let rejected = reader.next_message().await;
    assert_eq!(rejected["error"]["code"], -32600);

    post(
        &client,
        &endpoint,
        json!({
            "jsonrpc": "2.0",
            "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {}},
            "id": 2
        }),
    )
    .await;
    let initialized = reader.next_message().await;
    assert_eq!(initialized["id"], 2);
    assert_eq!(initialized["result"]["serverInfo"]["name"], "roundtrip-test");
    assert_eq!(initialized["result"]["capabilities"]["tools"]["listChanged"], false);

    let response = post(
        &client,
        &endpoint,
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    )
    .await;
    assert_eq!(response.status(), 202);

    post(&client, &endpoint, json!({"jsonrpc": "2.0", "method": "tools/list", "id": 3})).await;
    let listed = reader.next_message().await;
    assert_eq!(listed["id"], 3);
    assert_eq!(listed["result"]["tools"][0]["name"], "echo");
    assert_eq!(
        listed["result"]["tools"][0]["inputSchema"]["properties"]["message"]["type"],
        "string"
    );

    server.stop().await;
}

#[tokio::test]
async fn test_bad_origin_is_forbidden() {
    let server = TestServer::start(false).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/sse?clientId=s1", server.base_url))
        .header("Origin", "https://evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    assert_eq!(server.server.stats().sessions, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_parse_error_in_post_body() {
    let server = TestServer::start(false).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/message/s1", server.base_url))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_and_shutdown_release_sessions() {
    let server = TestServer::start(false).await;
    let client = reqwest::Client::new();

    let (reader, _) = connect(&client, &server.base_url, "?clientId=gone").await;
    let (_kept, _) = connect(&client, &server.base_url, "?clientId=kept").await;
    assert_eq!(server.server.stats().sessions, 2);

    drop(reader);
    let mut remaining = 2;
    // A dropped peer is noticed at the latest when a keepalive write fails.
    for _ in 0..100 {
        remaining = server.server.stats().sessions;
        if remaining == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(remaining, 1);
    assert!(server.server.sessions().get("kept").is_some());

    let sessions = server.server.sessions().clone();
    server.stop().await;
    assert!(sessions.is_empty());
}
