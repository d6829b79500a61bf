//! End-to-end tests for the HTTP/SSE transport over real sockets

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fruitstore_core::mcp::{McpServer, SseMcpServer};
use fruitstore_core::{Dispatcher, SERVER_NAME, Store};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn start() -> SseMcpServer {
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(Store::new())));
    let server = Arc::new(McpServer::new(dispatcher, SERVER_NAME, "0.0.0-test"));
    SseMcpServer::start(server, SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("server should bind")
}

/// An open `GET /sse` connection plus everything read from it so far
struct EventStream {
    stream: TcpStream,
    buf: String,
    consumed: usize,
}

impl EventStream {
    async fn open(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.expect("should connect");
        stream
            .write_all(b"GET /sse HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
            .await
            .expect("should send request");
        Self {
            stream,
            buf: String::new(),
            consumed: 0,
        }
    }

    /// Wait for the next event of the given type and return its data line
    async fn next(&mut self, event: &str) -> String {
        let marker = format!("event: {event}\ndata: ");
        timeout(WAIT, async {
            loop {
                let pending = &self.buf[self.consumed..];
                if let Some(start) = pending.find(&marker) {
                    let data_start = start + marker.len();
                    if let Some(len) = pending[data_start..].find('\n') {
                        let data = pending[data_start..data_start + len].to_string();
                        self.consumed += data_start + len;
                        return data;
                    }
                }
                let mut chunk = [0u8; 4096];
                let n = self.stream.read(&mut chunk).await.expect("should read");
                assert!(n > 0, "event stream closed early");
                self.buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
            }
        })
        .await
        .expect("timed out waiting for event")
    }
}

async fn post(addr: SocketAddr, path: &str, body: &Value) -> String {
    let body = body.to_string();
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let mut stream = TcpStream::connect(addr).await.expect("should connect");
    stream
        .write_all(request.as_bytes())
        .await
        .expect("should send request");
    let mut response = String::new();
    timeout(WAIT, stream.read_to_string(&mut response))
        .await
        .expect("timed out waiting for response")
        .expect("should read response");
    response
}

fn call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

fn tool_body(message: &str) -> Value {
    let response: Value = serde_json::from_str(message).expect("message should be JSON");
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("tool result should carry text");
    serde_json::from_str(text).expect("tool text should be JSON")
}

#[tokio::test]
async fn test_sse_round_trip() {
    let server = start().await;
    let addr = server.local_addr();

    let mut events = EventStream::open(addr).await;
    let endpoint = events.next("endpoint").await;
    assert!(endpoint.starts_with("/messages/?session_id="));

    let init = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
    assert!(post(addr, &endpoint, &init).await.starts_with("HTTP/1.1 202"));
    let reply: Value = serde_json::from_str(&events.next("message").await).expect("JSON reply");
    assert_eq!(reply["result"]["serverInfo"]["name"], SERVER_NAME);

    let order = call(2, "place_order", json!({"fruit": "apple", "quantity": 30}));
    assert!(post(addr, &endpoint, &order).await.starts_with("HTTP/1.1 202"));
    let body = tool_body(&events.next("message").await);
    assert_eq!(body["success"], true);
    assert_eq!(body["remaining_inventory"], 70);

    server.shutdown().await;
}

#[tokio::test]
async fn test_sessions_share_one_store() {
    let server = start().await;
    let addr = server.local_addr();

    let mut first = EventStream::open(addr).await;
    let mut second = EventStream::open(addr).await;
    let first_endpoint = first.next("endpoint").await;
    let second_endpoint = second.next("endpoint").await;
    assert_ne!(first_endpoint, second_endpoint);
    assert_eq!(server.state().session_count(), 2);

    let order = call(1, "place_order", json!({"fruit": "banana", "quantity": 50}));
    post(addr, &first_endpoint, &order).await;
    first.next("message").await;

    let check = call(1, "check_fruit", json!({"fruit": "banana"}));
    post(addr, &second_endpoint, &check).await;
    let body = tool_body(&second.next("message").await);
    assert_eq!(body["available"], 150);

    server.shutdown().await;
}

#[tokio::test]
async fn test_post_to_unknown_session_is_rejected() {
    let server = start().await;
    let addr = server.local_addr();

    let response = post(
        addr,
        "/messages/?session_id=00000000000000000000000000000000",
        &json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}),
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 404"));

    server.shutdown().await;
}
