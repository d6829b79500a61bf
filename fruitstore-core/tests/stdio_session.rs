//! Integration tests for the line-delimited stdio transport

use std::sync::Arc;

use fruitstore_core::mcp::{McpServer, serve_lines};
use fruitstore_core::{Dispatcher, SERVER_NAME, Store};
use serde_json::Value;

fn server() -> McpServer {
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(Store::new())));
    McpServer::new(dispatcher, SERVER_NAME, "0.0.0-test")
}

async fn run_session(input: &str) -> Vec<Value> {
    run_raw_session(input.as_bytes()).await
}

async fn run_raw_session(input: &[u8]) -> Vec<Value> {
    let reader = tokio::io::BufReader::new(input);
    let mut output = Vec::new();
    serve_lines(&server(), reader, &mut output)
        .await
        .expect("session should run to EOF");

    String::from_utf8(output)
        .expect("output should be UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect()
}

fn tool_body(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("tool result should carry text");
    serde_json::from_str(text).expect("tool text should be JSON")
}

#[tokio::test]
async fn test_full_session() {
    let input = [
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"1"}}}"#,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"place_order","arguments":{"fruit":"Apple","quantity":30}}}"#,
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"get_orders","arguments":{}}}"#,
    ]
    .join("\n");

    let responses = run_session(&input).await;
    assert_eq!(responses.len(), 4, "notification and blank line get no reply");

    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], SERVER_NAME);

    let tools = responses[1]["result"]["tools"]
        .as_array()
        .expect("tools should be an array");
    assert_eq!(tools.len(), 4);

    let order = tool_body(&responses[2]);
    assert_eq!(order["remaining_inventory"], 70);
    assert!(responses[2]["result"].get("isError").is_none());

    let orders = tool_body(&responses[3]);
    assert_eq!(orders["total_orders"], 1);
    assert_eq!(orders["orders"][0]["order_id"], 1);
}

#[tokio::test]
async fn test_errors_do_not_end_the_session() {
    let input = [
        "this is not json",
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"frobnicate","arguments":{}}}"#,
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"place_order","arguments":{"fruit":"banana","quantity":9999}}}"#,
        r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#,
        r#"{"jsonrpc":"2.0","id":4,"method":"ping"}"#,
    ]
    .join("\n");

    let responses = run_session(&input).await;
    assert_eq!(responses.len(), 5);

    assert_eq!(responses[0]["error"]["code"], -32700);
    assert!(responses[0]["id"].is_null());

    assert_eq!(responses[1]["result"]["isError"], true);
    assert_eq!(tool_body(&responses[1])["error"], "Unknown tool: frobnicate");

    let shortfall = tool_body(&responses[2]);
    assert_eq!(shortfall["requested"], 9999);
    assert_eq!(shortfall["available"], 200);

    assert_eq!(responses[3]["error"]["code"], -32601);
    assert_eq!(responses[4]["id"], 4);
}

#[tokio::test]
async fn test_tool_text_is_pretty_printed() {
    let input = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"get_inventory"}}"#;
    let responses = run_session(input).await;
    let text = responses[0]["result"]["content"][0]["text"]
        .as_str()
        .expect("tool result should carry text");
    assert!(text.starts_with("{\n  \"inventory\": {\n    \"apple\": 100,"));
}

#[tokio::test]
async fn test_invalid_utf8_line_does_not_end_the_session() {
    let mut input = Vec::new();
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n");
    input.extend_from_slice(b"\xff\xfe garbage\n");
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");

    let responses = run_raw_session(&input).await;
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["error"]["code"], -32700);
    assert!(responses[1]["id"].is_null());
    assert_eq!(responses[2]["id"], 2);
    assert_eq!(responses[2]["result"], serde_json::json!({}));
}

#[tokio::test]
async fn test_json_without_method_is_an_invalid_request() {
    let input = [
        r#"{"jsonrpc":"2.0","id":3}"#,
        r#"{"jsonrpc":"2.0","id":4,"method":"ping"}"#,
    ]
    .join("\n");

    let responses = run_session(&input).await;
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["error"]["code"], -32600);
    assert_eq!(responses[0]["id"], 3);
    assert_eq!(responses[1]["id"], 4);
}
