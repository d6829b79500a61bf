//! MCP stdio transport layer
//!
//! MCP over stdio is newline-delimited JSON: one JSON-RPC message per line
//! in each direction.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::Result;
use crate::mcp::McpServer;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse, error_codes};

/// Decode one line into a JSON-RPC request.
///
/// Blank lines decode to `Ok(None)`. A malformed line yields the error
/// response to send back: `-32700` when the line is not JSON, `-32600`
/// (carrying the id, if any) when it is JSON but not a request.
pub fn decode_line(line: &str) -> std::result::Result<Option<JsonRpcRequest>, JsonRpcResponse> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(line).map_err(parse_error)?;
    let id = value.get("id").cloned();
    serde_json::from_value(value).map(Some).map_err(|e| {
        JsonRpcResponse::error(
            id,
            error_codes::INVALID_REQUEST,
            format!("Invalid MCP request: {}", e),
        )
    })
}

/// Decode one raw line, answering bytes that are not UTF-8 as a parse error
pub fn decode_bytes(line: &[u8]) -> std::result::Result<Option<JsonRpcRequest>, JsonRpcResponse> {
    std::str::from_utf8(line)
        .map_err(parse_error)
        .and_then(decode_line)
}

fn parse_error(e: impl std::fmt::Display) -> JsonRpcResponse {
    JsonRpcResponse::error(
        None,
        error_codes::PARSE_ERROR,
        format!("Failed to parse MCP request: {}", e),
    )
}

/// Encode a response as a single newline-terminated line
pub fn encode_line(response: &JsonRpcResponse) -> Result<String> {
    let mut json = serde_json::to_string(response)?;
    json.push('\n');
    Ok(json)
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let line = encode_line(response)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Serve MCP over a line-oriented reader/writer pair until EOF.
pub async fn serve_lines<R, W>(server: &McpServer, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        let request = match decode_bytes(&line) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(response) => {
                warn!("Dropping malformed MCP message");
                write_response(&mut writer, &response).await?;
                continue;
            }
        };

        if let Some(response) = server.handle_message(request).await {
            write_response(&mut writer, &response).await?;
        }
    }
    debug!("MCP stdio input closed");
    Ok(())
}

/// Serve MCP on the process's stdin/stdout
pub async fn serve_stdio(server: &McpServer) -> Result<()> {
    info!("{} serving MCP on stdio", server.name());
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(server, stdin, stdout).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line() {
        let req = decode_line(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(req.method, "tools/list");
    }

    #[test]
    fn test_decode_blank_line() {
        assert!(decode_line("   \r").unwrap().is_none());
    }

    #[test]
    fn test_decode_garbage_yields_parse_error() {
        let resp = decode_line("{not json").unwrap_err();
        assert_eq!(resp.error.unwrap().code, error_codes::PARSE_ERROR);
        assert!(resp.id.is_none());
    }

    #[test]
    fn test_decode_request_without_method_is_invalid() {
        let resp = decode_line(r#"{"jsonrpc":"2.0","id":3}"#).unwrap_err();
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);
        assert_eq!(resp.id, Some(3.into()));
    }

    #[test]
    fn test_decode_bytes_rejects_invalid_utf8() {
        let resp = decode_bytes(b"\xff\xfe garbage\n").unwrap_err();
        assert_eq!(resp.error.unwrap().code, error_codes::PARSE_ERROR);
        assert!(resp.id.is_none());

        let req = decode_bytes(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(req.method, "ping");
    }

    #[test]
    fn test_encode_line() {
        let response = JsonRpcResponse::success(Some(1.into()), serde_json::json!({}));
        let line = encode_line(&response).unwrap();
        assert!(line.contains("\"jsonrpc\":\"2.0\""));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }
}
