//! HTTP/SSE transport for the MCP server
//!
//! Implements the MCP 2024-11-05 SSE transport:
//! - `GET /sse` opens an event stream. Its first event (`endpoint`) tells
//!   the client where to POST; JSON-RPC replies arrive as `message` events.
//! - `POST /messages/?session_id=<id>` carries one client JSON-RPC message
//!   and is answered with `202 Accepted`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::StreamExt;
use futures::stream;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited, StreamBody};
use hyper::body::{Body, Bytes, Frame};
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::Result;
use crate::mcp::McpServer;
use crate::mcp::protocol::JsonRpcRequest;

/// Path of the event-stream endpoint
pub const SSE_PATH: &str = "/sse";
/// Path clients POST their messages to
pub const MESSAGES_PATH: &str = "/messages/";

/// Outgoing messages buffered per session before POSTs start waiting
const SESSION_BUFFER: usize = 32;

/// Largest POST body accepted on the messages endpoint
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Response body type for every route
pub type SseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Encode one server-sent event. Multi-line data becomes one `data:` line
/// per line.
pub fn sse_event(event: &str, data: &str) -> String {
    let mut out = format!("event: {event}\n");
    for line in data.lines() {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

fn full_body(bytes: impl Into<Bytes>) -> SseBody {
    Full::new(bytes.into()).boxed_unsync()
}

fn text_response(status: StatusCode, text: &str) -> Response<SseBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(full_body(text.to_string()))
        .unwrap_or_else(|_| {
            warn!("Failed to build HTTP response, returning empty 500");
            let mut resp = Response::new(full_body(Bytes::new()));
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        })
}

/// Removes its session from the table when the event stream is dropped
struct SessionGuard {
    id: Uuid,
    state: Weak<SseState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.sessions().remove(&self.id);
            debug!("SSE session {} closed", self.id.simple());
        }
    }
}

/// Routing state shared by every connection: the MCP server plus the open
/// sessions' outgoing channels.
pub struct SseState {
    server: Arc<McpServer>,
    sessions: Mutex<HashMap<Uuid, mpsc::Sender<String>>>,
}

impl SseState {
    pub fn new(server: Arc<McpServer>) -> Arc<Self> {
        Arc::new(Self {
            server,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, mpsc::Sender<String>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of currently open event streams
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// Drop every session's sender so their streams end
    pub fn close_all(&self) {
        self.sessions().clear();
    }

    /// Route one HTTP request
    pub async fn route<B>(
        self: &Arc<Self>,
        req: Request<B>,
    ) -> std::result::Result<Response<SseBody>, Infallible>
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        match (&method, path.as_str()) {
            (&Method::GET, SSE_PATH) => Ok(self.open_stream()),
            (&Method::POST, MESSAGES_PATH) | (&Method::POST, "/messages") => {
                Ok(self.post_message(req).await)
            }
            (_, SSE_PATH) | (_, MESSAGES_PATH) => {
                Ok(text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"))
            }
            _ => Ok(text_response(StatusCode::NOT_FOUND, "Not found")),
        }
    }

    fn open_stream(self: &Arc<Self>) -> Response<SseBody> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel::<String>(SESSION_BUFFER);
        self.sessions().insert(id, tx);
        info!("SSE session {} opened", id.simple());

        let guard = SessionGuard {
            id,
            state: Arc::downgrade(self),
        };
        let endpoint = format!("{MESSAGES_PATH}?session_id={}", id.simple());
        let first = stream::once(futures::future::ready(sse_event("endpoint", &endpoint)));
        let messages = stream::unfold((rx, guard), |(mut rx, guard)| async move {
            let message = rx.recv().await?;
            Some((sse_event("message", &message), (rx, guard)))
        });
        let frames = first
            .chain(messages)
            .map(|event| Ok::<_, Infallible>(Frame::data(Bytes::from(event))));

        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .body(StreamBody::new(frames).boxed_unsync())
            .unwrap_or_else(|_| {
                warn!("Failed to build SSE response");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            })
    }

    async fn post_message<B>(self: &Arc<Self>, req: Request<B>) -> Response<SseBody>
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let session_id = req.uri().query().and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "session_id")
                .map(|(_, value)| value.into_owned())
        });
        let Some(raw_id) = session_id else {
            return text_response(StatusCode::BAD_REQUEST, "session_id is required");
        };
        let Ok(id) = Uuid::parse_str(&raw_id) else {
            return text_response(StatusCode::BAD_REQUEST, "Invalid session ID");
        };
        let Some(sender) = self.sessions().get(&id).cloned() else {
            return text_response(StatusCode::NOT_FOUND, "Could not find session");
        };

        let body = match Limited::new(req.into_body(), MAX_MESSAGE_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                warn!("SSE message for session {} exceeds {MAX_MESSAGE_BYTES} bytes", id.simple());
                return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Message too large");
            }
            Err(e) => {
                warn!("Failed to read SSE message body: {e}");
                return text_response(StatusCode::BAD_REQUEST, "Could not read message");
            }
        };
        let request: JsonRpcRequest = match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => {
                debug!("Unparseable SSE message: {e}");
                return text_response(StatusCode::BAD_REQUEST, "Could not parse message");
            }
        };

        if let Some(response) = self.server.handle_message(request).await {
            let json = match serde_json::to_string(&response) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize MCP response: {e}");
                    return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
                }
            };
            if sender.send(json).await.is_err() {
                self.sessions().remove(&id);
                return text_response(StatusCode::NOT_FOUND, "Session closed");
            }
        }

        text_response(StatusCode::ACCEPTED, "Accepted")
    }
}

/// HTTP server exposing an [`McpServer`] over SSE.
pub struct SseMcpServer {
    local_addr: SocketAddr,
    state: Arc<SseState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _task: JoinHandle<()>,
}

impl SseMcpServer {
    /// Bind `addr` and spawn the accept loop.
    ///
    /// Port `0` binds an OS-assigned port; see [`local_addr`](Self::local_addr).
    pub async fn start(server: Arc<McpServer>, addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("MCP SSE server listening on {}", local_addr);

        let state = SseState::new(server);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let loop_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            Self::accept_loop(listener, loop_state, shutdown_rx).await;
        });

        Ok(Self {
            local_addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            _task: task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The full URL of the event stream (e.g. `http://127.0.0.1:8000/sse`).
    pub fn sse_url(&self) -> String {
        format!("http://{}{}", self.local_addr, SSE_PATH)
    }

    pub fn state(&self) -> &Arc<SseState> {
        &self.state
    }

    /// Stop accepting connections and end every open event stream.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.state.close_all();
    }

    async fn accept_loop(
        listener: TcpListener,
        state: Arc<SseState>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("MCP SSE connection from {}", addr);
                            let state = Arc::clone(&state);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let state = Arc::clone(&state);
                                    async move { state.route(req).await }
                                });
                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    error!("MCP SSE connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("MCP SSE accept error: {}", e);
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!("MCP SSE server shutting down");
                    break;
                }
            }
        }
    }
}
