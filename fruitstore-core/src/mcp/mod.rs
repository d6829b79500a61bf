//! MCP (Model Context Protocol) server implementation
//!
//! Exposes the fruit store's tools over stdio and HTTP/SSE.

mod protocol;
mod server;
mod sse;
mod transport;

pub use protocol::*;
pub use server::*;
pub use sse::*;
pub use transport::*;
