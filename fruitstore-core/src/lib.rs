//! fruitstore-core: inventory store and MCP tool server for a small fruit shop

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod mcp;
pub mod store;

pub use dispatch::{Command, DispatchError, Dispatcher, Payload};
pub use error::{Error, Result};
pub use store::{Fruit, Order, OrderReceipt, OrderStatus, Store, StoreError};

/// Name reported to MCP clients in `serverInfo`
pub const SERVER_NAME: &str = "fruit-store-server";
