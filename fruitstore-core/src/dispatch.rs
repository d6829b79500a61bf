//! Tool dispatcher
//!
//! Turns a tool name plus a loosely-typed JSON argument map into a typed
//! [`Command`], runs it against the [`Store`], and renders the outcome as a
//! [`Payload`]. Every outcome, including bad input, is a payload; dispatch
//! never fails.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::mcp::{McpToolDefinition, McpToolResult, ToolProvider};
use crate::store::{Fruit, Store, StoreError};

/// Decoding failures for a tool call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownCommand(String),
}

/// A decoded tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetInventory,
    /// `fruit` is lower-cased but not yet validated
    CheckFruit { fruit: String },
    /// `quantity` is 0 when the argument was missing or not a whole number
    PlaceOrder { fruit: String, quantity: i64 },
    GetOrders,
}

impl Command {
    pub const GET_INVENTORY: &'static str = "get_inventory";
    pub const CHECK_FRUIT: &'static str = "check_fruit";
    pub const PLACE_ORDER: &'static str = "place_order";
    pub const GET_ORDERS: &'static str = "get_orders";

    /// Decode a tool name and its arguments.
    ///
    /// Argument rules:
    /// - `fruit`: the string value lower-cased; anything else becomes `""`.
    /// - `quantity`: integers are taken as-is (saturating above `i64::MAX`),
    ///   floats with no fractional part are truncated to integers, and every
    ///   other value, or a missing one, becomes `0`.
    pub fn decode(name: &str, args: &Value) -> Result<Self, DispatchError> {
        match name {
            Self::GET_INVENTORY => Ok(Command::GetInventory),
            Self::CHECK_FRUIT => Ok(Command::CheckFruit {
                fruit: fruit_arg(args),
            }),
            Self::PLACE_ORDER => Ok(Command::PlaceOrder {
                fruit: fruit_arg(args),
                quantity: quantity_arg(args),
            }),
            Self::GET_ORDERS => Ok(Command::GetOrders),
            other => Err(DispatchError::UnknownCommand(other.to_string())),
        }
    }
}

fn fruit_arg(args: &Value) -> String {
    args.get("fruit")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase()
}

fn quantity_arg(args: &Value) -> i64 {
    let Some(Value::Number(n)) = args.get("quantity") else {
        return 0;
    };
    n.as_i64()
        .or_else(|| n.as_u64().map(|_| i64::MAX))
        .or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        })
        .unwrap_or(0)
}

/// Tagged result of a dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub is_error: bool,
    pub body: Value,
}

impl Payload {
    pub fn success(body: Value) -> Self {
        Self {
            is_error: false,
            body,
        }
    }

    pub fn error(body: Value) -> Self {
        Self {
            is_error: true,
            body,
        }
    }

    /// Body pretty-printed with two-space indentation
    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| self.body.to_string())
    }

    pub fn into_tool_result(self) -> McpToolResult {
        if self.is_error {
            McpToolResult::error(self.to_text())
        } else {
            McpToolResult::text(self.to_text())
        }
    }
}

impl From<&StoreError> for Payload {
    fn from(err: &StoreError) -> Self {
        let body = match err {
            StoreError::UnknownItem(fruit) => json!({
                "error": err.to_string(),
                "fruit": fruit,
                "valid_fruits": Fruit::names(),
            }),
            StoreError::InvalidQuantity(quantity) => json!({
                "error": err.to_string(),
                "quantity": quantity,
            }),
            StoreError::InsufficientStock {
                fruit,
                requested,
                available,
            } => json!({
                "error": err.to_string(),
                "fruit": fruit,
                "requested": requested,
                "available": available,
            }),
        };
        Payload::error(body)
    }
}

impl From<&DispatchError> for Payload {
    fn from(err: &DispatchError) -> Self {
        let body = match err {
            DispatchError::UnknownCommand(name) => json!({
                "error": err.to_string(),
                "tool": name,
            }),
        };
        Payload::error(body)
    }
}

/// Routes tool calls to the store
pub struct Dispatcher {
    store: Arc<Store>,
}

impl Dispatcher {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Decode and run a tool call
    pub async fn dispatch(&self, name: &str, args: &Value) -> Payload {
        match Command::decode(name, args) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                warn!("Rejected tool call: {e}");
                Payload::from(&e)
            }
        }
    }

    /// Run an already decoded command
    pub async fn execute(&self, command: Command) -> Payload {
        debug!(?command, "Executing command");
        match command {
            Command::GetInventory => {
                let inventory = self.store.inventory().await;
                Payload::success(json!({
                    "inventory": inventory,
                    "message": "Current inventory levels for all fruits",
                }))
            }
            Command::CheckFruit { fruit } => self.check_fruit(&fruit).await,
            Command::PlaceOrder { fruit, quantity } => self.place_order(&fruit, quantity).await,
            Command::GetOrders => {
                let orders = self.store.orders().await;
                Payload::success(json!({
                    "total_orders": orders.len(),
                    "orders": orders,
                    "message": format!("Total orders placed: {}", orders.len()),
                }))
            }
        }
    }

    async fn check_fruit(&self, fruit: &str) -> Payload {
        let parsed = match fruit.parse::<Fruit>() {
            Ok(f) => f,
            Err(e) => return Payload::from(&e),
        };
        match self.store.stock(parsed.as_str()).await {
            Ok(available) => Payload::success(json!({
                "fruit": parsed,
                "available": available,
                "message": format!("{} inventory: {available} units", parsed.display_name()),
            })),
            Err(e) => Payload::from(&e),
        }
    }

    async fn place_order(&self, fruit: &str, quantity: i64) -> Payload {
        match self.store.place_order(fruit, quantity).await {
            Ok(receipt) => {
                let order = &receipt.order;
                Payload::success(json!({
                    "success": true,
                    "order": order,
                    "remaining_inventory": receipt.remaining,
                    "message": format!(
                        "Order placed successfully! {} {}(s) ordered. Remaining: {}",
                        order.quantity, order.fruit, receipt.remaining
                    ),
                }))
            }
            Err(e) => {
                debug!("Order rejected: {e}");
                Payload::from(&e)
            }
        }
    }
}

/// Static catalog of the tools the dispatcher serves, in advertised order
pub fn tool_definitions() -> Vec<McpToolDefinition> {
    let fruit_enum = Fruit::names();
    vec![
        McpToolDefinition {
            name: Command::GET_INVENTORY.to_string(),
            description:
                "Get current inventory levels for all fruits (apples, oranges, bananas)"
                    .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        McpToolDefinition {
            name: Command::CHECK_FRUIT.to_string(),
            description: "Check inventory level for a specific fruit".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "fruit": {
                        "type": "string",
                        "enum": fruit_enum,
                        "description": "The fruit to check (apple, orange, or banana)"
                    }
                },
                "required": ["fruit"]
            }),
        },
        McpToolDefinition {
            name: Command::PLACE_ORDER.to_string(),
            description: "Place an order for fruits. Reduces inventory if sufficient stock is available."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "fruit": {
                        "type": "string",
                        "enum": fruit_enum,
                        "description": "The fruit to order (apple, orange, or banana)"
                    },
                    "quantity": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Quantity to order (must be positive)"
                    }
                },
                "required": ["fruit", "quantity"]
            }),
        },
        McpToolDefinition {
            name: Command::GET_ORDERS.to_string(),
            description: "Get list of all placed orders".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
    ]
}

#[async_trait]
impl ToolProvider for Dispatcher {
    fn tools(&self) -> Vec<McpToolDefinition> {
        tool_definitions()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpToolResult {
        self.dispatch(name, &arguments).await.into_tool_result()
    }
}
