//! Inventory store
//!
//! Authoritative holder of per-fruit stock levels and the append-only order
//! log. All mutation goes through [`Store::place_order`], which validates and
//! applies an order under a single write lock.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// The fixed set of items the store carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fruit {
    Apple,
    Orange,
    Banana,
}

impl Fruit {
    /// Every fruit, in catalog order
    pub const ALL: [Fruit; 3] = [Fruit::Apple, Fruit::Orange, Fruit::Banana];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Fruit::Apple => "apple",
            Fruit::Orange => "orange",
            Fruit::Banana => "banana",
        }
    }

    /// Stock level a freshly started store holds
    pub fn initial_stock(&self) -> u32 {
        match self {
            Fruit::Apple => 100,
            Fruit::Orange => 150,
            Fruit::Banana => 200,
        }
    }

    /// Canonical names of every fruit, in catalog order
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Fruit::as_str).collect()
    }

    /// Name with the first letter upper-cased, for human-readable messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Fruit::Apple => "Apple",
            Fruit::Orange => "Orange",
            Fruit::Banana => "Banana",
        }
    }
}

impl fmt::Display for Fruit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Fruit {
    type Err = StoreError;

    /// Case-insensitive parse of a canonical name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        Fruit::ALL
            .into_iter()
            .find(|fruit| fruit.as_str() == lowered)
            .ok_or(StoreError::UnknownItem(lowered))
    }
}

/// Order lifecycle status. Orders are only ever recorded once completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Completed,
}

/// An immutable record of a placed order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub fruit: Fruit,
    pub quantity: u32,
    pub status: OrderStatus,
}

/// Outcome of a successful [`Store::place_order`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order: Order,
    /// Stock left for the ordered fruit after the decrement
    pub remaining: u32,
}

/// Validation failures from store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Invalid fruit: {0}. Available fruits: apple, orange, banana")]
    UnknownItem(String),

    #[error("Quantity must be positive")]
    InvalidQuantity(i64),

    #[error("Insufficient inventory. Requested: {requested}, Available: {available}")]
    InsufficientStock {
        fruit: Fruit,
        requested: i64,
        available: u32,
    },
}

#[derive(Debug)]
struct StoreState {
    inventory: BTreeMap<Fruit, u32>,
    orders: Vec<Order>,
}

/// Shared inventory and order log
#[derive(Debug)]
pub struct Store {
    state: RwLock<StoreState>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create a store seeded with each fruit's initial stock
    pub fn new() -> Self {
        Self::with_stock(|fruit| fruit.initial_stock())
    }

    /// Create a store with explicit stock levels and an empty order log
    pub fn with_stock(stock: impl Fn(Fruit) -> u32) -> Self {
        let inventory = Fruit::ALL.into_iter().map(|f| (f, stock(f))).collect();
        Self {
            state: RwLock::new(StoreState {
                inventory,
                orders: Vec::new(),
            }),
        }
    }

    /// Snapshot of every stock level
    pub async fn inventory(&self) -> BTreeMap<Fruit, u32> {
        self.state.read().await.inventory.clone()
    }

    /// Stock level for a single fruit, by case-insensitive name
    pub async fn stock(&self, item: &str) -> Result<u32, StoreError> {
        let fruit: Fruit = item.parse()?;
        let state = self.state.read().await;
        Ok(state.inventory.get(&fruit).copied().unwrap_or_default())
    }

    /// Validate and apply an order.
    ///
    /// Checks run in order: known fruit, positive quantity, sufficient stock.
    /// The stock check, decrement and log append happen under one write lock,
    /// so concurrent orders can never overdraw an item.
    pub async fn place_order(&self, item: &str, quantity: i64) -> Result<OrderReceipt, StoreError> {
        let fruit: Fruit = item.parse()?;
        if quantity <= 0 {
            return Err(StoreError::InvalidQuantity(quantity));
        }

        let mut state = self.state.write().await;
        let available = state.inventory.get(&fruit).copied().unwrap_or_default();
        let requested = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= available)
            .ok_or(StoreError::InsufficientStock {
                fruit,
                requested: quantity,
                available,
            })?;

        let remaining = available - requested;
        state.inventory.insert(fruit, remaining);

        let order = Order {
            order_id: state.orders.len() as u64 + 1,
            fruit,
            quantity: requested,
            status: OrderStatus::Completed,
        };
        state.orders.push(order.clone());
        drop(state);

        info!(
            order_id = order.order_id,
            fruit = %fruit,
            quantity = requested,
            remaining,
            "Order placed"
        );

        Ok(OrderReceipt { order, remaining })
    }

    /// Every order in placement order
    pub async fn orders(&self) -> Vec<Order> {
        self.state.read().await.orders.clone()
    }
}
