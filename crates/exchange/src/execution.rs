//! The `Exchange` interface consumed by the trading core (spec.md §6.1).
//!
//! The core never depends on a concrete venue; every production or
//! paper-trading adapter implements this trait, and the engine is exercised
//! against whichever one the caller wires up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{L2OrderBook, OrderType, Side};

/// One book-level update delivered by a streaming subscription.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub condition_id: String,
    pub token_id: String,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
    pub ts: DateTime<Utc>,
}

/// A order submission. `limit_price` is the caller's final word — no
/// adapter may re-fetch current price to replace it, and none may add
/// implicit slippage (spec.md §6.1).
#[derive(Debug, Clone)]
pub struct Order {
    pub token_id: String,
    pub side: Side,
    pub limit_price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
}

impl Order {
    #[must_use]
    pub fn buy_fok(token_id: impl Into<String>, limit_price: Decimal, size: Decimal) -> Self {
        Self { token_id: token_id.into(), side: Side::Buy, limit_price, size, order_type: OrderType::Fok }
    }

    #[must_use]
    pub fn sell_fok(token_id: impl Into<String>, limit_price: Decimal, size: Decimal) -> Self {
        Self { token_id: token_id.into(), side: Side::Sell, limit_price, size, order_type: OrderType::Fok }
    }

    #[must_use]
    pub fn buy_gtc(token_id: impl Into<String>, limit_price: Decimal, size: Decimal) -> Self {
        Self { token_id: token_id.into(), side: Side::Buy, limit_price, size, order_type: OrderType::Gtc }
    }

    #[must_use]
    pub fn sell_gtc(token_id: impl Into<String>, limit_price: Decimal, size: Decimal) -> Self {
        Self { token_id: token_id.into(), side: Side::Sell, limit_price, size, order_type: OrderType::Gtc }
    }
}

/// Terminal status of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Matched,
    Rejected,
    Cancelled,
    Expired,
}

impl OrderStatus {
    #[must_use]
    pub fn is_fill(self) -> bool {
        matches!(self, Self::Matched)
    }
}

/// Outcome of `Exchange::place_order`.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub order_id: String,
    pub status: OrderStatus,
    pub filled_size: Decimal,
    pub avg_price: Decimal,
}

impl OrderOutcome {
    #[must_use]
    pub fn matched(order_id: impl Into<String>, filled_size: Decimal, avg_price: Decimal) -> Self {
        Self { order_id: order_id.into(), status: OrderStatus::Matched, filled_size, avg_price }
    }

    #[must_use]
    pub fn rejected(order_id: impl Into<String>) -> Self {
        Self { order_id: order_id.into(), status: OrderStatus::Rejected, filled_size: Decimal::ZERO, avg_price: Decimal::ZERO }
    }
}

/// A slot-aligned binary market as reported by `find_markets`.
#[derive(Debug, Clone)]
pub struct Market {
    pub condition_id: String,
    pub asset: String,
    pub yes_token_id: String,
    pub no_token_id: String,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
}

/// Available spendable balance and any venue-specific allowance.
#[derive(Debug, Clone, Copy)]
pub struct Balance {
    pub balance: Decimal,
    pub allowance: Decimal,
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("market not found")]
    MarketNotFound,
}

/// Streaming book update handler. Implementors push into a bounded channel
/// rather than doing blocking work inline — see `BookTracker` in the engine.
#[async_trait]
pub trait BookUpdateHandler: Send + Sync {
    async fn on_update(&self, update: BookUpdate);
}

/// The venue abstraction the trading core depends on (spec.md §6.1).
///
/// Every operation is fallible. `place_order` must encode the FOK/GTC
/// distinction precisely as requested and never silently widen the caller's
/// price.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn get_book(&self, token_id: &str) -> Result<L2OrderBook, ExchangeError>;

    /// Starts or refreshes a streaming subscription for the given condition
    /// ids. Implementations auto-resubscribe on transient disconnects; a
    /// permanent failure is returned so `BookTracker` can retry at a higher
    /// level.
    async fn subscribe_book(
        &self,
        condition_ids: &[String],
        handler: std::sync::Arc<dyn BookUpdateHandler>,
    ) -> Result<(), ExchangeError>;

    async fn place_order(&self, order: Order) -> Result<OrderOutcome, ExchangeError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError>;

    async fn get_balance(&self) -> Result<Balance, ExchangeError>;

    async fn find_markets(&self, asset: &str, slot_ts: DateTime<Utc>) -> Result<Option<Market>, ExchangeError>;
}
