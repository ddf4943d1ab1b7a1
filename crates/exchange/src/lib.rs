//! The `Exchange` adapter layer: order book types, the venue-agnostic
//! `Exchange` trait consumed by the trading core, and a paper-trading
//! double used for tests and simulated runs.

pub mod execution;
pub mod orderbook;
pub mod paper;
pub mod types;

pub use execution::{
    Balance, BookUpdate, BookUpdateHandler, Exchange, ExchangeError, Market, Order, OrderOutcome,
    OrderStatus,
};
pub use orderbook::{depth_at_price, price_impact, simulate_fill};
pub use paper::{PaperExchange, PaperExchangeConfig};
pub use types::{FillSimulation, L2OrderBook, OrderType, Side};
