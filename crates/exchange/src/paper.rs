//! In-memory `Exchange` double for paper trading and engine tests.
//!
//! Orders are matched against caller-seeded order books using the same
//! depth-walking algorithm real fills would traverse. FOK orders fill
//! entirely or are rejected outright — there is no partial-fill path,
//! matching the exchange's own FOK semantics rather than approximating
//! them with a random partial-fill roll.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::execution::{
    Balance, BookUpdateHandler, Exchange, ExchangeError, Market, Order, OrderOutcome, OrderStatus,
};
use crate::orderbook::simulate_fill;
use crate::types::{L2OrderBook, Side};

#[derive(Debug, Clone)]
pub struct PaperExchangeConfig {
    pub initial_balance: Decimal,
    /// Probability an order that has sufficient book depth still gets
    /// rejected, to exercise the engine's exception-handling paths.
    pub reject_rate: f64,
    pub random_seed: Option<u64>,
}

impl Default for PaperExchangeConfig {
    fn default() -> Self {
        Self { initial_balance: dec!(1000), reject_rate: 0.0, random_seed: None }
    }
}

impl PaperExchangeConfig {
    #[must_use]
    pub fn with_balance(initial_balance: Decimal) -> Self {
        Self { initial_balance, ..Default::default() }
    }
}

struct State {
    balance: Decimal,
    books: HashMap<String, L2OrderBook>,
    markets: HashMap<(String, DateTime<Utc>), Market>,
    rng: StdRng,
}

/// Simulated venue: no network, no signing, deterministic given a seed.
pub struct PaperExchange {
    state: RwLock<State>,
    reject_rate: f64,
}

impl PaperExchange {
    #[must_use]
    pub fn new(config: PaperExchangeConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: RwLock::new(State {
                balance: config.initial_balance,
                books: HashMap::new(),
                markets: HashMap::new(),
                rng,
            }),
            reject_rate: config.reject_rate,
        }
    }

    /// Seeds or replaces the order book for a token, as a test/harness hook.
    pub fn set_book(&self, token_id: impl Into<String>, bids: Vec<(Decimal, Decimal)>, asks: Vec<(Decimal, Decimal)>) {
        let token_id = token_id.into();
        let mut state = self.state.write();
        let mut book = L2OrderBook::new(token_id.clone());
        book.apply_snapshot(bids, asks);
        state.books.insert(token_id, book);
    }

    /// Registers a market so `find_markets` can resolve it, as a test/harness hook.
    pub fn set_market(&self, market: Market) {
        let mut state = self.state.write();
        state.markets.insert((market.asset.clone(), market.slot_start), market);
    }

    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.state.read().balance
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn get_book(&self, token_id: &str) -> Result<L2OrderBook, ExchangeError> {
        let state = self.state.read();
        state
            .books
            .get(token_id)
            .cloned()
            .ok_or_else(|| ExchangeError::InvalidOrder(format!("no book seeded for {token_id}")))
    }

    async fn subscribe_book(
        &self,
        _condition_ids: &[String],
        _handler: Arc<dyn BookUpdateHandler>,
    ) -> Result<(), ExchangeError> {
        // No streaming transport to simulate; callers that need push updates
        // re-poll `get_book` against a `PaperExchange` in tests.
        Ok(())
    }

    async fn place_order(&self, order: Order) -> Result<OrderOutcome, ExchangeError> {
        let mut state = self.state.write();
        let order_id = Uuid::new_v4().to_string();

        let reject_rate = self.reject_rate;
        if reject_rate > 0.0 && state.rng.gen::<f64>() < reject_rate {
            return Ok(OrderOutcome::rejected(order_id));
        }

        let book = state
            .books
            .get(&order.token_id)
            .ok_or_else(|| ExchangeError::InvalidOrder(format!("no book seeded for {}", order.token_id)))?;

        let Some(sim) = simulate_fill(book, order.side, order.size) else {
            return Ok(OrderOutcome::rejected(order_id));
        };

        let price_ok = match order.side {
            Side::Buy => sim.worst_price <= order.limit_price,
            Side::Sell => sim.worst_price >= order.limit_price,
        };
        if !sim.sufficient_depth || !price_ok {
            return Ok(OrderOutcome::rejected(order_id));
        }

        let notional = sim.vwap * sim.filled;
        match order.side {
            Side::Buy => {
                if state.balance < notional {
                    return Err(ExchangeError::Rejected("insufficient balance".into()));
                }
                state.balance -= notional;
            }
            Side::Sell => state.balance += notional,
        }

        Ok(OrderOutcome::matched(order_id, sim.filled, sim.vwap))
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<(), ExchangeError> {
        // FOK orders are never resting; nothing to cancel in the simulator.
        Ok(())
    }

    async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let state = self.state.read();
        Ok(Balance { balance: state.balance, allowance: state.balance })
    }

    async fn find_markets(&self, asset: &str, slot_ts: DateTime<Utc>) -> Result<Option<Market>, ExchangeError> {
        let state = self.state.read();
        Ok(state.markets.get(&(asset.to_string(), slot_ts)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn exchange() -> PaperExchange {
        PaperExchange::new(PaperExchangeConfig { random_seed: Some(1), ..PaperExchangeConfig::with_balance(dec!(1000)) })
    }

    #[tokio::test]
    async fn test_fok_buy_fills_when_depth_and_price_allow() {
        let ex = exchange();
        ex.set_book("yes-tok", vec![(dec!(0.47), dec!(100))], vec![(dec!(0.48), dec!(100))]);
        let outcome = ex
            .place_order(Order::buy_fok("yes-tok", dec!(0.48), dec!(20)))
            .await
            .unwrap();
        assert_eq!(outcome.status, OrderStatus::Matched);
        assert_eq!(outcome.filled_size, dec!(20));
        assert_eq!(outcome.avg_price, dec!(0.48));
    }

    #[tokio::test]
    async fn test_fok_buy_rejected_when_price_exceeds_limit() {
        let ex = exchange();
        ex.set_book("yes-tok", vec![], vec![(dec!(0.52), dec!(100))]);
        let outcome = ex
            .place_order(Order::buy_fok("yes-tok", dec!(0.48), dec!(20)))
            .await
            .unwrap();
        assert_eq!(outcome.status, OrderStatus::Rejected);
    }

    #[tokio::test]
    async fn test_fok_buy_rejected_when_depth_insufficient() {
        let ex = exchange();
        ex.set_book("yes-tok", vec![], vec![(dec!(0.48), dec!(5))]);
        let outcome = ex
            .place_order(Order::buy_fok("yes-tok", dec!(0.48), dec!(20)))
            .await
            .unwrap();
        assert_eq!(outcome.status, OrderStatus::Rejected);
    }

    #[tokio::test]
    async fn test_buy_deducts_balance_sell_credits_it() {
        let ex = exchange();
        ex.set_book("tok", vec![(dec!(0.50), dec!(100))], vec![(dec!(0.48), dec!(100))]);
        ex.place_order(Order::buy_fok("tok", dec!(0.48), dec!(20))).await.unwrap();
        assert_eq!(ex.balance(), dec!(1000) - dec!(9.6));
        ex.place_order(Order::sell_fok("tok", dec!(0.50), dec!(20))).await.unwrap();
        assert_eq!(ex.balance(), dec!(1000) - dec!(9.6) + dec!(10));
    }

    #[tokio::test]
    async fn test_get_book_unknown_token_errors() {
        let ex = exchange();
        assert!(ex.get_book("missing").await.is_err());
    }
}
