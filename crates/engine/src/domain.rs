//! In-memory domain types shared across engine components: markets, book
//! state, detected opportunities, and tracked positions (spec.md §3).

use arb_exchange::L2OrderBook;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A 15-minute slot-aligned binary market. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketInfo {
    pub condition_id: String,
    pub asset: String,
    pub slug: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub yes_token_id: String,
    pub no_token_id: String,
}

impl MarketInfo {
    /// `⌊now_epoch / 900⌋ × 900` — the 15-minute slot boundary containing `now`.
    #[must_use]
    pub fn slot_start(now: DateTime<Utc>) -> DateTime<Utc> {
        let epoch = now.timestamp();
        let slot = (epoch / 900) * 900;
        DateTime::from_timestamp(slot, 0).unwrap_or(now)
    }
}

/// Latest known book state for one market's two outcome tokens.
#[derive(Debug, Clone)]
pub struct MarketState {
    pub market: MarketInfo,
    pub yes_book: L2OrderBook,
    pub no_book: L2OrderBook,
    pub last_update: DateTime<Utc>,
}

impl MarketState {
    #[must_use]
    pub fn yes_ask(&self) -> Option<Decimal> {
        self.yes_book.best_ask()
    }

    #[must_use]
    pub fn no_ask(&self) -> Option<Decimal> {
        self.no_book.best_ask()
    }

    /// `1 − yes_ask − no_ask`, or `None` if either side has no ask.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(Decimal::ONE - self.yes_ask()? - self.no_ask()?)
    }

    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, stale_threshold: chrono::Duration) -> bool {
        now - self.last_update > stale_threshold
    }
}

/// A detected spread crossing, emitted by the `OpportunityDetector`. Never persisted.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub condition_id: String,
    pub asset: String,
    pub yes_token_id: String,
    pub no_token_id: String,
    pub yes_ask: Decimal,
    pub no_ask: Decimal,
    pub detected_at: DateTime<Utc>,
    pub book_revision: u64,
}

impl Opportunity {
    #[must_use]
    pub fn spread(&self) -> Decimal {
        Decimal::ONE - self.yes_ask - self.no_ask
    }

    #[must_use]
    pub fn spread_cents(&self) -> Decimal {
        self.spread() * Decimal::ONE_HUNDRED
    }

    #[must_use]
    pub fn is_valid_arbitrage(&self) -> bool {
        self.yes_ask + self.no_ask < Decimal::ONE
    }
}

/// An open YES/NO position pair tracked by `PositionManager` (spec.md §3).
#[derive(Debug, Clone)]
pub struct Position {
    pub trade_id: uuid::Uuid,
    pub condition_id: String,
    pub asset: String,
    pub yes_token_id: String,
    pub no_token_id: String,
    pub yes_shares: Decimal,
    pub no_shares: Decimal,
    pub yes_avg_cost: Decimal,
    pub no_avg_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub market_end_time: DateTime<Utc>,
    pub rebalance_attempts: u32,
}

impl Position {
    #[must_use]
    pub fn hedge_ratio(&self) -> Decimal {
        arb_store::TradeRecord::compute_hedge_ratio(self.yes_shares, self.no_shares)
    }

    #[must_use]
    pub fn is_balanced(&self, threshold: Decimal) -> bool {
        self.hedge_ratio() >= threshold
    }

    #[must_use]
    pub fn imbalance(&self) -> Decimal {
        self.yes_shares - self.no_shares
    }
}

/// Per-market cumulative USD deployed in the current window (spec.md §3).
#[derive(Debug, Default)]
pub struct WindowLedger {
    used: HashMap<String, Decimal>,
}

impl WindowLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn used(&self, condition_id: &str) -> Decimal {
        self.used.get(condition_id).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn record(&mut self, condition_id: &str, cost: Decimal) {
        *self.used.entry(condition_id.to_string()).or_insert(Decimal::ZERO) += cost;
    }

    /// Drops the ledger for a market once its window has fully resolved.
    pub fn clear(&mut self, condition_id: &str) {
        self.used.remove(condition_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_slot_start_truncates_to_15_minutes() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T10:07:32Z").unwrap().with_timezone(&Utc);
        let slot = MarketInfo::slot_start(now);
        assert_eq!(slot.format("%H:%M:%S").to_string(), "10:00:00");
    }

    #[test]
    fn test_opportunity_spread_and_validity() {
        let opp = Opportunity {
            condition_id: "c1".into(),
            asset: "BTC".into(),
            yes_token_id: "y".into(),
            no_token_id: "n".into(),
            yes_ask: dec!(0.48),
            no_ask: dec!(0.49),
            detected_at: Utc::now(),
            book_revision: 1,
        };
        assert_eq!(opp.spread(), dec!(0.03));
        assert_eq!(opp.spread_cents(), dec!(3.00));
        assert!(opp.is_valid_arbitrage());
    }

    #[test]
    fn test_opportunity_invalid_when_sum_at_or_above_one() {
        let opp = Opportunity {
            condition_id: "c1".into(),
            asset: "BTC".into(),
            yes_token_id: "y".into(),
            no_token_id: "n".into(),
            yes_ask: dec!(0.52),
            no_ask: dec!(0.50),
            detected_at: Utc::now(),
            book_revision: 1,
        };
        assert!(!opp.is_valid_arbitrage());
    }

    #[test]
    fn test_position_balanced_at_exact_threshold() {
        let pos = Position {
            trade_id: uuid::Uuid::new_v4(),
            condition_id: "c1".into(),
            asset: "BTC".into(),
            yes_token_id: "yes-tok".into(),
            no_token_id: "no-tok".into(),
            yes_shares: dec!(100),
            no_shares: dec!(80),
            yes_avg_cost: dec!(0.48),
            no_avg_cost: dec!(0.49),
            created_at: Utc::now(),
            market_end_time: Utc::now(),
            rebalance_attempts: 0,
        };
        assert_eq!(pos.hedge_ratio(), dec!(0.8));
        assert!(pos.is_balanced(dec!(0.8)));
        assert!(!pos.is_balanced(dec!(0.81)));
    }

    #[test]
    fn test_window_ledger_accumulates_and_clears() {
        let mut ledger = WindowLedger::new();
        ledger.record("c1", dec!(20));
        ledger.record("c1", dec!(5));
        assert_eq!(ledger.used("c1"), dec!(25));
        ledger.clear("c1");
        assert_eq!(ledger.used("c1"), Decimal::ZERO);
    }
}
