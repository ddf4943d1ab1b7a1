//! Order book and order primitives shared by every `Exchange` implementation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// L2 order book with incremental update support.
///
/// Bids are sorted descending, asks ascending, so `best_bid`/`best_ask` are
/// both O(log n) `BTreeMap` front lookups.
#[derive(Debug, Clone)]
pub struct L2OrderBook {
    pub token_id: String,
    pub bids: BTreeMap<Reverse<Decimal>, Decimal>,
    pub asks: BTreeMap<Decimal, Decimal>,
    pub last_update_ms: Option<i64>,
}

impl L2OrderBook {
    #[must_use]
    pub fn new(token_id: String) -> Self {
        Self {
            token_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_ms: None,
        }
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next().map(|r| r.0)
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Replaces all existing levels. Zero-or-negative sizes are dropped.
    pub fn apply_snapshot(&mut self, bids: Vec<(Decimal, Decimal)>, asks: Vec<(Decimal, Decimal)>) {
        self.bids.clear();
        self.asks.clear();
        for (price, size) in bids {
            if size > Decimal::ZERO {
                self.bids.insert(Reverse(price), size);
            }
        }
        for (price, size) in asks {
            if size > Decimal::ZERO {
                self.asks.insert(price, size);
            }
        }
    }

    #[must_use]
    pub fn total_bid_depth(&self) -> Decimal {
        self.bids.values().copied().sum()
    }

    #[must_use]
    pub fn total_ask_depth(&self) -> Decimal {
        self.asks.values().copied().sum()
    }

    #[must_use]
    pub fn has_liquidity(&self) -> bool {
        !self.bids.is_empty() || !self.asks.is_empty()
    }
}

impl Default for L2OrderBook {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Result of walking price levels for a target fill size.
#[derive(Debug, Clone)]
pub struct FillSimulation {
    pub filled: Decimal,
    pub total_cost: Decimal,
    pub vwap: Decimal,
    pub worst_price: Decimal,
    pub best_price: Decimal,
    pub sufficient_depth: bool,
}

/// Which side of the book an order or fill takes liquidity from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Time-in-force for an order submission.
///
/// Only `Fok` and `Gtc` are issued by the trading core (spec.md §4.6 forbids
/// the fire-and-forget FAK unwind pattern); `Fak` remains for exchanges whose
/// wire protocol requires it for a resting cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Fok,
    Fak,
    Gtc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> L2OrderBook {
        let mut b = L2OrderBook::new("test-token".to_string());
        b.apply_snapshot(
            vec![(dec!(0.48), dec!(100)), (dec!(0.47), dec!(200))],
            vec![(dec!(0.50), dec!(150)), (dec!(0.51), dec!(250))],
        );
        b
    }

    #[test]
    fn test_best_bid_and_ask() {
        let b = book();
        assert_eq!(b.best_bid(), Some(dec!(0.48)));
        assert_eq!(b.best_ask(), Some(dec!(0.50)));
    }

    #[test]
    fn test_spread_and_mid_price() {
        let b = book();
        assert_eq!(b.spread(), Some(dec!(0.02)));
        assert_eq!(b.mid_price(), Some(dec!(0.49)));
    }

    #[test]
    fn test_spread_none_when_one_sided() {
        let mut b = L2OrderBook::new("one-sided".to_string());
        b.apply_snapshot(vec![(dec!(0.48), dec!(100))], vec![]);
        assert!(b.spread().is_none());
        assert!(b.mid_price().is_none());
    }

    #[test]
    fn test_apply_snapshot_filters_non_positive_size() {
        let mut b = L2OrderBook::new("t".to_string());
        b.apply_snapshot(
            vec![(dec!(0.48), Decimal::ZERO), (dec!(0.47), dec!(100))],
            vec![(dec!(0.52), dec!(100)), (dec!(0.53), dec!(-5))],
        );
        assert_eq!(b.bids.len(), 1);
        assert_eq!(b.asks.len(), 1);
    }

    #[test]
    fn test_has_liquidity() {
        assert!(book().has_liquidity());
        assert!(!L2OrderBook::default().has_liquidity());
    }
}
