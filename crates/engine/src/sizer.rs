//! Equal-share-count order sizing with liquidity and gradual-entry
//! adjustments (spec.md §4.5).

use crate::domain::Opportunity;
use crate::risk_gate::Budget;
use arb_core::GradualEntryConfig;
use arb_exchange::{depth_at_price, L2OrderBook, Side};
use rust_decimal::Decimal;

/// Equal-share buy pair ready for the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPair {
    pub condition_id: String,
    pub yes_token_id: String,
    pub no_token_id: String,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub shares: Decimal,
}

impl OrderPair {
    #[must_use]
    pub fn total_cost(&self) -> Decimal {
        self.shares * (self.yes_price + self.no_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizerReject {
    InsufficientLiquidity,
}

pub type Sized = Result<OrderPair, SizerReject>;

pub struct Sizer {
    max_liquidity_consumption_pct: Decimal,
    min_trade_size_usd: Decimal,
    size_quantization_dp: u32,
}

impl Sizer {
    #[must_use]
    pub fn new(max_liquidity_consumption_pct: Decimal, min_trade_size_usd: Decimal, size_quantization_dp: u32) -> Self {
        Self { max_liquidity_consumption_pct, min_trade_size_usd, size_quantization_dp }
    }

    /// Computes `num_pairs = budget / (yes_ask + no_ask)`, truncated to
    /// `size_quantization_dp` places, then caps it by available depth on
    /// each side.
    #[must_use]
    pub fn size(&self, opp: &Opportunity, budget: Budget, yes_book: &L2OrderBook, no_book: &L2OrderBook) -> Sized {
        let cost_per_pair = opp.yes_ask + opp.no_ask;
        let raw_pairs = budget.0 / cost_per_pair;
        let mut num_pairs = raw_pairs.trunc_with_scale(self.size_quantization_dp);

        let yes_depth = depth_at_price(yes_book, Side::Buy, opp.yes_ask);
        let no_depth = depth_at_price(no_book, Side::Buy, opp.no_ask);
        let max_from_yes = (yes_depth * self.max_liquidity_consumption_pct).trunc_with_scale(self.size_quantization_dp);
        let max_from_no = (no_depth * self.max_liquidity_consumption_pct).trunc_with_scale(self.size_quantization_dp);
        num_pairs = num_pairs.min(max_from_yes).min(max_from_no);

        let per_leg_yes_notional = num_pairs * opp.yes_ask;
        let per_leg_no_notional = num_pairs * opp.no_ask;
        if per_leg_yes_notional < self.min_trade_size_usd || per_leg_no_notional < self.min_trade_size_usd {
            return Err(SizerReject::InsufficientLiquidity);
        }

        Ok(OrderPair {
            condition_id: opp.condition_id.clone(),
            yes_token_id: opp.yes_token_id.clone(),
            no_token_id: opp.no_token_id.clone(),
            yes_price: opp.yes_ask,
            no_price: opp.no_ask,
            shares: num_pairs,
        })
    }

    /// Splits a sized pair into `tranches` equal-share chunks for gradual entry.
    #[must_use]
    pub fn split_into_tranches(pair: &OrderPair, gradual: &GradualEntryConfig) -> Vec<OrderPair> {
        if !gradual.enabled || gradual.tranches <= 1 {
            return vec![pair.clone()];
        }
        let tranche_shares = (pair.shares / Decimal::from(gradual.tranches)).trunc_with_scale(2);
        if tranche_shares <= Decimal::ZERO {
            return vec![pair.clone()];
        }
        (0..gradual.tranches)
            .map(|_| OrderPair { shares: tranche_shares, ..pair.clone() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_exchange::L2OrderBook;
    use rust_decimal_macros::dec;

    fn opp() -> Opportunity {
        Opportunity {
            condition_id: "c1".into(),
            asset: "BTC".into(),
            yes_token_id: "y".into(),
            no_token_id: "n".into(),
            yes_ask: dec!(0.48),
            no_ask: dec!(0.49),
            detected_at: chrono::Utc::now(),
            book_revision: 1,
        }
    }

    fn book(ask: Decimal, depth: Decimal) -> L2OrderBook {
        let mut b = L2OrderBook::new("tok".into());
        b.apply_snapshot(vec![], vec![(ask, depth)]);
        b
    }

    #[test]
    fn test_happy_path_sizing_s1() {
        let sizer = Sizer::new(dec!(0.50), dec!(3), 2);
        let yes_book = book(dec!(0.48), dec!(200));
        let no_book = book(dec!(0.49), dec!(200));
        let pair = sizer.size(&opp(), Budget(dec!(20)), &yes_book, &no_book).unwrap();
        assert_eq!(pair.shares, dec!(20.61));
    }

    #[test]
    fn test_liquidity_capped_sizing_s2() {
        let sizer = Sizer::new(dec!(0.50), dec!(3), 2);
        let mut o = opp();
        o.yes_ask = dec!(0.30);
        o.no_ask = dec!(0.68);
        let yes_book = book(dec!(0.30), dec!(5));
        let no_book = book(dec!(0.68), dec!(100));
        let result = sizer.size(&o, Budget(dec!(20)), &yes_book, &no_book);
        assert_eq!(result, Err(SizerReject::InsufficientLiquidity));
    }

    #[test]
    fn test_gradual_entry_splits_into_equal_tranches() {
        let pair = OrderPair {
            condition_id: "c1".into(),
            yes_token_id: "y".into(),
            no_token_id: "n".into(),
            yes_price: dec!(0.48),
            no_price: dec!(0.49),
            shares: dec!(30),
        };
        let gradual = GradualEntryConfig { enabled: true, tranches: 3, delay: std::time::Duration::from_secs(30), min_spread_cents: dec!(3) };
        let tranches = Sizer::split_into_tranches(&pair, &gradual);
        assert_eq!(tranches.len(), 3);
        assert_eq!(tranches[0].shares, dec!(10));
    }

    #[test]
    fn test_gradual_entry_disabled_returns_single_pair() {
        let pair = OrderPair {
            condition_id: "c1".into(),
            yes_token_id: "y".into(),
            no_token_id: "n".into(),
            yes_price: dec!(0.48),
            no_price: dec!(0.49),
            shares: dec!(30),
        };
        let gradual = GradualEntryConfig::default();
        let tranches = Sizer::split_into_tranches(&pair, &gradual);
        assert_eq!(tranches.len(), 1);
    }
}
