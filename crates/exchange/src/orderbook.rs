//! Order book walking for fill simulation — used by `PaperExchange` and by
//! the engine's pre-admission depth checks.

use rust_decimal::Decimal;

use crate::types::{FillSimulation, L2OrderBook, Side};

/// Walks price levels to estimate the cost of filling `target_size`.
///
/// Buys walk the asks ascending; sells walk the bids descending.
/// Returns `None` for a non-positive size or an empty book on that side.
#[must_use]
pub fn simulate_fill(book: &L2OrderBook, side: Side, target_size: Decimal) -> Option<FillSimulation> {
    if target_size <= Decimal::ZERO {
        return None;
    }

    let levels: Vec<(Decimal, Decimal)> = match side {
        Side::Buy => book.asks.iter().map(|(p, s)| (*p, *s)).collect(),
        Side::Sell => book.bids.iter().map(|(r, s)| (r.0, *s)).collect(),
    };
    if levels.is_empty() {
        return None;
    }

    let mut filled = Decimal::ZERO;
    let mut total_cost = Decimal::ZERO;
    let mut worst_price = Decimal::ZERO;
    let best_price = levels.first().map(|(p, _)| *p)?;

    for (price, size) in &levels {
        if filled >= target_size {
            break;
        }
        let take = (*size).min(target_size - filled);
        total_cost += take * price;
        filled += take;
        worst_price = *price;
    }

    let sufficient_depth = filled >= target_size;
    let vwap = if filled > Decimal::ZERO { total_cost / filled } else { Decimal::ZERO };

    Some(FillSimulation { filled, total_cost, vwap, worst_price, best_price, sufficient_depth })
}

/// Total size available at or better than `price_limit`.
#[must_use]
pub fn depth_at_price(book: &L2OrderBook, side: Side, price_limit: Decimal) -> Decimal {
    match side {
        Side::Buy => book.asks.iter().filter(|(p, _)| **p <= price_limit).map(|(_, s)| *s).sum(),
        Side::Sell => book.bids.iter().filter(|(r, _)| r.0 >= price_limit).map(|(_, s)| *s).sum(),
    }
}

/// Difference between worst and best fill price for `size`, or `None` if depth is insufficient.
#[must_use]
pub fn price_impact(book: &L2OrderBook, side: Side, size: Decimal) -> Option<Decimal> {
    let fill = simulate_fill(book, side, size)?;
    fill.sufficient_depth.then(|| (fill.worst_price - fill.best_price).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> L2OrderBook {
        let mut b = L2OrderBook::new("test-token".to_string());
        b.apply_snapshot(
            vec![(dec!(0.48), dec!(100)), (dec!(0.47), dec!(200)), (dec!(0.46), dec!(300))],
            vec![(dec!(0.50), dec!(100)), (dec!(0.51), dec!(200)), (dec!(0.52), dec!(300))],
        );
        b
    }

    #[test]
    fn test_simulate_fill_buy_single_level() {
        let fill = simulate_fill(&book(), Side::Buy, dec!(50)).unwrap();
        assert_eq!(fill.filled, dec!(50));
        assert_eq!(fill.total_cost, dec!(25));
        assert_eq!(fill.vwap, dec!(0.50));
        assert!(fill.sufficient_depth);
    }

    #[test]
    fn test_simulate_fill_buy_walks_multiple_levels() {
        let fill = simulate_fill(&book(), Side::Buy, dec!(150)).unwrap();
        assert_eq!(fill.filled, dec!(150));
        assert_eq!(fill.total_cost, dec!(75.5));
        assert_eq!(fill.worst_price, dec!(0.51));
    }

    #[test]
    fn test_simulate_fill_insufficient_depth() {
        let fill = simulate_fill(&book(), Side::Buy, dec!(700)).unwrap();
        assert_eq!(fill.filled, dec!(600));
        assert!(!fill.sufficient_depth);
    }

    #[test]
    fn test_simulate_fill_sell_walks_bids_descending() {
        let fill = simulate_fill(&book(), Side::Sell, dec!(200)).unwrap();
        assert_eq!(fill.total_cost, dec!(95));
        assert_eq!(fill.worst_price, dec!(0.47));
    }

    #[test]
    fn test_simulate_fill_rejects_non_positive_size() {
        assert!(simulate_fill(&book(), Side::Buy, Decimal::ZERO).is_none());
        assert!(simulate_fill(&book(), Side::Buy, dec!(-10)).is_none());
    }

    #[test]
    fn test_depth_at_price() {
        let b = book();
        assert_eq!(depth_at_price(&b, Side::Buy, dec!(0.50)), dec!(100));
        assert_eq!(depth_at_price(&b, Side::Buy, dec!(0.51)), dec!(300));
        assert_eq!(depth_at_price(&b, Side::Sell, dec!(0.48)), dec!(100));
    }

    #[test]
    fn test_price_impact() {
        let b = book();
        assert_eq!(price_impact(&b, Side::Buy, dec!(50)), Some(Decimal::ZERO));
        assert_eq!(price_impact(&b, Side::Buy, dec!(150)), Some(dec!(0.01)));
        assert!(price_impact(&b, Side::Buy, dec!(10_000)).is_none());
    }
}
