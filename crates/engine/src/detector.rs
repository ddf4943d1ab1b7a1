//! Spread detection on book updates (spec.md §4.3).

use crate::domain::{MarketState, Opportunity};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Stateless across markets except for a per-`condition_id` last-emitted
/// book revision, used to cap emission to once per `(condition_id, revision)`.
pub struct OpportunityDetector {
    min_spread: Decimal,
    last_emitted_revision: HashMap<String, u64>,
}

impl OpportunityDetector {
    #[must_use]
    pub fn new(min_spread: Decimal) -> Self {
        Self { min_spread, last_emitted_revision: HashMap::new() }
    }

    /// Evaluates one market's current state at the given book revision.
    ///
    /// Returns `None` if the market is stale, either side lacks an ask, the
    /// spread is below `min_spread`, or this revision was already emitted.
    pub fn evaluate(&mut self, state: &MarketState, revision: u64, is_stale: bool) -> Option<Opportunity> {
        if is_stale {
            return None;
        }
        if self.last_emitted_revision.get(&state.market.condition_id) == Some(&revision) {
            return None;
        }

        let yes_ask = state.yes_ask()?;
        let no_ask = state.no_ask()?;
        let spread = Decimal::ONE - yes_ask - no_ask;
        if spread < self.min_spread {
            return None;
        }

        self.last_emitted_revision.insert(state.market.condition_id.clone(), revision);

        Some(Opportunity {
            condition_id: state.market.condition_id.clone(),
            asset: state.market.asset.clone(),
            yes_token_id: state.market.yes_token_id.clone(),
            no_token_id: state.market.no_token_id.clone(),
            yes_ask,
            no_ask,
            detected_at: state.last_update,
            book_revision: revision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_exchange::L2OrderBook;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn state(yes_ask: Decimal, no_ask: Decimal) -> MarketState {
        let mut yes_book = L2OrderBook::new("yes".into());
        yes_book.apply_snapshot(vec![], vec![(yes_ask, dec!(100))]);
        let mut no_book = L2OrderBook::new("no".into());
        no_book.apply_snapshot(vec![], vec![(no_ask, dec!(100))]);
        MarketState {
            market: crate::domain::MarketInfo {
                condition_id: "c1".into(),
                asset: "BTC".into(),
                slug: "btc-1".into(),
                start_time: Utc::now(),
                end_time: Utc::now() + chrono::Duration::minutes(15),
                yes_token_id: "yes".into(),
                no_token_id: "no".into(),
            },
            yes_book,
            no_book,
            last_update: Utc::now(),
        }
    }

    #[test]
    fn test_spread_at_exactly_min_is_accepted() {
        let mut d = OpportunityDetector::new(dec!(0.02));
        let opp = d.evaluate(&state(dec!(0.48), dec!(0.50)), 1, false);
        assert!(opp.is_some());
        assert_eq!(opp.unwrap().spread(), dec!(0.02));
    }

    #[test]
    fn test_spread_just_below_min_is_rejected() {
        let mut d = OpportunityDetector::new(dec!(0.02));
        let opp = d.evaluate(&state(dec!(0.4801), dec!(0.50)), 1, false);
        assert!(opp.is_none());
    }

    #[test]
    fn test_stale_market_suppressed() {
        let mut d = OpportunityDetector::new(dec!(0.02));
        assert!(d.evaluate(&state(dec!(0.48), dec!(0.48)), 1, true).is_none());
    }

    #[test]
    fn test_same_revision_not_emitted_twice() {
        let mut d = OpportunityDetector::new(dec!(0.02));
        assert!(d.evaluate(&state(dec!(0.48), dec!(0.48)), 1, false).is_some());
        assert!(d.evaluate(&state(dec!(0.48), dec!(0.48)), 1, false).is_none());
        assert!(d.evaluate(&state(dec!(0.48), dec!(0.48)), 2, false).is_some());
    }
}
