//! Claim-via-sell-back settlement with exponential backoff (spec.md §4.8).
//!
//! A resolved binary market pays its winning token out at $1.00; rather
//! than modeling payout directly, the claim is realized by selling the held
//! shares back into the book at a price near $1.00 once the market has
//! resolved. A claim attempt that fails (no buyer yet, venue error) is
//! retried with exponential backoff and jitter, up to a configured cap
//! after which the row is abandoned rather than retried forever.

use arb_core::{EngineConfig, EngineEvent, EventSink};
use arb_exchange::{Exchange, Order, OrderStatus};
use arb_store::{SettlementEntry, Store};
use rand::Rng;
use std::sync::Arc;

pub struct SettlementManager<E: Exchange, S: Store> {
    exchange: Arc<E>,
    store: Arc<S>,
}

impl<E: Exchange, S: Store> SettlementManager<E, S> {
    #[must_use]
    pub fn new(exchange: Arc<E>, store: Arc<S>) -> Self {
        Self { exchange, store }
    }

    /// Fetches every row claimable right now and attempts each independently.
    pub async fn run_once(&self, config: &EngineConfig, now: chrono::DateTime<chrono::Utc>, events: &dyn EventSink) -> usize {
        let resolution_wait = chrono::Duration::from_std(config.resolution_wait).unwrap_or_default();
        let claimable = match self.store.get_claimable(now, resolution_wait, config.max_claim_attempts).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load claimable settlements");
                return 0;
            }
        };

        let mut claimed = 0;
        for entry in claimable {
            if self.attempt_claim(&entry, config, now, events).await {
                claimed += 1;
            }
        }
        claimed
    }

    async fn attempt_claim(&self, entry: &SettlementEntry, config: &EngineConfig, now: chrono::DateTime<chrono::Utc>, events: &dyn EventSink) -> bool {
        let order = Order::sell_gtc(entry.token_id.clone(), config.claim_sell_price, entry.shares);

        let result = self.exchange.place_order(order).await;
        match result {
            Ok(outcome) if outcome.status == OrderStatus::Matched => {
                let proceeds = outcome.filled_size * outcome.avg_price;
                let profit = proceeds - entry.entry_cost;
                if let Err(err) = self.store.mark_claimed(entry.trade_id, &entry.token_id, proceeds, profit, now).await {
                    tracing::warn!(error = %err, trade_id = %entry.trade_id, "failed to persist settlement claim");
                    return false;
                }
                events
                    .publish(EngineEvent::SettlementClaimed { trade_id: entry.trade_id, token_id: entry.token_id.clone(), proceeds, profit, at: now })
                    .await;
                true
            }
            Ok(outcome) => {
                self.record_failure(entry, config, now, events, format!("order not matched: {:?}", outcome.status)).await;
                false
            }
            Err(err) => {
                self.record_failure(entry, config, now, events, err.to_string()).await;
                false
            }
        }
    }

    async fn record_failure(&self, entry: &SettlementEntry, config: &EngineConfig, now: chrono::DateTime<chrono::Utc>, events: &dyn EventSink, error: String) {
        let attempts_after = entry.claim_attempts + 1;
        let next_attempt_at = now + backoff_with_jitter(config.settlement_base_retry, config.settlement_max_retry, attempts_after);

        if let Err(err) = self.store.record_claim_attempt(entry.trade_id, &entry.token_id, error, next_attempt_at).await {
            tracing::warn!(error = %err, trade_id = %entry.trade_id, "failed to persist claim attempt");
            return;
        }

        if attempts_after >= config.max_claim_attempts {
            events
                .publish(EngineEvent::SettlementAbandoned { trade_id: entry.trade_id, token_id: entry.token_id.clone(), attempts: attempts_after, at: now })
                .await;
        } else if attempts_after >= config.alert_after_failures {
            events
                .publish(EngineEvent::SettlementDegraded { trade_id: entry.trade_id, token_id: entry.token_id.clone(), consecutive_failures: attempts_after, at: now })
                .await;
        }
    }
}

/// `min(base * 2^(attempts-1), max)` with ±25% jitter, so a thundering herd
/// of simultaneously-failing claims doesn't retry in lockstep.
fn backoff_with_jitter(base: std::time::Duration, max: std::time::Duration, attempts: u32) -> chrono::Duration {
    let exp = attempts.saturating_sub(1).min(20);
    let scaled = base.saturating_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX));
    let capped = scaled.min(max);
    let jitter_frac: f64 = rand::thread_rng().gen_range(-0.25..=0.25);
    let jittered = capped.mul_f64(1.0 + jitter_frac);
    chrono::Duration::from_std(jittered).unwrap_or_else(|_| chrono::Duration::from_std(capped).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_core::NullEventSink;
    use arb_exchange::{PaperExchange, PaperExchangeConfig};
    use arb_store::{InMemoryStore, OutcomeSide};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_backoff_grows_and_caps() {
        let base = std::time::Duration::from_secs(60);
        let max = std::time::Duration::from_secs(3600);
        let first = backoff_with_jitter(base, max, 1);
        let fifth = backoff_with_jitter(base, max, 5);
        let tenth = backoff_with_jitter(base, max, 10);
        assert!(first.num_seconds() >= 45 && first.num_seconds() <= 75);
        assert!(fifth.num_seconds() > first.num_seconds());
        assert!(tenth.num_seconds() <= 3600 * 2);
    }

    #[tokio::test]
    async fn test_successful_claim_marks_row_and_publishes_event() {
        let exchange = Arc::new(PaperExchange::new(PaperExchangeConfig::with_balance(dec!(1000))));
        let store = Arc::new(InMemoryStore::new());
        let trade_id = Uuid::new_v4();
        let end = Utc::now() - chrono::Duration::minutes(20);
        let entry = SettlementEntry::new(trade_id, "yes-tok", OutcomeSide::Yes, dec!(20), dec!(0.48), end);
        store.enqueue_settlement(entry).await.unwrap();
        exchange.set_book("yes-tok", vec![(dec!(0.99), dec!(100))], vec![]);

        let manager = SettlementManager::new(exchange, store.clone());
        let config = EngineConfig::default();
        let claimed = manager.run_once(&config, Utc::now(), &NullEventSink).await;

        assert_eq!(claimed, 1);
        let remaining = store.get_unclaimed_settlements().await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_failed_claim_schedules_retry_with_backoff() {
        let exchange = Arc::new(PaperExchange::new(PaperExchangeConfig::default()));
        let store = Arc::new(InMemoryStore::new());
        let trade_id = Uuid::new_v4();
        let end = Utc::now() - chrono::Duration::minutes(20);
        let entry = SettlementEntry::new(trade_id, "yes-tok", OutcomeSide::Yes, dec!(20), dec!(0.48), end);
        store.enqueue_settlement(entry).await.unwrap();
        // No book seeded: the claim sell errors out.

        let manager = SettlementManager::new(exchange, store.clone());
        let config = EngineConfig::default();
        let claimed = manager.run_once(&config, Utc::now(), &NullEventSink).await;

        assert_eq!(claimed, 0);
        let remaining = store.get_unclaimed_settlements().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].claim_attempts, 1);
        assert!(remaining[0].next_attempt_at.is_some());
    }
}
