//! Maintains per-market book state from the streaming feed and flags
//! staleness (spec.md §4.2).

use crate::domain::{MarketInfo, MarketState};
use arb_core::{EngineEvent, EventSink};
use arb_exchange::{BookUpdate, BookUpdateHandler, Exchange, L2OrderBook};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Owns the live `MarketState` table. Reads take a per-call read lock;
/// writes (from the subscription handler) replace a market's book slices
/// atomically.
pub struct BookTracker {
    states: Arc<RwLock<HashMap<String, MarketState>>>,
    revisions: Arc<RwLock<HashMap<String, u64>>>,
    updates_tx: mpsc::Sender<String>,
}

impl BookTracker {
    /// Returns the tracker plus a receiver that yields a `condition_id` each
    /// time its book changes, for the opportunity-processing loop to consume.
    #[must_use]
    pub fn new(channel_capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(channel_capacity);
        (
            Self {
                states: Arc::new(RwLock::new(HashMap::new())),
                revisions: Arc::new(RwLock::new(HashMap::new())),
                updates_tx: tx,
            },
            rx,
        )
    }

    /// Seeds tracking for a market with an empty book, ready to receive updates.
    pub fn track(&self, market: MarketInfo) {
        let mut states = self.states.write();
        states.entry(market.condition_id.clone()).or_insert_with(|| MarketState {
            yes_book: L2OrderBook::new(market.yes_token_id.clone()),
            no_book: L2OrderBook::new(market.no_token_id.clone()),
            last_update: Utc::now(),
            market,
        });
    }

    #[must_use]
    pub fn state(&self, condition_id: &str) -> Option<MarketState> {
        self.states.read().get(condition_id).cloned()
    }

    #[must_use]
    pub fn revision(&self, condition_id: &str) -> u64 {
        self.revisions.read().get(condition_id).copied().unwrap_or(0)
    }

    /// Subscribes the tracker's handler to every currently-tracked market via
    /// the exchange. Call again after a reconnect to restore subscriptions.
    pub async fn subscribe_all<E: Exchange + 'static>(&self, exchange: &E) -> Result<(), arb_exchange::ExchangeError> {
        let ids: Vec<String> = self.states.read().keys().cloned().collect();
        if ids.is_empty() {
            return Ok(());
        }
        let handler: Arc<dyn BookUpdateHandler> = Arc::new(TrackerHandler {
            states: self.states.clone(),
            revisions: self.revisions.clone(),
            updates_tx: self.updates_tx.clone(),
        });
        exchange.subscribe_book(&ids, handler).await
    }

    /// Scans for markets silent longer than `stale_threshold` and emits `MarketStale`.
    pub async fn check_staleness(&self, now: DateTime<Utc>, stale_threshold: chrono::Duration, events: &dyn EventSink) {
        let stale: Vec<(String, i64)> = self
            .states
            .read()
            .values()
            .filter(|s| s.is_stale(now, stale_threshold))
            .map(|s| (s.market.condition_id.clone(), (now - s.last_update).num_milliseconds()))
            .collect();
        for (condition_id, age_ms) in stale {
            events.publish(EngineEvent::MarketStale { condition_id, age_ms, at: now }).await;
        }
    }
}

struct TrackerHandler {
    states: Arc<RwLock<HashMap<String, MarketState>>>,
    revisions: Arc<RwLock<HashMap<String, u64>>>,
    updates_tx: mpsc::Sender<String>,
}

#[async_trait]
impl BookUpdateHandler for TrackerHandler {
    async fn on_update(&self, update: BookUpdate) {
        let condition_id = update.condition_id.clone();
        {
            let mut states = self.states.write();
            let Some(state) = states.get_mut(&condition_id) else { return };
            if update.token_id == state.market.yes_token_id {
                state.yes_book.apply_snapshot(update.bids, update.asks);
            } else if update.token_id == state.market.no_token_id {
                state.no_book.apply_snapshot(update.bids, update.asks);
            } else {
                return;
            }
            state.last_update = update.ts;
        }
        {
            let mut revisions = self.revisions.write();
            *revisions.entry(condition_id.clone()).or_insert(0) += 1;
        }
        // Drop-on-full: a saturated opportunity loop should not backpressure the feed.
        let _ = self.updates_tx.try_send(condition_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market() -> MarketInfo {
        MarketInfo {
            condition_id: "c1".into(),
            asset: "BTC".into(),
            slug: "btc-1".into(),
            start_time: Utc::now(),
            end_time: Utc::now() + chrono::Duration::minutes(15),
            yes_token_id: "yes-1".into(),
            no_token_id: "no-1".into(),
        }
    }

    #[tokio::test]
    async fn test_track_then_update_applies_to_correct_side() {
        let (tracker, _rx) = BookTracker::new(16);
        tracker.track(market());
        let handler = TrackerHandler {
            states: tracker.states.clone(),
            revisions: tracker.revisions.clone(),
            updates_tx: tracker.updates_tx.clone(),
        };
        handler
            .on_update(BookUpdate {
                condition_id: "c1".into(),
                token_id: "yes-1".into(),
                bids: vec![(dec!(0.47), dec!(100))],
                asks: vec![(dec!(0.48), dec!(100))],
                ts: Utc::now(),
            })
            .await;
        let state = tracker.state("c1").unwrap();
        assert_eq!(state.yes_ask(), Some(dec!(0.48)));
        assert_eq!(tracker.revision("c1"), 1);
    }

    #[tokio::test]
    async fn test_check_staleness_emits_event_past_threshold() {
        struct Counter(std::sync::atomic::AtomicUsize);
        #[async_trait]
        impl EventSink for Counter {
            async fn publish(&self, _event: EngineEvent) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let (tracker, _rx) = BookTracker::new(16);
        let mut m = market();
        m.condition_id = "stale-1".into();
        tracker.track(m);

        let sink = Counter(std::sync::atomic::AtomicUsize::new(0));
        let now = Utc::now() + chrono::Duration::seconds(20);
        tracker.check_staleness(now, chrono::Duration::seconds(10), &sink).await;
        assert_eq!(sink.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
