//! Broadcast-backed `EventSink` fan-out (spec.md §4.10).
//!
//! Publishing never blocks and never fails loudly: a full or subscriber-less
//! channel just drops the event, matching the contract that trading
//! correctness must never depend on a consumer keeping up.

use arb_core::{EngineEvent, EventSink};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Fans every published event out to any number of subscribers (metrics,
/// logging sinks, a dashboard websocket) via a bounded broadcast channel.
pub struct BroadcastEventSink {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastEventSink {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn publish(&self, event: EngineEvent) {
        // `send` only errors when there are no receivers; that's a normal
        // startup/shutdown state, not a failure worth logging per-event.
        let _ = self.tx.send(event);
    }
}

/// Logs every event at `info` via `tracing`, for a plain-stdout deployment
/// with no downstream subscriber.
pub struct LoggingEventSink;

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn publish(&self, event: EngineEvent) {
        tracing::info!(?event, "engine event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscriber() {
        let sink = BroadcastEventSink::new(16);
        let mut rx = sink.subscribe();
        sink.publish(EngineEvent::WebsocketReconnected { subscriptions: 1, at: Utc::now() }).await;
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, EngineEvent::WebsocketReconnected { .. }));
    }

    #[tokio::test]
    async fn test_publish_with_no_subscribers_does_not_panic() {
        let sink = BroadcastEventSink::new(16);
        sink.publish(EngineEvent::WebsocketReconnected { subscriptions: 0, at: Utc::now() }).await;
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest_without_blocking_publisher() {
        let sink = BroadcastEventSink::new(2);
        let mut rx = sink.subscribe();
        for i in 0..5 {
            sink.publish(EngineEvent::MarketStale { condition_id: "c1".into(), age_ms: i, at: Utc::now() }).await;
        }
        // Channel capacity 2: the receiver lags and must resync, but the
        // publisher above never blocked or errored.
        let result = rx.recv().await;
        assert!(result.is_ok() || matches!(result, Err(tokio::sync::broadcast::error::RecvError::Lagged(_))));
    }
}
