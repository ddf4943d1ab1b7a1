use crate::events::EngineEvent;
use async_trait::async_trait;

/// Fire-and-forget publisher of domain events (spec.md §4.10).
///
/// Implementations must never block the caller and must never let a
/// missing/slow consumer affect trading correctness. The production
/// implementation lives in `arb-engine` (a bounded `broadcast` channel);
/// `NullEventSink` below is the test/no-op double.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: EngineEvent);
}

/// Discards every event. Used in unit tests that don't care about
/// observability output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn publish(&self, _event: EngineEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_null_sink_accepts_any_event() {
        let sink = NullEventSink;
        sink.publish(EngineEvent::WebsocketReconnected {
            subscriptions: 3,
            at: Utc::now(),
        })
        .await;
    }
}
