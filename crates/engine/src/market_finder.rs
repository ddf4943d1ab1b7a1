//! Slot-aligned market enumeration (spec.md §4.1).

use crate::domain::MarketInfo;
use arb_core::EngineEvent;
use arb_exchange::Exchange;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Enumerates the currently-tradeable market for each configured asset,
/// memoizing per `(asset, slot_ts)` so a found market is never re-queried.
pub struct MarketFinder<E: Exchange> {
    exchange: Arc<E>,
    assets: Vec<String>,
    cache: HashMap<(String, DateTime<Utc>), MarketInfo>,
}

impl<E: Exchange> MarketFinder<E> {
    #[must_use]
    pub fn new(exchange: Arc<E>, assets: Vec<String>) -> Self {
        Self { exchange, assets, cache: HashMap::new() }
    }

    /// Enumerates the market for every configured asset's current slot.
    ///
    /// Fails soft: a lookup error for one asset leaves that asset's cached
    /// entry intact (if any) and is reported via `events`, rather than
    /// aborting the whole refresh.
    pub async fn refresh(&mut self, now: DateTime<Utc>, events: &dyn arb_core::EventSink) -> Vec<MarketInfo> {
        let slot_ts = MarketInfo::slot_start(now);
        let mut found = Vec::with_capacity(self.assets.len());

        for asset in self.assets.clone() {
            let key = (asset.clone(), slot_ts);
            if let Some(cached) = self.cache.get(&key) {
                found.push(cached.clone());
                continue;
            }

            match self.exchange.find_markets(&asset, slot_ts).await {
                Ok(Some(market)) => {
                    let info = MarketInfo {
                        condition_id: market.condition_id,
                        asset: market.asset,
                        slug: format!("{asset}-{}", slot_ts.timestamp()),
                        start_time: market.slot_start,
                        end_time: market.slot_end,
                        yes_token_id: market.yes_token_id,
                        no_token_id: market.no_token_id,
                    };
                    self.cache.insert(key, info.clone());
                    found.push(info);
                }
                Ok(None) => {
                    warn!(asset, "no market found for current slot");
                }
                Err(err) => {
                    warn!(asset, error = %err, "market lookup failed, keeping previous set");
                    events
                        .publish(EngineEvent::MarketFinderWarning { asset, message: err.to_string(), at: now })
                        .await;
                }
            }
        }

        self.drop_expired(now);
        found
    }

    /// Drops cache entries whose slot has already ended.
    fn drop_expired(&mut self, now: DateTime<Utc>) {
        self.cache.retain(|_, info| info.end_time > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_core::{EventSink, NullEventSink};
    use arb_exchange::{Market, PaperExchange, PaperExchangeConfig};

    fn market(asset: &str, slot_start: DateTime<Utc>) -> Market {
        Market {
            condition_id: format!("{asset}-cond"),
            asset: asset.to_string(),
            yes_token_id: format!("{asset}-yes"),
            no_token_id: format!("{asset}-no"),
            slot_start,
            slot_end: slot_start + chrono::Duration::minutes(15),
        }
    }

    #[tokio::test]
    async fn test_refresh_finds_and_caches_market() {
        let exchange = Arc::new(PaperExchange::new(PaperExchangeConfig::default()));
        let now = Utc::now();
        let slot = MarketInfo::slot_start(now);
        exchange.set_market(market("BTC", slot));

        let mut finder = MarketFinder::new(exchange, vec!["BTC".to_string()]);
        let found = finder.refresh(now, &NullEventSink).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].asset, "BTC");
    }

    #[tokio::test]
    async fn test_refresh_reports_nothing_when_market_missing() {
        let exchange = Arc::new(PaperExchange::new(PaperExchangeConfig::default()));
        let mut finder = MarketFinder::new(exchange, vec!["ETH".to_string()]);
        let found = finder.refresh(Utc::now(), &NullEventSink).await;
        assert!(found.is_empty());
    }
}
