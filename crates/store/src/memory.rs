//! In-process `Store` double, used by engine tests and the paper-trading CLI
//! path where a Postgres instance is not available.

use crate::error::StoreError;
use crate::models::{CircuitBreakerRow, SettlementEntry, TradeRecord};
use crate::traits::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    trades: HashMap<Uuid, TradeRecord>,
    settlements: HashMap<(Uuid, String), SettlementEntry>,
    circuit_breaker: Option<CircuitBreakerRow>,
}

/// A `Mutex`-guarded in-memory `Store`. Single-process only; never durable
/// across restarts, which is the point — tests exercise recovery logic
/// against a `PostgresStore` fixture instead.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_trade(&self, record: TradeRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.trades.insert(record.trade_id, record);
        Ok(())
    }

    async fn get_trade(&self, trade_id: Uuid) -> Result<Option<TradeRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.trades.get(&trade_id).cloned())
    }

    async fn enqueue_settlement(&self, entry: SettlementEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (entry.trade_id, entry.token_id.clone());
        if inner.settlements.contains_key(&key) {
            return Ok(());
        }
        inner.settlements.insert(key, entry);
        Ok(())
    }

    async fn get_unclaimed_settlements(&self) -> Result<Vec<SettlementEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .settlements
            .values()
            .filter(|e| !e.claimed)
            .cloned()
            .collect())
    }

    async fn get_claimable(
        &self,
        now: DateTime<Utc>,
        resolution_wait: chrono::Duration,
        max_attempts: u32,
    ) -> Result<Vec<SettlementEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .settlements
            .values()
            .filter(|e| e.is_claimable(now, resolution_wait, max_attempts))
            .cloned()
            .collect())
    }

    async fn mark_claimed(
        &self,
        trade_id: Uuid,
        token_id: &str,
        proceeds: Decimal,
        profit: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (trade_id, token_id.to_string());
        let entry = inner
            .settlements
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("{trade_id}/{token_id}")))?;
        entry.claimed = true;
        entry.claimed_at = Some(at);
        entry.claim_proceeds = Some(proceeds);
        entry.claim_profit = Some(profit);
        Ok(())
    }

    async fn record_claim_attempt(
        &self,
        trade_id: Uuid,
        token_id: &str,
        error: String,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (trade_id, token_id.to_string());
        let entry = inner
            .settlements
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("{trade_id}/{token_id}")))?;
        entry.claim_attempts += 1;
        entry.last_error = Some(error);
        entry.next_attempt_at = Some(next_attempt_at);
        Ok(())
    }

    async fn get_open_position_trades(&self) -> Result<Vec<TradeRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let open_ids: std::collections::HashSet<Uuid> = inner
            .settlements
            .values()
            .filter(|e| !e.claimed)
            .map(|e| e.trade_id)
            .collect();
        Ok(inner
            .trades
            .values()
            .filter(|t| open_ids.contains(&t.trade_id))
            .cloned()
            .collect())
    }

    async fn save_circuit_breaker(&self, state: CircuitBreakerRow) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.circuit_breaker = Some(state);
        Ok(())
    }

    async fn load_circuit_breaker(&self) -> Result<Option<CircuitBreakerRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.circuit_breaker)
    }
}
