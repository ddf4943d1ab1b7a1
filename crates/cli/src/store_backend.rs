//! A concrete stand-in for "whichever `Store` the caller wired up".
//!
//! `run.rs` picks a backend at startup based on `DATABASE_URL`, but
//! `Engine`/`recover` are generic over `S: Store` rather than taking a trait
//! object, so the two arms of that choice have to resolve to one concrete
//! type. This enum carries either backend behind a single `Store` impl that
//! just forwards to whichever variant is live.

use arb_store::{CircuitBreakerRow, InMemoryStore, PostgresStore, SettlementEntry, Store, StoreError, TradeRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub enum AnyStore {
    Memory(InMemoryStore),
    Postgres(PostgresStore),
}

#[async_trait]
impl Store for AnyStore {
    async fn save_trade(&self, record: TradeRecord) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.save_trade(record).await,
            Self::Postgres(s) => s.save_trade(record).await,
        }
    }

    async fn get_trade(&self, trade_id: uuid::Uuid) -> Result<Option<TradeRecord>, StoreError> {
        match self {
            Self::Memory(s) => s.get_trade(trade_id).await,
            Self::Postgres(s) => s.get_trade(trade_id).await,
        }
    }

    async fn enqueue_settlement(&self, entry: SettlementEntry) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.enqueue_settlement(entry).await,
            Self::Postgres(s) => s.enqueue_settlement(entry).await,
        }
    }

    async fn get_unclaimed_settlements(&self) -> Result<Vec<SettlementEntry>, StoreError> {
        match self {
            Self::Memory(s) => s.get_unclaimed_settlements().await,
            Self::Postgres(s) => s.get_unclaimed_settlements().await,
        }
    }

    async fn get_claimable(
        &self,
        now: DateTime<Utc>,
        resolution_wait: chrono::Duration,
        max_attempts: u32,
    ) -> Result<Vec<SettlementEntry>, StoreError> {
        match self {
            Self::Memory(s) => s.get_claimable(now, resolution_wait, max_attempts).await,
            Self::Postgres(s) => s.get_claimable(now, resolution_wait, max_attempts).await,
        }
    }

    async fn mark_claimed(
        &self,
        trade_id: uuid::Uuid,
        token_id: &str,
        proceeds: Decimal,
        profit: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.mark_claimed(trade_id, token_id, proceeds, profit, at).await,
            Self::Postgres(s) => s.mark_claimed(trade_id, token_id, proceeds, profit, at).await,
        }
    }

    async fn record_claim_attempt(
        &self,
        trade_id: uuid::Uuid,
        token_id: &str,
        error: String,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.record_claim_attempt(trade_id, token_id, error, next_attempt_at).await,
            Self::Postgres(s) => s.record_claim_attempt(trade_id, token_id, error, next_attempt_at).await,
        }
    }

    async fn get_open_position_trades(&self) -> Result<Vec<TradeRecord>, StoreError> {
        match self {
            Self::Memory(s) => s.get_open_position_trades().await,
            Self::Postgres(s) => s.get_open_position_trades().await,
        }
    }

    async fn save_circuit_breaker(&self, state: CircuitBreakerRow) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.save_circuit_breaker(state).await,
            Self::Postgres(s) => s.save_circuit_breaker(state).await,
        }
    }

    async fn load_circuit_breaker(&self) -> Result<Option<CircuitBreakerRow>, StoreError> {
        match self {
            Self::Memory(s) => s.load_circuit_breaker().await,
            Self::Postgres(s) => s.load_circuit_breaker().await,
        }
    }
}
