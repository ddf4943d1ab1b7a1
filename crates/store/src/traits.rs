use crate::error::StoreError;
use crate::models::{CircuitBreakerRow, SettlementEntry, TradeRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable persistence consumed by the trading core (spec.md §6.2).
///
/// The core never touches the storage engine directly; every mutation and
/// recovery-time query goes through this trait so that `arb-engine` can be
/// exercised against an in-memory double in tests and a Postgres-backed
/// implementation in production.
#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent on `trade_id`: re-saving the same id overwrites in place.
    async fn save_trade(&self, record: TradeRecord) -> Result<(), StoreError>;

    /// Fetches a previously saved trade, if any.
    async fn get_trade(&self, trade_id: uuid::Uuid) -> Result<Option<TradeRecord>, StoreError>;

    /// Unique on `(trade_id, token_id)`.
    async fn enqueue_settlement(&self, entry: SettlementEntry) -> Result<(), StoreError>;

    /// All settlement rows that have not yet been claimed, for recovery.
    async fn get_unclaimed_settlements(&self) -> Result<Vec<SettlementEntry>, StoreError>;

    /// Rows eligible for a claim attempt right now.
    async fn get_claimable(
        &self,
        now: DateTime<Utc>,
        resolution_wait: chrono::Duration,
        max_attempts: u32,
    ) -> Result<Vec<SettlementEntry>, StoreError>;

    /// Marks a row claimed and records the realized proceeds/profit.
    async fn mark_claimed(
        &self,
        trade_id: uuid::Uuid,
        token_id: &str,
        proceeds: rust_decimal::Decimal,
        profit: rust_decimal::Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Records a failed claim attempt and schedules the next retry.
    async fn record_claim_attempt(
        &self,
        trade_id: uuid::Uuid,
        token_id: &str,
        error: String,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Trades that still have at least one unclaimed settlement row and
    /// have not been abandoned — the recovery loader's definition of an
    /// "open position" (spec.md §4.11).
    async fn get_open_position_trades(&self) -> Result<Vec<TradeRecord>, StoreError>;

    async fn save_circuit_breaker(&self, state: CircuitBreakerRow) -> Result<(), StoreError>;

    async fn load_circuit_breaker(&self) -> Result<Option<CircuitBreakerRow>, StoreError>;
}
