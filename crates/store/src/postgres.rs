//! Postgres-backed `Store` implementation.
//!
//! Expects `trades`, `settlement_queue`, and `circuit_breaker_state` tables
//! matching the shapes in `crate::models`; schema management is left to the
//! operator's migration tooling, as in the rest of this corpus.

use crate::error::StoreError;
use crate::models::{
    CircuitBreakerRow, CircuitLevelCode, ExecutionStatus, LegOrderStatus, OutcomeSide,
    SettlementEntry, TradeRecord,
};
use crate::traits::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects to Postgres with a bounded pool.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn save_trade(&self, r: TradeRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO trades (
                trade_id, created_at, condition_id, asset, yes_token_id, no_token_id,
                intended_yes_shares, intended_no_shares, actual_yes_shares, actual_no_shares,
                intended_cost, actual_cost, yes_limit_price, no_limit_price,
                execution_status, yes_order_status, no_order_status, hedge_ratio,
                yes_depth_pre, no_depth_pre, dry_run
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)
            ON CONFLICT (trade_id) DO UPDATE SET
                actual_yes_shares = EXCLUDED.actual_yes_shares,
                actual_no_shares = EXCLUDED.actual_no_shares,
                actual_cost = EXCLUDED.actual_cost,
                execution_status = EXCLUDED.execution_status,
                yes_order_status = EXCLUDED.yes_order_status,
                no_order_status = EXCLUDED.no_order_status,
                hedge_ratio = EXCLUDED.hedge_ratio
            ",
        )
        .bind(r.trade_id)
        .bind(r.created_at)
        .bind(&r.condition_id)
        .bind(&r.asset)
        .bind(&r.yes_token_id)
        .bind(&r.no_token_id)
        .bind(r.intended_yes_shares)
        .bind(r.intended_no_shares)
        .bind(r.actual_yes_shares)
        .bind(r.actual_no_shares)
        .bind(r.intended_cost)
        .bind(r.actual_cost)
        .bind(r.yes_limit_price)
        .bind(r.no_limit_price)
        .bind(r.execution_status)
        .bind(r.yes_order_status)
        .bind(r.no_order_status)
        .bind(r.hedge_ratio)
        .bind(r.yes_depth_pre)
        .bind(r.no_depth_pre)
        .bind(r.dry_run)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_trade(&self, trade_id: Uuid) -> Result<Option<TradeRecord>, StoreError> {
        let row = sqlx::query_as::<_, TradeRow>(
            "SELECT * FROM trades WHERE trade_id = $1",
        )
        .bind(trade_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn enqueue_settlement(&self, e: SettlementEntry) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO settlement_queue (
                trade_id, token_id, side, shares, entry_price, entry_cost, market_end_time,
                claimed, claimed_at, claim_proceeds, claim_profit,
                claim_attempts, last_error, next_attempt_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
            ON CONFLICT (trade_id, token_id) DO NOTHING
            ",
        )
        .bind(e.trade_id)
        .bind(&e.token_id)
        .bind(e.side)
        .bind(e.shares)
        .bind(e.entry_price)
        .bind(e.entry_cost)
        .bind(e.market_end_time)
        .bind(e.claimed)
        .bind(e.claimed_at)
        .bind(e.claim_proceeds)
        .bind(e.claim_profit)
        .bind(e.claim_attempts as i32)
        .bind(&e.last_error)
        .bind(e.next_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_unclaimed_settlements(&self) -> Result<Vec<SettlementEntry>, StoreError> {
        let rows = sqlx::query_as::<_, SettlementRow>(
            "SELECT * FROM settlement_queue WHERE claimed = false",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_claimable(
        &self,
        now: DateTime<Utc>,
        resolution_wait: chrono::Duration,
        max_attempts: u32,
    ) -> Result<Vec<SettlementEntry>, StoreError> {
        let cutoff = now - resolution_wait;
        let rows = sqlx::query_as::<_, SettlementRow>(
            r"
            SELECT * FROM settlement_queue
            WHERE claimed = false
              AND claim_attempts < $1
              AND market_end_time <= $2
              AND (next_attempt_at IS NULL OR next_attempt_at <= $3)
            ",
        )
        .bind(max_attempts as i32)
        .bind(cutoff)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_claimed(
        &self,
        trade_id: Uuid,
        token_id: &str,
        proceeds: Decimal,
        profit: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE settlement_queue
            SET claimed = true, claimed_at = $3, claim_proceeds = $4, claim_profit = $5
            WHERE trade_id = $1 AND token_id = $2
            ",
        )
        .bind(trade_id)
        .bind(token_id)
        .bind(at)
        .bind(proceeds)
        .bind(profit)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{trade_id}/{token_id}")));
        }
        Ok(())
    }

    async fn record_claim_attempt(
        &self,
        trade_id: Uuid,
        token_id: &str,
        error: String,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE settlement_queue
            SET claim_attempts = claim_attempts + 1, last_error = $3, next_attempt_at = $4
            WHERE trade_id = $1 AND token_id = $2
            ",
        )
        .bind(trade_id)
        .bind(token_id)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_open_position_trades(&self) -> Result<Vec<TradeRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r"
            SELECT t.* FROM trades t
            WHERE EXISTS (
                SELECT 1 FROM settlement_queue s
                WHERE s.trade_id = t.trade_id AND s.claimed = false
            )
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn save_circuit_breaker(&self, s: CircuitBreakerRow) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO circuit_breaker_state (id, level, consecutive_failures, daily_pnl, day_bucket)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                level = EXCLUDED.level,
                consecutive_failures = EXCLUDED.consecutive_failures,
                daily_pnl = EXCLUDED.daily_pnl,
                day_bucket = EXCLUDED.day_bucket
            ",
        )
        .bind(s.level)
        .bind(s.consecutive_failures as i32)
        .bind(s.daily_pnl)
        .bind(s.day_bucket)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_circuit_breaker(&self) -> Result<Option<CircuitBreakerRow>, StoreError> {
        let row = sqlx::query_as::<_, CircuitBreakerRowSql>(
            "SELECT level, consecutive_failures, daily_pnl, day_bucket FROM circuit_breaker_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}

#[derive(sqlx::FromRow)]
struct TradeRow {
    trade_id: Uuid,
    created_at: DateTime<Utc>,
    condition_id: String,
    asset: String,
    yes_token_id: String,
    no_token_id: String,
    intended_yes_shares: Decimal,
    intended_no_shares: Decimal,
    actual_yes_shares: Decimal,
    actual_no_shares: Decimal,
    intended_cost: Decimal,
    actual_cost: Decimal,
    yes_limit_price: Decimal,
    no_limit_price: Decimal,
    execution_status: ExecutionStatus,
    yes_order_status: LegOrderStatus,
    no_order_status: LegOrderStatus,
    hedge_ratio: Decimal,
    yes_depth_pre: Decimal,
    no_depth_pre: Decimal,
    dry_run: bool,
}

impl From<TradeRow> for TradeRecord {
    fn from(r: TradeRow) -> Self {
        Self {
            trade_id: r.trade_id,
            created_at: r.created_at,
            condition_id: r.condition_id,
            asset: r.asset,
            yes_token_id: r.yes_token_id,
            no_token_id: r.no_token_id,
            intended_yes_shares: r.intended_yes_shares,
            intended_no_shares: r.intended_no_shares,
            actual_yes_shares: r.actual_yes_shares,
            actual_no_shares: r.actual_no_shares,
            intended_cost: r.intended_cost,
            actual_cost: r.actual_cost,
            yes_limit_price: r.yes_limit_price,
            no_limit_price: r.no_limit_price,
            execution_status: r.execution_status,
            yes_order_status: r.yes_order_status,
            no_order_status: r.no_order_status,
            hedge_ratio: r.hedge_ratio,
            yes_depth_pre: r.yes_depth_pre,
            no_depth_pre: r.no_depth_pre,
            dry_run: r.dry_run,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SettlementRow {
    trade_id: Uuid,
    token_id: String,
    side: OutcomeSide,
    shares: Decimal,
    entry_price: Decimal,
    entry_cost: Decimal,
    market_end_time: DateTime<Utc>,
    claimed: bool,
    claimed_at: Option<DateTime<Utc>>,
    claim_proceeds: Option<Decimal>,
    claim_profit: Option<Decimal>,
    claim_attempts: i32,
    last_error: Option<String>,
    next_attempt_at: Option<DateTime<Utc>>,
}

impl From<SettlementRow> for SettlementEntry {
    fn from(r: SettlementRow) -> Self {
        Self {
            trade_id: r.trade_id,
            token_id: r.token_id,
            side: r.side,
            shares: r.shares,
            entry_price: r.entry_price,
            entry_cost: r.entry_cost,
            market_end_time: r.market_end_time,
            claimed: r.claimed,
            claimed_at: r.claimed_at,
            claim_proceeds: r.claim_proceeds,
            claim_profit: r.claim_profit,
            claim_attempts: r.claim_attempts as u32,
            last_error: r.last_error,
            next_attempt_at: r.next_attempt_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CircuitBreakerRowSql {
    level: CircuitLevelCode,
    consecutive_failures: i32,
    daily_pnl: Decimal,
    day_bucket: chrono::NaiveDate,
}

impl From<CircuitBreakerRowSql> for CircuitBreakerRow {
    fn from(r: CircuitBreakerRowSql) -> Self {
        Self {
            level: r.level,
            consecutive_failures: r.consecutive_failures as u32,
            daily_pnl: r.daily_pnl,
            day_bucket: r.day_bucket,
        }
    }
}
