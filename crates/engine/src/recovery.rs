//! Startup recovery sequence (spec.md §4.11).
//!
//! Order matters: the circuit breaker level must be restored before the
//! engine loop starts admitting opportunities, and open positions must be
//! reconstituted from `Store` before settlement or rebalancing can touch
//! them — a fresh-state engine that forgets a one-leg-only fill would let
//! it sit unhedged forever.

use crate::circuit_breaker::CircuitBreaker;
use crate::position_manager::PositionManager;
use arb_core::EngineConfig;
use arb_store::Store;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Everything reconstituted from durable storage before the engine loop
/// is allowed to run.
pub struct RecoveredState {
    pub circuit_breaker: CircuitBreaker,
    pub position_manager: PositionManager,
    pub open_condition_ids: std::collections::HashSet<String>,
}

/// Loads persisted circuit breaker level and open positions. Never touches
/// the exchange — book subscriptions and market discovery happen after this
/// returns, in the caller's startup sequence.
pub async fn recover<S: Store>(store: &Arc<S>, config: &EngineConfig, now: DateTime<Utc>) -> Result<RecoveredState, arb_store::StoreError> {
    let circuit_breaker = match store.load_circuit_breaker().await? {
        Some(row) => {
            tracing::info!(level = ?row.level, "restored circuit breaker state from storage");
            CircuitBreaker::from_row(config.circuit_breaker.clone(), row)
        }
        None => {
            tracing::info!("no persisted circuit breaker state, starting at NORMAL");
            CircuitBreaker::new(config.circuit_breaker.clone(), now)
        }
    };

    let mut position_manager = PositionManager::new();
    let open_trades = store.get_open_position_trades().await?;
    tracing::info!(count = open_trades.len(), "reconstituting open positions from storage");
    let mut open_condition_ids = std::collections::HashSet::new();
    for trade in open_trades {
        open_condition_ids.insert(trade.condition_id.clone());
        // The durable row has no market end time; settlement eligibility
        // re-derives it from the settlement queue's own `market_end_time`,
        // so a conservative "already past" value here only affects the
        // in-memory rebalance no-go-window check until the next live fill.
        position_manager.record_trade(&trade, now);
    }

    Ok(RecoveredState { circuit_breaker, position_manager, open_condition_ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_store::{CircuitBreakerRow, CircuitLevelCode, ExecutionStatus, InMemoryStore, LegOrderStatus, TradeRecord};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_recover_with_empty_store_starts_fresh() {
        let store = Arc::new(InMemoryStore::new());
        let config = EngineConfig::default();
        let state = recover(&store, &config, Utc::now()).await.unwrap();
        assert_eq!(state.circuit_breaker.level(), arb_core::CircuitLevel::Normal);
        assert!(state.open_condition_ids.is_empty());
    }

    #[tokio::test]
    async fn test_recover_restores_circuit_breaker_level() {
        let store = Arc::new(InMemoryStore::new());
        store
            .save_circuit_breaker(CircuitBreakerRow { level: CircuitLevelCode::Caution, consecutive_failures: 4, daily_pnl: dec!(-80), day_bucket: Utc::now().date_naive() })
            .await
            .unwrap();
        let config = EngineConfig::default();
        let state = recover(&store, &config, Utc::now()).await.unwrap();
        assert_eq!(state.circuit_breaker.level(), arb_core::CircuitLevel::Caution);
    }

    #[tokio::test]
    async fn test_recover_reconstitutes_open_positions() {
        let store = Arc::new(InMemoryStore::new());
        let trade = TradeRecord {
            trade_id: Uuid::new_v4(),
            created_at: Utc::now(),
            condition_id: "c1".into(),
            asset: "BTC".into(),
            yes_token_id: "yes-tok".into(),
            no_token_id: "no-tok".into(),
            intended_yes_shares: dec!(20),
            intended_no_shares: dec!(20),
            actual_yes_shares: dec!(20),
            actual_no_shares: dec!(0),
            intended_cost: dec!(19.4),
            actual_cost: dec!(9.6),
            yes_limit_price: dec!(0.48),
            no_limit_price: dec!(0.49),
            execution_status: ExecutionStatus::OneLegOnly,
            yes_order_status: LegOrderStatus::Matched,
            no_order_status: LegOrderStatus::Failed,
            hedge_ratio: rust_decimal::Decimal::ZERO,
            yes_depth_pre: dec!(100),
            no_depth_pre: dec!(100),
            dry_run: false,
        };
        store.save_trade(trade.clone()).await.unwrap();
        store
            .enqueue_settlement(arb_store::SettlementEntry::new(trade.trade_id, "yes-tok", arb_store::OutcomeSide::Yes, dec!(20), dec!(0.48), Utc::now() + chrono::Duration::minutes(15)))
            .await
            .unwrap();

        let config = EngineConfig::default();
        let state = recover(&store, &config, Utc::now()).await.unwrap();
        assert!(state.open_condition_ids.contains("c1"));
        assert_eq!(state.position_manager.get("c1").unwrap().yes_shares, dec!(20));
    }
}
