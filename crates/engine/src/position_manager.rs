//! Open-position tracking and rebalancing (spec.md §4.7).
//!
//! Positions are built from `ExecutionResult`s, kept in memory for the life
//! of the market window, and handed to `SettlementManager` once the market
//! resolves. An imbalanced position (one-leg-only fill, or drift after a
//! partial rebalance) is corrected here by buying the deficit side or
//! selling the excess side — never by unwinding the filled leg itself.

use crate::domain::Position;
use crate::executor::ExecutionResult;
use arb_core::{EngineConfig, EngineEvent, EventSink};
use arb_exchange::{depth_at_price, Exchange, L2OrderBook, Order, OrderStatus, Side};
use arb_store::TradeRecord;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceOutcome {
    Balanced,
    Corrected { side: RebalanceSide, shares: Decimal },
    NoGoWindow,
    AttemptsExhausted,
    Unprofitable,
    OrderFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceSide {
    BuyYes,
    BuyNo,
    SellYes,
    SellNo,
}

impl std::fmt::Display for RebalanceSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BuyYes => "buy_yes",
            Self::BuyNo => "buy_no",
            Self::SellYes => "sell_yes",
            Self::SellNo => "sell_no",
        };
        write!(f, "{s}")
    }
}

/// Tracks open positions keyed by `condition_id`. One position per market
/// at a time; a market is removed once handed off to settlement.
pub struct PositionManager {
    positions: HashMap<String, Position>,
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionManager {
    #[must_use]
    pub fn new() -> Self {
        Self { positions: HashMap::new() }
    }

    /// Folds a completed execution into the tracked position for its market.
    pub fn record_execution(&mut self, result: &ExecutionResult, market_end_time: chrono::DateTime<chrono::Utc>) {
        self.record_trade(&result.trade, market_end_time);
    }

    /// Folds a durable `TradeRecord` into the tracked position for its
    /// market — used both live and when reconstituting state on startup.
    pub fn record_trade(&mut self, trade: &TradeRecord, market_end_time: chrono::DateTime<chrono::Utc>) {
        if trade.actual_yes_shares == Decimal::ZERO && trade.actual_no_shares == Decimal::ZERO {
            return;
        }
        let entry = self.positions.entry(trade.condition_id.clone()).or_insert_with(|| Position {
            trade_id: trade.trade_id,
            condition_id: trade.condition_id.clone(),
            asset: trade.asset.clone(),
            yes_token_id: trade.yes_token_id.clone(),
            no_token_id: trade.no_token_id.clone(),
            yes_shares: Decimal::ZERO,
            no_shares: Decimal::ZERO,
            yes_avg_cost: Decimal::ZERO,
            no_avg_cost: Decimal::ZERO,
            created_at: trade.created_at,
            market_end_time,
            rebalance_attempts: 0,
        });
        entry.yes_avg_cost = weighted_avg(entry.yes_shares, entry.yes_avg_cost, trade.actual_yes_shares, trade.yes_limit_price);
        entry.no_avg_cost = weighted_avg(entry.no_shares, entry.no_avg_cost, trade.actual_no_shares, trade.no_limit_price);
        entry.yes_shares += trade.actual_yes_shares;
        entry.no_shares += trade.actual_no_shares;
    }

    #[must_use]
    pub fn get(&self, condition_id: &str) -> Option<&Position> {
        self.positions.get(condition_id)
    }

    #[must_use]
    pub fn open_condition_ids(&self) -> std::collections::HashSet<String> {
        self.positions.keys().cloned().collect()
    }

    /// Removes a position once it has been fully handed to settlement.
    pub fn close(&mut self, condition_id: &str) -> Option<Position> {
        self.positions.remove(condition_id)
    }

    /// Attempts to correct an imbalanced position by trading the smaller
    /// side up, or (when depth disallows a profitable buy) the larger side
    /// down. Never touches the already-filled leg by cancelling or
    /// unwinding it directly.
    pub async fn rebalance<E: Exchange>(
        &mut self,
        condition_id: &str,
        exchange: &Arc<E>,
        config: &EngineConfig,
        yes_book: &L2OrderBook,
        no_book: &L2OrderBook,
        now: chrono::DateTime<chrono::Utc>,
        events: &dyn EventSink,
    ) -> RebalanceOutcome {
        let Some(position) = self.positions.get(condition_id) else {
            return RebalanceOutcome::Balanced;
        };
        if position.is_balanced(config.rebalance_threshold) {
            return RebalanceOutcome::Balanced;
        }
        if now + chrono::Duration::from_std(config.rebalance_no_go_before_end).unwrap_or_default() >= position.market_end_time {
            return RebalanceOutcome::NoGoWindow;
        }
        if position.rebalance_attempts >= config.max_rebalance_attempts {
            return RebalanceOutcome::AttemptsExhausted;
        }

        let deficit = position.imbalance().abs();
        let buy_yes_deficit = position.yes_shares < position.no_shares;

        // The excess side is whichever leg already holds more shares; sell it
        // down before considering buying the deficit side up (spec.md §4.7:
        // "prefer sell-excess when both are viable, capital-efficient").
        let (sell_side, sell_book, excess_avg_cost) = if buy_yes_deficit {
            (RebalanceSide::SellNo, no_book, position.no_avg_cost)
        } else {
            (RebalanceSide::SellYes, yes_book, position.yes_avg_cost)
        };
        let sell_floor = excess_avg_cost + config.min_rebalance_profit_per_share;

        let (buy_side, buy_book, buy_limit_price_cap) = if buy_yes_deficit {
            (RebalanceSide::BuyYes, yes_book, Decimal::ONE - config.min_rebalance_profit_per_share)
        } else {
            (RebalanceSide::BuyNo, no_book, Decimal::ONE - config.min_rebalance_profit_per_share)
        };

        let outcome = match sell_book.best_bid() {
            Some(bid) if bid > sell_floor => self.execute_rebalance_leg(condition_id, exchange, sell_side, deficit, bid, now, events).await,
            _ => {
                let best_ask = buy_book.best_ask();
                let depth = best_ask.map(|p| depth_at_price(buy_book, Side::Buy, p)).unwrap_or(Decimal::ZERO);
                match best_ask {
                    Some(ask) if ask <= buy_limit_price_cap && depth >= deficit => {
                        self.execute_rebalance_leg(condition_id, exchange, buy_side, deficit, ask, now, events).await
                    }
                    _ => RebalanceOutcome::Unprofitable,
                }
            }
        };

        if let Some(position) = self.positions.get_mut(condition_id) {
            position.rebalance_attempts += 1;
        }
        outcome
    }

    async fn execute_rebalance_leg<E: Exchange>(
        &mut self,
        condition_id: &str,
        exchange: &Arc<E>,
        side: RebalanceSide,
        shares: Decimal,
        price: Decimal,
        now: chrono::DateTime<chrono::Utc>,
        events: &dyn EventSink,
    ) -> RebalanceOutcome {
        let Some(position) = self.positions.get(condition_id) else {
            return RebalanceOutcome::Balanced;
        };
        let token_id = match side {
            RebalanceSide::BuyYes | RebalanceSide::SellYes => position.yes_token_id.clone(),
            RebalanceSide::BuyNo | RebalanceSide::SellNo => position.no_token_id.clone(),
        };
        let order = match side {
            RebalanceSide::BuyYes | RebalanceSide::BuyNo => Order::buy_gtc(token_id, price, shares),
            RebalanceSide::SellYes | RebalanceSide::SellNo => Order::sell_gtc(token_id, price, shares),
        };

        match exchange.place_order(order).await {
            Ok(outcome) if outcome.status == OrderStatus::Matched => {
                if let Some(position) = self.positions.get_mut(condition_id) {
                    match side {
                        RebalanceSide::BuyYes => {
                            position.yes_avg_cost = weighted_avg(position.yes_shares, position.yes_avg_cost, outcome.filled_size, outcome.avg_price);
                            position.yes_shares += outcome.filled_size;
                        }
                        RebalanceSide::BuyNo => {
                            position.no_avg_cost = weighted_avg(position.no_shares, position.no_avg_cost, outcome.filled_size, outcome.avg_price);
                            position.no_shares += outcome.filled_size;
                        }
                        RebalanceSide::SellYes => position.yes_shares -= outcome.filled_size,
                        RebalanceSide::SellNo => position.no_shares -= outcome.filled_size,
                    }
                }
                events
                    .publish(EngineEvent::Rebalanced { condition_id: condition_id.to_string(), side: side.to_string(), shares: outcome.filled_size, price: outcome.avg_price, at: now })
                    .await;
                RebalanceOutcome::Corrected { side, shares: outcome.filled_size }
            }
            _ => RebalanceOutcome::OrderFailed,
        }
    }
}

fn weighted_avg(existing_shares: Decimal, existing_avg: Decimal, new_shares: Decimal, new_price: Decimal) -> Decimal {
    let total = existing_shares + new_shares;
    if total == Decimal::ZERO {
        return Decimal::ZERO;
    }
    (existing_shares * existing_avg + new_shares * new_price) / total
}
