//! Parallel dual-leg FOK execution (spec.md §4.6).
//!
//! Unlike a fire-and-forget unwind on partial fill, a matched leg here is
//! never sold back by the executor — it flows to `PositionManager` and
//! `SettlementManager` instead. All SELLs originate from the rebalancer or
//! the settlement manager (testable property 7).

use crate::sizer::OrderPair;
use arb_core::{Clock, EngineEvent, EventSink};
use arb_exchange::{Exchange, ExchangeError, Order, OrderOutcome, OrderStatus};
use arb_store::{ExecutionStatus, LegOrderStatus, TradeRecord};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Classification of one leg's terminal state, after FOK placement and any
/// necessary cancel of an anomalous `Live` resting order.
#[derive(Debug, Clone)]
pub enum LegOutcome {
    Matched { filled_size: Decimal, filled_cost: Decimal },
    Simulated { filled_size: Decimal, filled_cost: Decimal },
    Failed,
    Exception { error: String },
}

impl LegOutcome {
    fn status(&self) -> LegOrderStatus {
        match self {
            Self::Matched { .. } => LegOrderStatus::Matched,
            Self::Simulated { .. } => LegOrderStatus::Simulated,
            Self::Failed => LegOrderStatus::Failed,
            Self::Exception { .. } => LegOrderStatus::Exception,
        }
    }

    fn is_filled(&self) -> bool {
        matches!(self, Self::Matched { .. } | Self::Simulated { .. })
    }

    fn filled_shares(&self) -> Decimal {
        match self {
            Self::Matched { filled_size, .. } | Self::Simulated { filled_size, .. } => *filled_size,
            _ => Decimal::ZERO,
        }
    }

    fn filled_cost(&self) -> Decimal {
        match self {
            Self::Matched { filled_cost, .. } | Self::Simulated { filled_cost, .. } => *filled_cost,
            _ => Decimal::ZERO,
        }
    }
}

/// Outcome of executing one `OrderPair`.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub trade: TradeRecord,
    pub yes: LegOutcome,
    pub no: LegOutcome,
}

impl ExecutionResult {
    #[must_use]
    pub fn is_full_fill(&self) -> bool {
        self.trade.execution_status == ExecutionStatus::FullFill
    }

    #[must_use]
    pub fn is_one_leg_only(&self) -> bool {
        self.trade.execution_status == ExecutionStatus::OneLegOnly
    }
}

/// Places both legs of an `OrderPair` concurrently, awaits them jointly
/// under a bounded timeout, and classifies the outcome. Never unwinds a
/// matched leg.
pub struct Executor<E: Exchange, C: Clock> {
    exchange: Arc<E>,
    clock: Arc<C>,
    parallel_fill_timeout: Duration,
    dry_run: bool,
}

impl<E: Exchange, C: Clock> Executor<E, C> {
    #[must_use]
    pub fn new(exchange: Arc<E>, clock: Arc<C>, parallel_fill_timeout: Duration, dry_run: bool) -> Self {
        Self { exchange, clock, parallel_fill_timeout, dry_run }
    }

    /// Executes both legs. `yes_depth_pre`/`no_depth_pre` are the pre-fill
    /// depth snapshots to attach to the `TradeRecord` for later analysis.
    pub async fn execute(
        &self,
        pair: &OrderPair,
        yes_depth_pre: Decimal,
        no_depth_pre: Decimal,
        events: &dyn EventSink,
    ) -> ExecutionResult {
        let trade_id = Uuid::new_v4();
        let now = self.clock.now_utc();

        let (yes, no) = if self.dry_run {
            (
                LegOutcome::Simulated { filled_size: pair.shares, filled_cost: pair.shares * pair.yes_price },
                LegOutcome::Simulated { filled_size: pair.shares, filled_cost: pair.shares * pair.no_price },
            )
        } else {
            let yes_order = Order::buy_fok(pair.yes_token_id.clone(), pair.yes_price, pair.shares);
            let no_order = Order::buy_fok(pair.no_token_id.clone(), pair.no_price, pair.shares);

            let timeout = self.parallel_fill_timeout;
            let (yes_res, no_res) = tokio::join!(
                tokio::time::timeout(timeout, self.place_leg(yes_order)),
                tokio::time::timeout(timeout, self.place_leg(no_order)),
            );

            (
                yes_res.unwrap_or(LegOutcome::Exception { error: "joint timeout".into() }),
                no_res.unwrap_or(LegOutcome::Exception { error: "joint timeout".into() }),
            )
        };

        for (outcome, order_id, limit_price) in [(&yes, pair.yes_token_id.as_str(), pair.yes_price), (&no, pair.no_token_id.as_str(), pair.no_price)] {
            events
                .publish(EngineEvent::OrderPlaced { trade_id, token_id: order_id.to_string(), limit_price, size: pair.shares, at: now })
                .await;
            if outcome.is_filled() {
                events
                    .publish(EngineEvent::OrderMatched { trade_id, token_id: order_id.to_string(), filled_size: outcome.filled_shares(), filled_cost: outcome.filled_cost(), at: now })
                    .await;
            }
        }

        let execution_status = if self.dry_run {
            ExecutionStatus::Simulated
        } else {
            match (yes.is_filled(), no.is_filled()) {
                (true, true) => ExecutionStatus::FullFill,
                (true, false) | (false, true) => ExecutionStatus::OneLegOnly,
                (false, false) => ExecutionStatus::Failed,
            }
        };

        let actual_yes_shares = yes.filled_shares();
        let actual_no_shares = no.filled_shares();

        let trade = TradeRecord {
            trade_id,
            created_at: now,
            condition_id: pair.condition_id.clone(),
            asset: String::new(),
            yes_token_id: pair.yes_token_id.clone(),
            no_token_id: pair.no_token_id.clone(),
            intended_yes_shares: pair.shares,
            intended_no_shares: pair.shares,
            actual_yes_shares,
            actual_no_shares,
            intended_cost: pair.total_cost(),
            actual_cost: yes.filled_cost() + no.filled_cost(),
            yes_limit_price: pair.yes_price,
            no_limit_price: pair.no_price,
            execution_status,
            yes_order_status: yes.status(),
            no_order_status: no.status(),
            hedge_ratio: TradeRecord::compute_hedge_ratio(actual_yes_shares, actual_no_shares),
            yes_depth_pre,
            no_depth_pre,
            dry_run: self.dry_run,
        };

        events
            .publish(EngineEvent::TradeRecorded { trade_id, condition_id: pair.condition_id.clone(), execution_status: execution_status.to_string(), at: now })
            .await;

        ExecutionResult { trade, yes, no }
    }

    /// Places one FOK leg, converting any exchange error into an
    /// `Exception` outcome and cancelling any anomalous resting order —
    /// this function must never propagate, so the joint await always resolves.
    async fn place_leg(&self, order: Order) -> LegOutcome {
        match self.exchange.place_order(order).await {
            Ok(OrderOutcome { status: OrderStatus::Matched, filled_size, avg_price, .. }) => {
                LegOutcome::Matched { filled_size, filled_cost: filled_size * avg_price }
            }
            Ok(OrderOutcome { status: OrderStatus::Rejected, .. }) => LegOutcome::Failed,
            Ok(OrderOutcome { status: OrderStatus::Cancelled | OrderStatus::Expired, order_id, .. }) => {
                // Should not occur under FOK; cancel defensively and treat as not-matched.
                warn!(order_id, "unexpected resting order status under FOK, cancelling");
                if let Err(err) = self.exchange.cancel_order(&order_id).await {
                    warn!(order_id, error = %err, "cancel of anomalous order failed");
                }
                LegOutcome::Failed
            }
            Err(ExchangeError::Timeout) => LegOutcome::Exception { error: "timeout".into() },
            Err(err) => LegOutcome::Exception { error: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_core::{NullEventSink, SystemClock};
    use arb_exchange::{PaperExchange, PaperExchangeConfig};
    use rust_decimal_macros::dec;

    fn pair() -> OrderPair {
        OrderPair {
            condition_id: "c1".into(),
            yes_token_id: "yes-tok".into(),
            no_token_id: "no-tok".into(),
            yes_price: dec!(0.48),
            no_price: dec!(0.49),
            shares: dec!(20),
        }
    }

    #[tokio::test]
    async fn test_full_fill_when_both_legs_match() {
        let exchange = Arc::new(PaperExchange::new(PaperExchangeConfig::with_balance(dec!(1000))));
        exchange.set_book("yes-tok", vec![], vec![(dec!(0.48), dec!(100))]);
        exchange.set_book("no-tok", vec![], vec![(dec!(0.49), dec!(100))]);
        let executor = Executor::new(exchange, Arc::new(SystemClock::default()), Duration::from_secs(10), false);

        let result = executor.execute(&pair(), dec!(100), dec!(100), &NullEventSink).await;
        assert!(result.is_full_fill());
        assert_eq!(result.trade.hedge_ratio, dec!(1));
    }

    #[tokio::test]
    async fn test_one_leg_only_s3() {
        let exchange = Arc::new(PaperExchange::new(PaperExchangeConfig::with_balance(dec!(1000))));
        exchange.set_book("yes-tok", vec![], vec![(dec!(0.48), dec!(100))]);
        // No book seeded for no-tok: place_order errors InvalidOrder -> Failed leg.
        let executor = Executor::new(exchange, Arc::new(SystemClock::default()), Duration::from_secs(10), false);

        let result = executor.execute(&pair(), dec!(100), dec!(0), &NullEventSink).await;
        assert!(result.is_one_leg_only());
        assert_eq!(result.trade.actual_no_shares, dec!(0));
        assert_eq!(result.trade.hedge_ratio, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_failed_when_both_legs_miss() {
        let exchange = Arc::new(PaperExchange::new(PaperExchangeConfig::with_balance(dec!(1000))));
        let executor = Executor::new(exchange, Arc::new(SystemClock::default()), Duration::from_secs(10), false);
        let result = executor.execute(&pair(), dec!(0), dec!(0), &NullEventSink).await;
        assert_eq!(result.trade.execution_status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_dry_run_never_calls_exchange_and_marks_simulated() {
        let exchange = Arc::new(PaperExchange::new(PaperExchangeConfig::with_balance(dec!(1000))));
        let executor = Executor::new(exchange.clone(), Arc::new(SystemClock::default()), Duration::from_secs(10), true);
        let result = executor.execute(&pair(), dec!(0), dec!(0), &NullEventSink).await;
        assert_eq!(result.trade.execution_status, ExecutionStatus::Simulated);
        assert!(result.trade.dry_run);
        assert_eq!(exchange.balance(), dec!(1000));
    }
}
