//! Wires market discovery, book tracking, detection, risk admission,
//! sizing, execution, position tracking, settlement, and the circuit
//! breaker into the single event loop described in spec.md §5.
//!
//! Nothing here is safe to call concurrently with itself — `Engine::run`
//! owns all mutable state and processes one book update, market refresh,
//! or settlement sweep at a time, the same way the admission/sizing/
//! execution pipeline it drives is written as a sequential pure-decision
//! chain rather than a pool of workers.

pub mod book_tracker;
pub mod circuit_breaker;
pub mod detector;
pub mod domain;
pub mod event_bus;
pub mod executor;
pub mod market_finder;
pub mod position_manager;
pub mod recovery;
pub mod risk_gate;
pub mod settlement_manager;
pub mod shutdown;
pub mod sizer;

pub use book_tracker::BookTracker;
pub use circuit_breaker::CircuitBreaker;
pub use detector::OpportunityDetector;
pub use domain::{MarketInfo, MarketState, Opportunity, Position, WindowLedger};
pub use event_bus::{BroadcastEventSink, LoggingEventSink};
pub use executor::{ExecutionResult, Executor, LegOutcome};
pub use market_finder::MarketFinder;
pub use position_manager::{PositionManager, RebalanceOutcome, RebalanceSide};
pub use recovery::{recover, RecoveredState};
pub use risk_gate::{Admission, Budget, RiskGate};
pub use settlement_manager::SettlementManager;
pub use shutdown::ShutdownCoordinator;
pub use sizer::{OrderPair, Sizer, SizerReject};

use arb_core::{Clock, EngineConfig, EngineEvent, EventSink};
use arb_exchange::{depth_at_price, Exchange, Side};
use arb_store::{OutcomeSide, SettlementEntry, Store};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Owns every piece of mutable engine state and drives the loop in `run`.
pub struct Engine<E: Exchange + 'static, C: Clock + 'static, S: Store + 'static> {
    exchange: Arc<E>,
    store: Arc<S>,
    clock: Arc<C>,
    events: Arc<dyn EventSink>,
    config: EngineConfig,

    market_finder: MarketFinder<E>,
    book_tracker: BookTracker,
    updates_rx: mpsc::Receiver<String>,
    detector: OpportunityDetector,
    circuit_breaker: CircuitBreaker,
    position_manager: PositionManager,
    window_ledger: WindowLedger,
    executor: Executor<E, C>,
    settlement_manager: SettlementManager<E, S>,

    /// Markets currently subscribed to, keyed by `condition_id`; needed to
    /// resolve a window's end time and token ids outside of `MarketState`.
    markets: HashMap<String, MarketInfo>,
    /// Conditions with an execution in flight, for the risk gate's
    /// duplicate-admission check (spec.md §4.4).
    in_flight: HashSet<String>,
}

impl<E, C, S> Engine<E, C, S>
where
    E: Exchange + 'static,
    C: Clock + 'static,
    S: Store + 'static,
{
    /// Builds a fresh engine from recovered startup state (see [`recover`]).
    #[must_use]
    pub fn new(exchange: Arc<E>, store: Arc<S>, clock: Arc<C>, events: Arc<dyn EventSink>, config: EngineConfig, recovered: RecoveredState) -> Self {
        let (book_tracker, updates_rx) = BookTracker::new(1024);
        let market_finder = MarketFinder::new(exchange.clone(), config.assets.clone());
        let executor = Executor::new(exchange.clone(), clock.clone(), config.parallel_fill_timeout, config.dry_run);
        let settlement_manager = SettlementManager::new(exchange.clone(), store.clone());
        let detector = OpportunityDetector::new(config.min_spread_usd);

        Self {
            exchange,
            store,
            clock,
            events,
            config,
            market_finder,
            book_tracker,
            updates_rx,
            detector,
            circuit_breaker: recovered.circuit_breaker,
            position_manager: recovered.position_manager,
            window_ledger: WindowLedger::new(),
            executor,
            settlement_manager,
            markets: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }

    /// Runs until `shutdown`'s accepting-new token is cancelled, then
    /// signals draining complete once the loop has actually stopped
    /// pulling new work (spec.md §5 shutdown sequence).
    pub async fn run(&mut self, shutdown: &ShutdownCoordinator) {
        let mut market_refresh = tokio::time::interval(std::time::Duration::from_secs(15));
        let mut staleness_tick = tokio::time::interval(std::time::Duration::from_secs(10));
        let mut rebalance_tick = tokio::time::interval(std::time::Duration::from_secs(5));
        let mut settlement_tick = tokio::time::interval(std::time::Duration::from_secs(30));
        let mut daily_reset_tick = tokio::time::interval(std::time::Duration::from_secs(60));
        let accepting_new = shutdown.accepting_new_token();

        loop {
            tokio::select! {
                biased;

                () = accepting_new.cancelled() => {
                    tracing::info!("shutdown requested, draining in-flight work before teardown");
                    break;
                }

                Some(condition_id) = self.updates_rx.recv() => {
                    self.on_book_update(&condition_id).await;
                }

                _ = market_refresh.tick() => {
                    self.refresh_markets().await;
                }

                _ = rebalance_tick.tick() => {
                    self.sweep_rebalances().await;
                }

                _ = staleness_tick.tick() => {
                    let now = self.clock.now_utc();
                    let threshold = chrono::Duration::from_std(self.config.stale_threshold).unwrap_or_default();
                    self.book_tracker.check_staleness(now, threshold, self.events.as_ref()).await;
                }

                _ = settlement_tick.tick() => {
                    let now = self.clock.now_utc();
                    let claimed = self.settlement_manager.run_once(&self.config, now, self.events.as_ref()).await;
                    if claimed > 0 {
                        tracing::info!(claimed, "settlement claims processed");
                    }
                }

                _ = daily_reset_tick.tick() => {
                    self.circuit_breaker.maybe_daily_reset(self.clock.now_utc(), self.events.as_ref()).await;
                }
            }
        }

        shutdown.finish_draining();
    }

    /// Discovers the current slot's market for every configured asset and
    /// starts tracking any that are new; resubscribes only when the
    /// tracked set actually grew, so a quiet refresh tick is a no-op.
    async fn refresh_markets(&mut self) {
        let now = self.clock.now_utc();
        let found = self.market_finder.refresh(now, self.events.as_ref()).await;

        let mut grew = false;
        for market in found {
            if !self.markets.contains_key(&market.condition_id) {
                self.book_tracker.track(market.clone());
                self.markets.insert(market.condition_id.clone(), market);
                grew = true;
            }
        }

        if grew {
            if let Err(err) = self.book_tracker.subscribe_all(self.exchange.as_ref()).await {
                tracing::warn!(error = %err, "failed to subscribe to newly discovered markets");
            } else {
                self.events.publish(EngineEvent::WebsocketReconnected { subscriptions: self.markets.len(), at: now }).await;
            }
        }

        self.markets.retain(|_, info| info.end_time + self.config.resolution_wait > now);
    }

    /// Evaluates one market's freshly-updated book for a spread crossing,
    /// and if admitted, sizes and executes it (spec.md §4.3–§4.6).
    async fn on_book_update(&mut self, condition_id: &str) {
        let Some(state) = self.book_tracker.state(condition_id) else { return };
        let now = self.clock.now_utc();
        let threshold = chrono::Duration::from_std(self.config.stale_threshold).unwrap_or_default();
        let is_stale = state.is_stale(now, threshold);
        let revision = self.book_tracker.revision(condition_id);

        let Some(opp) = self.detector.evaluate(&state, revision, is_stale) else { return };
        self.events
            .publish(EngineEvent::OpportunityDetected {
                condition_id: opp.condition_id.clone(),
                yes_ask: opp.yes_ask,
                no_ask: opp.no_ask,
                spread_cents: opp.spread_cents(),
                at: now,
            })
            .await;

        let balance = match self.exchange.get_balance().await {
            Ok(b) => b.balance,
            Err(err) => {
                tracing::warn!(error = %err, condition_id, "failed to fetch balance, skipping opportunity");
                return;
            }
        };

        let budget = {
            let mut open_or_inflight = self.position_manager.open_condition_ids();
            open_or_inflight.extend(self.in_flight.iter().cloned());
            let gate = RiskGate::new(&self.config, &self.circuit_breaker, &self.window_ledger, &open_or_inflight, balance);
            match gate.admit(&opp, now) {
                Ok(budget) => budget,
                Err(reason) => {
                    self.events.publish(EngineEvent::OpportunityRejected { condition_id: opp.condition_id.clone(), reason, at: now }).await;
                    return;
                }
            }
        };

        let sizer = Sizer::new(self.config.max_liquidity_consumption_pct, self.config.min_trade_size_usd, self.config.size_quantization_dp);
        let pair = match sizer.size(&opp, budget, &state.yes_book, &state.no_book) {
            Ok(pair) => pair,
            Err(SizerReject::InsufficientLiquidity) => {
                self.events
                    .publish(EngineEvent::OpportunityRejected { condition_id: opp.condition_id.clone(), reason: arb_core::RejectReason::InsufficientLiquidity, at: now })
                    .await;
                return;
            }
        };

        let tranches = Sizer::split_into_tranches(&pair, &self.config.gradual_entry);
        for tranche in tranches {
            self.execute_pair(condition_id, &tranche, &state, now).await;
        }
    }

    /// Executes one sized order pair, records the resulting trade and
    /// position, enqueues settlement rows for any filled leg, and feeds the
    /// circuit breaker (spec.md §4.6–§4.9).
    async fn execute_pair(&mut self, condition_id: &str, pair: &OrderPair, state: &MarketState, now: chrono::DateTime<chrono::Utc>) {
        let yes_depth_pre = depth_at_price(&state.yes_book, Side::Buy, pair.yes_price);
        let no_depth_pre = depth_at_price(&state.no_book, Side::Buy, pair.no_price);

        self.in_flight.insert(condition_id.to_string());
        let result = self.executor.execute(pair, yes_depth_pre, no_depth_pre, self.events.as_ref()).await;
        self.in_flight.remove(condition_id);

        self.window_ledger.record(condition_id, result.trade.actual_cost);

        if let Err(err) = self.store.save_trade(result.trade.clone()).await {
            tracing::error!(error = %err, trade_id = %result.trade.trade_id, "failed to persist trade record");
        }

        let end_time = self.markets.get(condition_id).map(|m| m.end_time).unwrap_or(now);
        if !result.trade.dry_run {
            self.enqueue_settlement_rows(&result, end_time).await;
        }
        self.position_manager.record_execution(&result, end_time);

        // The circuit breaker reacts to fill outcomes immediately; the
        // dollar P&L of a one-leg-only position isn't known until
        // settlement, so only a full fill's (zero, by construction) and a
        // miss's failure-streak count feed it here.
        if result.is_full_fill() {
            self.circuit_breaker.record_success(Decimal::ZERO, now, self.events.as_ref()).await;
        } else {
            self.circuit_breaker.record_failure(Decimal::ZERO, now, self.events.as_ref()).await;
        }

        if result.is_one_leg_only() {
            let outcome = self
                .position_manager
                .rebalance(condition_id, &self.exchange, &self.config, &state.yes_book, &state.no_book, now, self.events.as_ref())
                .await;
            tracing::info!(?outcome, condition_id, "rebalance attempted immediately after one-leg fill");
        }
    }

    /// Enqueues a durable settlement row for each leg that actually filled.
    /// Callers must skip this for a `dry_run` trade — a simulated fill has
    /// no real shares to claim back at settlement.
    async fn enqueue_settlement_rows(&self, result: &ExecutionResult, market_end_time: chrono::DateTime<chrono::Utc>) {
        let trade = &result.trade;
        if trade.actual_yes_shares > Decimal::ZERO {
            let entry = SettlementEntry::new(trade.trade_id, trade.yes_token_id.clone(), OutcomeSide::Yes, trade.actual_yes_shares, trade.yes_limit_price, market_end_time);
            if let Err(err) = self.store.enqueue_settlement(entry).await {
                tracing::error!(error = %err, trade_id = %trade.trade_id, "failed to enqueue yes settlement row");
            }
        }
        if trade.actual_no_shares > Decimal::ZERO {
            let entry = SettlementEntry::new(trade.trade_id, trade.no_token_id.clone(), OutcomeSide::No, trade.actual_no_shares, trade.no_limit_price, market_end_time);
            if let Err(err) = self.store.enqueue_settlement(entry).await {
                tracing::error!(error = %err, trade_id = %trade.trade_id, "failed to enqueue no settlement row");
            }
        }
    }

    /// Retries rebalancing every open position against its latest book
    /// state; a position that can't correct yet (no-go window, exhausted
    /// attempts, illiquid) simply waits for the next tick.
    async fn sweep_rebalances(&mut self) {
        let now = self.clock.now_utc();
        for condition_id in self.position_manager.open_condition_ids() {
            let Some(state) = self.book_tracker.state(&condition_id) else { continue };
            let outcome = self
                .position_manager
                .rebalance(&condition_id, &self.exchange, &self.config, &state.yes_book, &state.no_book, now, self.events.as_ref())
                .await;
            if !matches!(outcome, RebalanceOutcome::Balanced) {
                tracing::debug!(?outcome, condition_id, "rebalance sweep");
            }
        }
    }
}
