//! Four-level trading safety state machine (spec.md §4.9).

use arb_core::{CircuitBreakerThresholds, CircuitLevel, EngineEvent, EventSink};
use arb_store::{CircuitBreakerRow, CircuitLevelCode};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

struct State {
    level: CircuitLevel,
    consecutive_failures: u32,
    daily_pnl: Decimal,
    day_bucket: NaiveDate,
}

/// Guards its state behind a single `RwLock`; level transitions are the
/// only place mutation happens (spec.md §5).
pub struct CircuitBreaker {
    thresholds: CircuitBreakerThresholds,
    state: RwLock<State>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(thresholds: CircuitBreakerThresholds, now: DateTime<Utc>) -> Self {
        Self {
            thresholds,
            state: RwLock::new(State {
                level: CircuitLevel::Normal,
                consecutive_failures: 0,
                daily_pnl: Decimal::ZERO,
                day_bucket: now.date_naive(),
            }),
        }
    }

    /// Restores persisted state, e.g. on startup (spec.md §4.11).
    #[must_use]
    pub fn from_row(thresholds: CircuitBreakerThresholds, row: CircuitBreakerRow) -> Self {
        let level = match row.level {
            CircuitLevelCode::Normal => CircuitLevel::Normal,
            CircuitLevelCode::Warning => CircuitLevel::Warning,
            CircuitLevelCode::Caution => CircuitLevel::Caution,
            CircuitLevelCode::Halt => CircuitLevel::Halt,
        };
        Self {
            thresholds,
            state: RwLock::new(State {
                level,
                consecutive_failures: row.consecutive_failures,
                daily_pnl: row.daily_pnl,
                day_bucket: row.day_bucket,
            }),
        }
    }

    #[must_use]
    pub fn level(&self) -> CircuitLevel {
        self.state.read().level
    }

    #[must_use]
    pub fn to_row(&self) -> CircuitBreakerRow {
        let s = self.state.read();
        let level = match s.level {
            CircuitLevel::Normal => CircuitLevelCode::Normal,
            CircuitLevel::Warning => CircuitLevelCode::Warning,
            CircuitLevel::Caution => CircuitLevelCode::Caution,
            CircuitLevel::Halt => CircuitLevelCode::Halt,
        };
        CircuitBreakerRow { level, consecutive_failures: s.consecutive_failures, daily_pnl: s.daily_pnl, day_bucket: s.day_bucket }
    }

    /// A full-fill execution: resets the failure streak but never
    /// de-escalates the level on its own (spec.md §4.9).
    pub async fn record_success(&self, realized_pnl: Decimal, now: DateTime<Utc>, events: &dyn EventSink) {
        let from = self.level();
        {
            let mut s = self.state.write();
            s.consecutive_failures = 0;
            s.daily_pnl += realized_pnl;
        }
        self.reevaluate(from, now, events).await;
    }

    /// A failed or exceptioned execution leg.
    pub async fn record_failure(&self, realized_pnl: Decimal, now: DateTime<Utc>, events: &dyn EventSink) {
        let from = self.level();
        {
            let mut s = self.state.write();
            s.consecutive_failures += 1;
            s.daily_pnl += realized_pnl;
        }
        self.reevaluate(from, now, events).await;
    }

    /// Resets to `NORMAL` if `now` has crossed the configured daily reset
    /// time into a new day bucket.
    pub async fn maybe_daily_reset(&self, now: DateTime<Utc>, events: &dyn EventSink) {
        let today = now.date_naive();
        let should_reset = {
            let s = self.state.read();
            today > s.day_bucket && now.time() >= self.thresholds.daily_reset_utc
        };
        if !should_reset {
            return;
        }
        let from = self.level();
        {
            let mut s = self.state.write();
            s.level = CircuitLevel::Normal;
            s.consecutive_failures = 0;
            s.daily_pnl = Decimal::ZERO;
            s.day_bucket = today;
        }
        events
            .publish(EngineEvent::CircuitBreakerChanged { from, to: CircuitLevel::Normal, consecutive_failures: 0, daily_pnl: Decimal::ZERO, at: now })
            .await;
    }

    /// Escalates the level per thresholds; monotonic within a day bucket
    /// (testable property 8).
    async fn reevaluate(&self, from: CircuitLevel, now: DateTime<Utc>, events: &dyn EventSink) {
        let (to, failures, pnl) = {
            let mut s = self.state.write();
            let t = &self.thresholds;
            let triggered = if s.consecutive_failures >= t.halt_failures || s.daily_pnl <= -t.halt_loss_usd {
                CircuitLevel::Halt
            } else if s.consecutive_failures >= t.caution_failures || s.daily_pnl <= -t.caution_loss_usd {
                CircuitLevel::Caution
            } else if s.consecutive_failures >= t.warn_failures || s.daily_pnl <= -t.warn_loss_usd {
                CircuitLevel::Warning
            } else {
                CircuitLevel::Normal
            };
            if triggered > s.level {
                s.level = triggered;
            }
            (s.level, s.consecutive_failures, s.daily_pnl)
        };
        if to != from {
            events
                .publish(EngineEvent::CircuitBreakerChanged { from, to, consecutive_failures: failures, daily_pnl: pnl, at: now })
                .await;
        }
    }
}
