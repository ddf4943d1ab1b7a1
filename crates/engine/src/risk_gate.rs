//! Admission control: blackout, circuit breaker, dedup, window budget,
//! spread validity, and budget sizing, applied in that order (spec.md §4.4).

use crate::circuit_breaker::CircuitBreaker;
use crate::domain::{Opportunity, WindowLedger};
use arb_core::{BlackoutWindow, CircuitLevel, EngineConfig, RejectReason};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Budget approved for an admitted opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget(pub Decimal);

pub type Admission = Result<Budget, RejectReason>;

/// A pure decision function; holds no I/O, only the state it needs to
/// decide (config, circuit breaker handle, window ledger, in-flight set).
pub struct RiskGate<'a> {
    config: &'a EngineConfig,
    circuit_breaker: &'a CircuitBreaker,
    ledger: &'a WindowLedger,
    open_or_inflight: &'a HashSet<String>,
    balance: Decimal,
}

impl<'a> RiskGate<'a> {
    #[must_use]
    pub fn new(
        config: &'a EngineConfig,
        circuit_breaker: &'a CircuitBreaker,
        ledger: &'a WindowLedger,
        open_or_inflight: &'a HashSet<String>,
        balance: Decimal,
    ) -> Self {
        Self { config, circuit_breaker, ledger, open_or_inflight, balance }
    }

    /// Applies the ordered rule chain from spec.md §4.4; first match wins.
    #[must_use]
    pub fn admit(&self, opp: &Opportunity, now: DateTime<Utc>) -> Admission {
        if in_blackout(&self.config.blackout_window, now) {
            return Err(RejectReason::Blackout);
        }

        match self.circuit_breaker.level() {
            CircuitLevel::Halt => return Err(RejectReason::Halted),
            CircuitLevel::Caution => return Err(RejectReason::CautionEntriesBlocked),
            _ => {}
        }

        if self.open_or_inflight.contains(&opp.condition_id) {
            return Err(RejectReason::Duplicate);
        }

        let used = self.ledger.used(&opp.condition_id);
        let remaining_window = self.config.max_per_window_usd - used;
        if remaining_window <= Decimal::ZERO {
            return Err(RejectReason::WindowFull);
        }

        if !opp.is_valid_arbitrage() {
            return Err(RejectReason::InvalidSpread);
        }

        let sizing_multiplier = if self.circuit_breaker.level() == CircuitLevel::Warning {
            Decimal::new(5, 1)
        } else {
            Decimal::ONE
        };

        let budget = (self.balance * self.config.balance_sizing_pct * sizing_multiplier)
            .min(self.config.max_trade_size_usd)
            .min(remaining_window);

        if budget < self.config.min_trade_size_usd * Decimal::TWO {
            return Err(RejectReason::BudgetTooSmall);
        }

        Ok(Budget(budget))
    }
}

/// Whether `now`, interpreted in the window's configured timezone, falls
/// within `[start, end]` inclusive.
#[must_use]
pub fn in_blackout(window: &BlackoutWindow, now: DateTime<Utc>) -> bool {
    let tz: chrono_tz::Tz = window.timezone.parse().unwrap_or(chrono_tz::UTC);
    let local = now.with_timezone(&tz).time();
    if window.start <= window.end {
        local >= window.start && local <= window.end
    } else {
        // Window wraps midnight.
        local >= window.start || local <= window.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_core::EngineConfig;
    use rust_decimal_macros::dec;

    fn opp(condition_id: &str, yes_ask: Decimal, no_ask: Decimal) -> Opportunity {
        Opportunity {
            condition_id: condition_id.into(),
            asset: "BTC".into(),
            yes_token_id: "y".into(),
            no_token_id: "n".into(),
            yes_ask,
            no_ask,
            detected_at: Utc::now(),
            book_revision: 1,
        }
    }

    #[test]
    fn test_admits_valid_opportunity_with_budget() {
        let config = EngineConfig::default();
        let cb = CircuitBreaker::new(config.circuit_breaker.clone(), Utc::now());
        let ledger = WindowLedger::new();
        let inflight = HashSet::new();
        let gate = RiskGate::new(&config, &cb, &ledger, &inflight, dec!(1000));
        let result = gate.admit(&opp("c1", dec!(0.48), dec!(0.49)), Utc::now());
        assert!(result.is_ok());
    }

    #[test]
    fn test_rejects_invalid_spread() {
        let config = EngineConfig::default();
        let cb = CircuitBreaker::new(config.circuit_breaker.clone(), Utc::now());
        let ledger = WindowLedger::new();
        let inflight = HashSet::new();
        let gate = RiskGate::new(&config, &cb, &ledger, &inflight, dec!(1000));
        let result = gate.admit(&opp("c1", dec!(0.52), dec!(0.50)), Utc::now());
        assert_eq!(result, Err(RejectReason::InvalidSpread));
    }

    #[test]
    fn test_rejects_duplicate_when_market_in_flight() {
        let config = EngineConfig::default();
        let cb = CircuitBreaker::new(config.circuit_breaker.clone(), Utc::now());
        let ledger = WindowLedger::new();
        let mut inflight = HashSet::new();
        inflight.insert("c1".to_string());
        let gate = RiskGate::new(&config, &cb, &ledger, &inflight, dec!(1000));
        let result = gate.admit(&opp("c1", dec!(0.48), dec!(0.49)), Utc::now());
        assert_eq!(result, Err(RejectReason::Duplicate));
    }

    #[test]
    fn test_rejects_window_full() {
        let config = EngineConfig::default();
        let cb = CircuitBreaker::new(config.circuit_breaker.clone(), Utc::now());
        let mut ledger = WindowLedger::new();
        ledger.record("c1", config.max_per_window_usd);
        let inflight = HashSet::new();
        let gate = RiskGate::new(&config, &cb, &ledger, &inflight, dec!(1000));
        let result = gate.admit(&opp("c1", dec!(0.48), dec!(0.49)), Utc::now());
        assert_eq!(result, Err(RejectReason::WindowFull));
    }

    #[test]
    fn test_rejects_budget_too_small_with_low_balance() {
        let config = EngineConfig::default();
        let cb = CircuitBreaker::new(config.circuit_breaker.clone(), Utc::now());
        let ledger = WindowLedger::new();
        let inflight = HashSet::new();
        let gate = RiskGate::new(&config, &cb, &ledger, &inflight, dec!(1));
        let result = gate.admit(&opp("c1", dec!(0.48), dec!(0.49)), Utc::now());
        assert_eq!(result, Err(RejectReason::BudgetTooSmall));
    }

    #[test]
    fn test_blackout_window_rejects_within_range() {
        use chrono::NaiveTime;
        let window = BlackoutWindow {
            timezone: "UTC".into(),
            start: NaiveTime::from_hms_opt(5, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(5, 29, 0).unwrap(),
        };
        let inside = Utc::now().date_naive().and_time(NaiveTime::from_hms_opt(5, 10, 0).unwrap()).and_utc();
        assert!(in_blackout(&window, inside));
        let outside = Utc::now().date_naive().and_time(NaiveTime::from_hms_opt(6, 0, 0).unwrap()).and_utc();
        assert!(!in_blackout(&window, outside));
    }

    #[test]
    fn test_halted_circuit_breaker_rejects() {
        let config = EngineConfig::default();
        let cb = CircuitBreaker::new(config.circuit_breaker.clone(), Utc::now());
        let ledger = WindowLedger::new();
        let inflight = HashSet::new();
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            for _ in 0..10 {
                cb.record_failure(Decimal::ZERO, Utc::now(), &arb_core::NullEventSink).await;
            }
        });
        let gate = RiskGate::new(&config, &cb, &ledger, &inflight, dec!(1000));
        let result = gate.admit(&opp("c1", dec!(0.48), dec!(0.49)), Utc::now());
        assert_eq!(result, Err(RejectReason::Halted));
    }
}
