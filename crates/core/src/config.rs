//! Immutable configuration snapshot for the arbitrage engine.
//!
//! Mirrors every option enumerated in the engine configuration table:
//! assets monitored, sizing/budget caps, staleness and rebalance
//! thresholds, settlement retry policy, circuit-breaker thresholds, the
//! blackout window, and dry-run/gradual-entry toggles.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A blackout window expressed as a local wall-clock interval in a named
/// IANA timezone (e.g. `America/Chicago`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlackoutWindow {
    /// IANA timezone name the start/end are interpreted in.
    pub timezone: String,
    /// Inclusive start of the blackout window, local time.
    pub start: NaiveTime,
    /// Inclusive end of the blackout window, local time.
    pub end: NaiveTime,
}

impl Default for BlackoutWindow {
    fn default() -> Self {
        Self {
            timezone: "America/Chicago".to_string(),
            start: NaiveTime::from_hms_opt(5, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(5, 29, 0).unwrap(),
        }
    }
}

/// Gradual ("tranched") entry parameters, used when a detected spread is
/// wide enough to justify splitting the pair across several smaller fills.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradualEntryConfig {
    /// Whether tranched entry is enabled at all.
    pub enabled: bool,
    /// Number of tranches to split a sized pair into.
    pub tranches: u32,
    /// Delay between tranches.
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    /// Minimum spread (in cents) required before tranching kicks in.
    pub min_spread_cents: Decimal,
}

impl Default for GradualEntryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tranches: 3,
            delay: Duration::from_secs(30),
            min_spread_cents: dec!(3),
        }
    }
}

/// Circuit-breaker thresholds (consecutive-failure and daily-loss triggers
/// for each escalation level).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircuitBreakerThresholds {
    pub warn_failures: u32,
    pub caution_failures: u32,
    pub halt_failures: u32,
    pub warn_loss_usd: Decimal,
    pub caution_loss_usd: Decimal,
    pub halt_loss_usd: Decimal,
    /// UTC wall-clock time at which the daily bucket (and failure/loss
    /// counters) resets.
    pub daily_reset_utc: NaiveTime,
}

impl Default for CircuitBreakerThresholds {
    fn default() -> Self {
        Self {
            warn_failures: 3,
            caution_failures: 4,
            halt_failures: 5,
            warn_loss_usd: dec!(50),
            caution_loss_usd: dec!(75),
            halt_loss_usd: dec!(100),
            daily_reset_utc: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        }
    }
}

/// Full, immutable engine configuration (spec.md §6.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Underlying assets monitored (e.g. "BTC", "ETH", "SOL").
    pub assets: Vec<String>,

    /// Minimum `1 - yes_ask - no_ask` spread to emit an opportunity.
    pub min_spread_usd: Decimal,
    /// Fraction of balance allotted per trade before caps.
    pub balance_sizing_pct: Decimal,
    /// Absolute cap on a single trade's budget.
    pub max_trade_size_usd: Decimal,
    /// Reject if a leg's USD notional would fall below this.
    pub min_trade_size_usd: Decimal,
    /// Cumulative USD cap per market per 15-minute window.
    pub max_per_window_usd: Decimal,
    /// Fraction of visible depth a single fill may consume.
    pub max_liquidity_consumption_pct: Decimal,

    /// Joint timeout for dual-leg order placement.
    #[serde(with = "humantime_serde")]
    pub parallel_fill_timeout: Duration,
    /// Age beyond which a market's book is considered stale.
    #[serde(with = "humantime_serde")]
    pub stale_threshold: Duration,

    /// Hedge ratio floor below which a position is considered imbalanced.
    pub rebalance_threshold: Decimal,
    /// Minimum per-share profit required to execute a rebalance leg.
    pub min_rebalance_profit_per_share: Decimal,
    /// Per-position cap on rebalance attempts.
    pub max_rebalance_attempts: u32,
    /// Lockout window before market close during which no rebalance fires.
    #[serde(with = "humantime_serde")]
    pub rebalance_no_go_before_end: Duration,

    /// Delay after `end_time` before a settlement row becomes claimable.
    #[serde(with = "humantime_serde")]
    pub resolution_wait: Duration,
    /// Sell-back limit price used to claim a resolved position.
    pub claim_sell_price: Decimal,
    /// Initial settlement retry backoff.
    #[serde(with = "humantime_serde")]
    pub settlement_base_retry: Duration,
    /// Maximum settlement retry backoff.
    #[serde(with = "humantime_serde")]
    pub settlement_max_retry: Duration,
    /// Consecutive claim failures before emitting `SettlementDegraded`.
    pub alert_after_failures: u32,
    /// Consecutive claim failures before the row is permanently abandoned.
    pub max_claim_attempts: u32,

    /// Circuit breaker escalation thresholds.
    pub circuit_breaker: CircuitBreakerThresholds,
    /// Scheduled trading suspension window.
    pub blackout_window: BlackoutWindow,

    /// When true, no exchange calls are made; trades are simulated.
    pub dry_run: bool,
    /// Tranched-entry parameters.
    pub gradual_entry: GradualEntryConfig,

    /// Decimal places used to quantize share counts.
    pub size_quantization_dp: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            assets: vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()],
            min_spread_usd: dec!(0.02),
            balance_sizing_pct: dec!(0.25),
            max_trade_size_usd: dec!(25.0),
            min_trade_size_usd: dec!(3.0),
            max_per_window_usd: dec!(50.0),
            max_liquidity_consumption_pct: dec!(0.50),
            parallel_fill_timeout: Duration::from_secs(10),
            stale_threshold: Duration::from_secs(10),
            rebalance_threshold: dec!(0.80),
            min_rebalance_profit_per_share: dec!(0.02),
            max_rebalance_attempts: 5,
            rebalance_no_go_before_end: Duration::from_secs(60),
            resolution_wait: Duration::from_secs(600),
            claim_sell_price: dec!(0.99),
            settlement_base_retry: Duration::from_secs(60),
            settlement_max_retry: Duration::from_secs(3600),
            alert_after_failures: 3,
            max_claim_attempts: 5,
            circuit_breaker: CircuitBreakerThresholds::default(),
            blackout_window: BlackoutWindow::default(),
            dry_run: false,
            gradual_entry: GradualEntryConfig::default(),
            size_quantization_dp: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_spec_table() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.assets, vec!["BTC", "ETH", "SOL"]);
        assert_eq!(cfg.min_spread_usd, dec!(0.02));
        assert_eq!(cfg.max_per_window_usd, dec!(50.0));
        assert_eq!(cfg.circuit_breaker.halt_failures, 5);
        assert!(!cfg.dry_run);
    }
}
