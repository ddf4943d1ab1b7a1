//! Persisted row types for the `trades`, `settlement_queue`, and
//! `circuit_breaker_state` tables (spec.md §6.4).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of a binary market a row refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum OutcomeSide {
    Yes,
    No,
}

impl std::fmt::Display for OutcomeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// Terminal classification of a dual-leg execution (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "snake_case")]
pub enum ExecutionStatus {
    FullFill,
    OneLegOnly,
    Failed,
    Simulated,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FullFill => "full_fill",
            Self::OneLegOnly => "one_leg_only",
            Self::Failed => "failed",
            Self::Simulated => "simulated",
        };
        write!(f, "{s}")
    }
}

/// A single leg's terminal order status, as recorded on the trade row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegOrderStatus {
    Matched,
    Failed,
    Exception,
    Simulated,
}

/// A durable record of one dual-leg (or single-leg) execution attempt.
///
/// Every order outcome that produced any filled shares produces exactly
/// one of these (spec.md §3 invariant, Testable Property 5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub condition_id: String,
    pub asset: String,
    pub yes_token_id: String,
    pub no_token_id: String,

    pub intended_yes_shares: Decimal,
    pub intended_no_shares: Decimal,
    pub actual_yes_shares: Decimal,
    pub actual_no_shares: Decimal,

    pub intended_cost: Decimal,
    pub actual_cost: Decimal,

    pub yes_limit_price: Decimal,
    pub no_limit_price: Decimal,

    pub execution_status: ExecutionStatus,
    pub yes_order_status: LegOrderStatus,
    pub no_order_status: LegOrderStatus,

    /// `min(yes_shares, no_shares) / max(yes_shares, no_shares)`, 0 if one side is 0.
    pub hedge_ratio: Decimal,

    /// Pre-fill depth snapshot, captured before placement, for later analysis.
    pub yes_depth_pre: Decimal,
    pub no_depth_pre: Decimal,

    pub dry_run: bool,
}

impl TradeRecord {
    /// Computes `hedge_ratio` from actual fills: 0 if either side is zero.
    #[must_use]
    pub fn compute_hedge_ratio(yes_shares: Decimal, no_shares: Decimal) -> Decimal {
        let max = yes_shares.max(no_shares);
        if max == Decimal::ZERO {
            return Decimal::ZERO;
        }
        let min = yes_shares.min(no_shares);
        if min == Decimal::ZERO {
            return Decimal::ZERO;
        }
        min / max
    }
}

/// A durable row tracking one filled leg awaiting settlement claim.
///
/// Keyed by `(trade_id, token_id)`. Append-only from the executor; mutated
/// only by the settlement manager (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEntry {
    pub trade_id: Uuid,
    pub token_id: String,
    pub side: OutcomeSide,
    pub shares: Decimal,
    pub entry_price: Decimal,
    pub entry_cost: Decimal,
    pub market_end_time: DateTime<Utc>,

    pub claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_proceeds: Option<Decimal>,
    pub claim_profit: Option<Decimal>,

    pub claim_attempts: u32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl SettlementEntry {
    /// Creates a fresh, unclaimed settlement row for a just-filled leg.
    #[must_use]
    pub fn new(
        trade_id: Uuid,
        token_id: impl Into<String>,
        side: OutcomeSide,
        shares: Decimal,
        entry_price: Decimal,
        market_end_time: DateTime<Utc>,
    ) -> Self {
        let token_id = token_id.into();
        Self {
            trade_id,
            token_id,
            side,
            shares,
            entry_price,
            entry_cost: shares * entry_price,
            market_end_time,
            claimed: false,
            claimed_at: None,
            claim_proceeds: None,
            claim_profit: None,
            claim_attempts: 0,
            last_error: None,
            next_attempt_at: None,
        }
    }

    /// Whether this row is eligible to be claimed right now.
    #[must_use]
    pub fn is_claimable(&self, now: DateTime<Utc>, resolution_wait: chrono::Duration, max_attempts: u32) -> bool {
        if self.claimed || self.claim_attempts >= max_attempts {
            return false;
        }
        if now < self.market_end_time + resolution_wait {
            return false;
        }
        match self.next_attempt_at {
            Some(next) => now >= next,
            None => true,
        }
    }
}

/// Persisted circuit breaker state (spec.md §3, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerRow {
    pub level: CircuitLevelCode,
    pub consecutive_failures: u32,
    pub daily_pnl: Decimal,
    pub day_bucket: chrono::NaiveDate,
}

/// Plain-data mirror of `arb_core::CircuitLevel`, kept independent so this
/// crate does not need to depend on `arb-core` for a four-variant enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum CircuitLevelCode {
    Normal,
    Warning,
    Caution,
    Halt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_hedge_ratio_balanced() {
        assert_eq!(TradeRecord::compute_hedge_ratio(dec!(20), dec!(20)), dec!(1));
    }

    #[test]
    fn test_hedge_ratio_one_sided_is_zero() {
        assert_eq!(TradeRecord::compute_hedge_ratio(dec!(20), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_hedge_ratio_imbalanced() {
        assert_eq!(TradeRecord::compute_hedge_ratio(dec!(100), dec!(80)), dec!(0.8));
    }

    #[test]
    fn test_settlement_entry_claimable_respects_wait_and_backoff() {
        let end = DateTime::parse_from_rfc3339("2026-01-01T00:15:00Z").unwrap().with_timezone(&Utc);
        let entry = SettlementEntry::new(Uuid::new_v4(), "tok", OutcomeSide::Yes, dec!(20), dec!(0.48), end);
        let wait = chrono::Duration::minutes(10);

        let too_early = end + chrono::Duration::minutes(5);
        assert!(!entry.is_claimable(too_early, wait, 5));

        let ready = end + chrono::Duration::minutes(11);
        assert!(entry.is_claimable(ready, wait, 5));
    }

    #[test]
    fn test_settlement_entry_not_claimable_after_max_attempts() {
        let end = Utc::now();
        let mut entry = SettlementEntry::new(Uuid::new_v4(), "tok", OutcomeSide::No, dec!(20), dec!(0.48), end);
        entry.claim_attempts = 5;
        assert!(!entry.is_claimable(end + chrono::Duration::hours(1), chrono::Duration::minutes(10), 5));
    }
}
