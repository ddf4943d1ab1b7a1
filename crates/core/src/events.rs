//! Domain events published by every component for observability.
//!
//! `EventSink` is fire-and-forget: consumers (metrics, logs, dashboards)
//! subscribe but correctness of the trading core never depends on a
//! consumer being present or fast. See [`crate::traits::EventSink`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reason the `RiskGate` rejected an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    Blackout,
    Halted,
    CautionEntriesBlocked,
    Duplicate,
    WindowFull,
    InvalidSpread,
    BudgetTooSmall,
    InsufficientLiquidity,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Blackout => "BLACKOUT",
            Self::Halted => "HALTED",
            Self::CautionEntriesBlocked => "CAUTION_ENTRIES_BLOCKED",
            Self::Duplicate => "DUPLICATE",
            Self::WindowFull => "WINDOW_FULL",
            Self::InvalidSpread => "INVALID_SPREAD",
            Self::BudgetTooSmall => "BUDGET_TOO_SMALL",
            Self::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
        };
        write!(f, "{s}")
    }
}

/// Circuit breaker safety level (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CircuitLevel {
    Normal,
    Warning,
    Caution,
    Halt,
}

impl std::fmt::Display for CircuitLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Caution => "CAUTION",
            Self::Halt => "HALT",
        };
        write!(f, "{s}")
    }
}

/// Fan-out domain event. One variant per observable decision/outcome named
/// in spec.md §4.10.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    OpportunityDetected {
        condition_id: String,
        yes_ask: Decimal,
        no_ask: Decimal,
        spread_cents: Decimal,
        at: DateTime<Utc>,
    },
    OpportunityRejected {
        condition_id: String,
        reason: RejectReason,
        at: DateTime<Utc>,
    },
    OpportunityDropped {
        condition_id: String,
        queue_depth: usize,
        at: DateTime<Utc>,
    },
    OrderPlaced {
        trade_id: uuid::Uuid,
        token_id: String,
        limit_price: Decimal,
        size: Decimal,
        at: DateTime<Utc>,
    },
    OrderMatched {
        trade_id: uuid::Uuid,
        token_id: String,
        filled_size: Decimal,
        filled_cost: Decimal,
        at: DateTime<Utc>,
    },
    TradeRecorded {
        trade_id: uuid::Uuid,
        condition_id: String,
        execution_status: String,
        at: DateTime<Utc>,
    },
    CircuitBreakerChanged {
        from: CircuitLevel,
        to: CircuitLevel,
        consecutive_failures: u32,
        daily_pnl: Decimal,
        at: DateTime<Utc>,
    },
    SettlementClaimed {
        trade_id: uuid::Uuid,
        token_id: String,
        proceeds: Decimal,
        profit: Decimal,
        at: DateTime<Utc>,
    },
    SettlementDegraded {
        trade_id: uuid::Uuid,
        token_id: String,
        consecutive_failures: u32,
        at: DateTime<Utc>,
    },
    SettlementAbandoned {
        trade_id: uuid::Uuid,
        token_id: String,
        attempts: u32,
        at: DateTime<Utc>,
    },
    Rebalanced {
        condition_id: String,
        side: String,
        shares: Decimal,
        price: Decimal,
        at: DateTime<Utc>,
    },
    WebsocketReconnected {
        subscriptions: usize,
        at: DateTime<Utc>,
    },
    MarketStale {
        condition_id: String,
        age_ms: i64,
        at: DateTime<Utc>,
    },
    MarketFinderWarning {
        asset: String,
        message: String,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_level_ordering_is_monotonic_escalation() {
        assert!(CircuitLevel::Normal < CircuitLevel::Warning);
        assert!(CircuitLevel::Warning < CircuitLevel::Caution);
        assert!(CircuitLevel::Caution < CircuitLevel::Halt);
    }

    #[test]
    fn test_reject_reason_display() {
        assert_eq!(RejectReason::InvalidSpread.to_string(), "INVALID_SPREAD");
    }
}
