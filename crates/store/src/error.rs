use thiserror::Error;

/// Errors surfaced by the `Store` interface.
///
/// Per spec.md §7 ("Store failure"), a write failure here must never be
/// silently discarded: the executor treats any `StoreError` as transient
/// and raises it to the circuit breaker rather than proceeding to enqueue
/// settlement or register a position.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("row not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Conflict(String),
}
