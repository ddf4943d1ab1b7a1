pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod traits;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use models::{
    CircuitBreakerRow, CircuitLevelCode, ExecutionStatus, LegOrderStatus, OutcomeSide,
    SettlementEntry, TradeRecord,
};
pub use postgres::PostgresStore;
pub use traits::Store;
