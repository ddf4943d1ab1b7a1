pub mod clock;
pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod error;
pub mod events;
pub mod traits;

pub use clock::{Clock, SystemClock, TestClock};
pub use config::{BlackoutWindow, CircuitBreakerThresholds, EngineConfig, GradualEntryConfig};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use error::StartupError;
pub use events::{CircuitLevel, EngineEvent, RejectReason};
pub use traits::{EventSink, NullEventSink};
