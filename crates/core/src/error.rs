use thiserror::Error;

/// Fatal startup errors. Per spec.md §7, these are the only errors allowed
/// to abort the process; everything past startup is caught and converted
/// to an outcome value or a logged-and-continue loop iteration.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("store initialization failed: {0}")]
    StoreInit(String),
}
