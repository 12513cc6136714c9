/// Shared error type used across all TurnWarden crates.
///
/// The variants mirror the recovery tiers: `Transport`, `Parse` and
/// `InvalidIntent` are recovered through the fallback ladder, `Rules` and
/// `StateCorruption` trigger a transactional rollback, `Fatal` stops the
/// resolution, and `Cancelled` is consumed by the worker exit path.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport: {0}")]
    Transport(String),

    #[error("parse: {0}")]
    Parse(String),

    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    #[error("rules: {0}")]
    Rules(String),

    #[error("state corruption: {0}")]
    StateCorruption(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("cancelled")]
    Cancelled,

    #[error("a resolution is already running")]
    AlreadyRunning,

    #[error("no resolution is running")]
    NotRunning,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
