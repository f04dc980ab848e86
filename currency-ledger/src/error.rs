//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing public key at transaction construction
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Signature does not verify against the source key
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Operation not permitted for this transaction kind
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Empty or otherwise unusable currency identifier
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    /// Source account cannot cover the requested amount
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Wire or snapshot serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Snapshot could not be loaded or parsed
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Consensus channel failure (proposal intake closed, terminal error feed)
    #[error("consensus error: {0}")]
    Consensus(String),

    /// Concurrency error (apply loop gone, channel closed)
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}
