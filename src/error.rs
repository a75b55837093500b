use thiserror::Error;

use crate::models::AddressError;

/// Top-level error type for the token ledger indexer.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Address {0} is not a contract")]
    NotAContract(String),
}

/// RPC-related errors, classified into transient and permanent failures.
/// Transient failures are retried with exponential backoff; exhausting the
/// retry budget surfaces the last error to the caller.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rate limited by endpoint")]
    RateLimit,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i64, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Timeouts, network errors and server-side failures are transient;
    /// malformed responses and method errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Timeout { .. } => true,
            RpcError::Connection(_) => true,
            RpcError::RateLimit => true,
            RpcError::Status(code) => *code == 429 || *code >= 500,
            RpcError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Decoding failures are scoped to a single field or record: the affected
/// item is skipped and the batch continues.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("Event signature mismatch: {0}")]
    EventSignature(String),

    #[error("Invalid amount payload: {0}")]
    Amount(String),
}

/// Database errors abort the current item only; the run continues with the
/// next item and the failure is counted for observability.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection failed: {0}")]
    Connection(#[from] rusqlite::Error),

    #[error("Database operation failed: {0}")]
    Operation(String),

    #[error("Record not found")]
    NotFound,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, IndexerError>;

impl IndexerError {
    /// Check if the error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            IndexerError::Rpc(e) => e.is_transient(),
            _ => false,
        }
    }
}
