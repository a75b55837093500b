pub mod abi;
pub mod blockchain;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod reconciler;
pub mod retry;

pub use blockchain::{ContractClassifier, LogScanner, RpcClient};
pub use config::{AppConfig, DatabaseConfig, LoggingConfig, RpcConfig, ScannerConfig};
pub use database::Database;
pub use engine::{ScanEngine, ScanReport};
pub use error::{IndexerError, Result};
pub use rate_limit::RateLimiter;
pub use reconciler::{ApplyOutcome, Reconciler};
pub use retry::{RetryConfig, RetryManager};
