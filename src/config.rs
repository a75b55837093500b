use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub database: DatabaseConfig,
    pub scanner: ScannerConfig,
    pub logging: LoggingConfig,
}

/// RPC client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Chain node JSON-RPC endpoint URL
    pub endpoint: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum number of attempts per call
    pub max_retries: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file path
    pub path: String,
}

/// Log scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Fixed window size in blocks for each eth_getLogs query
    pub window_size: u64,
    /// Courtesy delay between windows in milliseconds
    pub window_delay_ms: u64,
    /// Number of contracts scanned concurrently
    pub workers: usize,
    /// Shared rate limit across all workers, requests per second
    pub rate_limit_per_sec: f64,
    /// Block to start from when a contract has no checkpoint and no known
    /// creation block
    pub genesis_block: u64,
    /// Seconds to wait between full scan passes
    pub poll_interval_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            database: DatabaseConfig::default(),
            scanner: ScannerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            timeout_seconds: 30,
            max_retries: 5,
            retry_delay_ms: 2_000,
            max_retry_delay_ms: 30_000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./ledger.db".to_string(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            window_delay_ms: 100,
            workers: 4,
            rate_limit_per_sec: 10.0,
            genesis_block: 0,
            poll_interval_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables take precedence over file values.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::FileNotFound(config_path.clone()))?;
        let config: AppConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = env::var("NODE_URL") {
            self.rpc.endpoint = endpoint;
        }
        if let Ok(timeout) = env::var("RPC_TIMEOUT_SECONDS") {
            self.rpc.timeout_seconds = parse_env("RPC_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Ok(retries) = env::var("RPC_MAX_RETRIES") {
            self.rpc.max_retries = parse_env("RPC_MAX_RETRIES", &retries)?;
        }
        if let Ok(path) = env::var("DATABASE_PATH") {
            self.database.path = path;
        }
        if let Ok(size) = env::var("SCAN_WINDOW_SIZE") {
            self.scanner.window_size = parse_env("SCAN_WINDOW_SIZE", &size)?;
        }
        if let Ok(workers) = env::var("SCAN_WORKERS") {
            self.scanner.workers = parse_env("SCAN_WORKERS", &workers)?;
        }
        if let Ok(interval) = env::var("SCAN_POLL_INTERVAL") {
            self.scanner.poll_interval_seconds = parse_env("SCAN_POLL_INTERVAL", &interval)?;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc.endpoint.starts_with("http://") && !self.rpc.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.rpc.endpoint.clone()));
        }
        if self.rpc.timeout_seconds == 0 || self.rpc.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.timeout_seconds".to_string(),
                value: self.rpc.timeout_seconds.to_string(),
            });
        }
        if self.rpc.max_retries == 0 || self.rpc.max_retries > 20 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.max_retries".to_string(),
                value: self.rpc.max_retries.to_string(),
            });
        }
        if self.scanner.window_size == 0 || self.scanner.window_size > 10_000 {
            return Err(ConfigError::InvalidValue {
                key: "scanner.window_size".to_string(),
                value: self.scanner.window_size.to_string(),
            });
        }
        if self.scanner.workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scanner.workers".to_string(),
                value: self.scanner.workers.to_string(),
            });
        }
        if self.scanner.rate_limit_per_sec <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "scanner.rate_limit_per_sec".to_string(),
                value: self.scanner.rate_limit_per_sec.to_string(),
            });
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "database.path".to_string(),
                value: self.database.path.clone(),
            });
        }
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.rpc.endpoint, "http://localhost:8545");
        assert_eq!(config.scanner.window_size, 50);
        assert_eq!(config.scanner.workers, 4);
        assert_eq!(config.database.path, "./ledger.db");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.rpc.endpoint = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.scanner.window_size = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.scanner.workers = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let original = AppConfig::default();
        let text = toml::to_string_pretty(&original).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();

        assert_eq!(original.rpc.endpoint, parsed.rpc.endpoint);
        assert_eq!(original.scanner.window_size, parsed.scanner.window_size);
        assert_eq!(original.database.path, parsed.database.path);
    }

    #[test]
    fn test_invalid_env_values() {
        let result: Result<u64, _> = parse_env("RPC_TIMEOUT_SECONDS", "not-a-number");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
