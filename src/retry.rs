use std::time::Duration;

use log::{info, warn};
use tokio::time::sleep;

use crate::error::IndexerError;

/// Configuration for retry behavior. Backoff state lives inside a single
/// `execute` call, so concurrent workers back off independently.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Retry profile for RPC calls against the shared endpoint.
    pub fn for_rpc() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry mechanism with exponential backoff.
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    /// Execute an operation, retrying transient failures. Non-recoverable
    /// errors abort immediately; exhausting the attempt budget surfaces the
    /// last error.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, IndexerError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, IndexerError>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.config.max_attempts {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            "{} succeeded on attempt {} of {}",
                            self.operation_name, attempt, self.config.max_attempts
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_recoverable() {
                        return Err(error);
                    }

                    if attempt >= self.config.max_attempts {
                        last_error = Some(error);
                        break;
                    }

                    let delay = self.calculate_delay(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {}ms: {}",
                        self.operation_name,
                        attempt,
                        self.config.max_attempts,
                        delay.as_millis(),
                        error
                    );
                    sleep(delay).await;
                    last_error = Some(error);
                }
            }
        }

        let final_error = last_error.unwrap_or_else(|| {
            IndexerError::Rpc(crate::error::RpcError::InvalidResponse(
                "all retry attempts exhausted".to_string(),
            ))
        });
        warn!(
            "{}: all {} attempts failed: {}",
            self.operation_name, self.config.max_attempts, final_error
        );
        Err(final_error)
    }

    /// Calculate delay for the given attempt number.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay_ms as f64;
        let exponential = base * self.config.backoff_multiplier.powi(attempt as i32 - 1);
        let capped = exponential.min(self.config.max_delay_ms as f64);

        let final_delay = if self.config.jitter {
            let jitter = capped * 0.1 * (rand::random::<f64>() - 0.5);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(final_delay as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 100,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let manager = RetryManager::new("test_operation", no_jitter(3));
        let result = manager.execute(|| async { Ok::<i32, IndexerError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_transient_error_retried_until_success() {
        let manager = RetryManager::new("test_operation", no_jitter(5));
        let calls = AtomicU32::new(0);

        let result = manager
            .execute(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err(IndexerError::Rpc(RpcError::Timeout { seconds: 1 }))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_non_recoverable_error_aborts_immediately() {
        let manager = RetryManager::new("test_operation", no_jitter(5));
        let calls = AtomicU32::new(0);

        let result = manager
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<i32, IndexerError>(IndexerError::NotAContract("0xabc".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausting_retries_surfaces_last_error() {
        let manager = RetryManager::new("test_operation", no_jitter(2));
        let result = manager
            .execute(|| async {
                Err::<i32, IndexerError>(IndexerError::Rpc(RpcError::Status(503)))
            })
            .await;

        match result {
            Err(IndexerError::Rpc(RpcError::Status(503))) => {}
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        let manager = RetryManager::new("test", config);

        assert_eq!(manager.calculate_delay(1).as_millis(), 2_000);
        assert_eq!(manager.calculate_delay(2).as_millis(), 4_000);
        assert_eq!(manager.calculate_delay(3).as_millis(), 8_000);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay_ms: 5_000,
            max_delay_ms: 20_000,
            backoff_multiplier: 3.0,
            jitter: false,
        };
        let manager = RetryManager::new("test", config);
        assert_eq!(manager.calculate_delay(5).as_millis(), 20_000);
    }
}
