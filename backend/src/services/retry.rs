//! Bounded retry for optimistic-lock conflicts

use std::future::Future;
use std::time::Duration;

use crate::config::TransferConfig;
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before attempt n+1 is `backoff * n`
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            attempts: config.conflict_retry_attempts.max(1),
            backoff: Duration::from_millis(config.conflict_retry_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

/// Run `op`, re-running it while it fails with a retryable conflict.
/// Any other error, or the last conflict, is returned as is.
pub async fn with_conflict_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < policy.attempts => {
                tracing::warn!(attempt, max_attempts = policy.attempts, error = %err, "Retrying after conflict");
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
