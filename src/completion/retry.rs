use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Delay before the attempt following `attempt` (1-based): base * 2^(attempt-1) plus jitter, capped
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let backoff_ms = config.backoff_base_ms.saturating_mul(1u64 << exponent);
    let jitter = if config.backoff_base_ms > 0 {
        rand::random::<u64>() % config.backoff_base_ms
    } else {
        0
    };
    Duration::from_millis(backoff_ms.saturating_add(jitter).min(config.backoff_max_ms))
}

/// Execute an async operation with capped, jittered exponential backoff
///
/// Errors for which `is_retryable` is false end the loop at once without
/// consuming the remaining attempts. The operation receives the 1-based
/// attempt number.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    config: &RetryConfig,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation(attempts).await {
            Ok(result) => return Ok(result),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) if attempts >= config.retries_per_credential => {
                warn!("All {} attempts failed: {}", attempts, e);
                return Err(e);
            }
            Err(e) => {
                let delay = backoff_delay(config, attempts);

                warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    attempts, e, delay
                );

                sleep(delay).await;
            }
        }
    }
}
