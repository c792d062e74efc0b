//! Startup connection retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use common::{AppError, AppResult, RetryConfig};

/// Delay before retry number `attempt` (1-based), capped at the policy maximum.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let millis = config.initial_delay_ms as f64 * config.multiplier.powi(exponent);
    Duration::from_millis(millis.min(config.max_delay_ms as f64) as u64)
}

/// Run `connect` until it succeeds or the attempts run out.
///
/// Exhaustion is reported as [`AppError::Unavailable`] naming `service`
/// and the last error seen.
pub async fn connect_with_retry<T, E, F, Fut>(
    service: &str,
    config: &RetryConfig,
    mut connect: F,
) -> AppResult<T>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match connect().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                tracing::error!(service, attempt, error = %e, "Giving up connecting");
                return Err(AppError::unavailable(format!("{service}: {e}")));
            }
            Err(e) => {
                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    service,
                    attempt,
                    max_attempts = attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 1.5,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig::default();

        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(1500));
        assert_eq!(backoff_delay(&config, 3), Duration::from_millis(2250));
        assert_eq!(backoff_delay(&config, 40), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let value = connect_with_retry("db", &fast_policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("refused")
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_unavailable() {
        let calls = AtomicU32::new(0);

        let err = connect_with_retry::<(), _, _, _>("cache", &fast_policy(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("refused") }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Unavailable(ref msg) if msg.contains("refused")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
