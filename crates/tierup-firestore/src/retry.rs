//! Retry policy with exponential backoff and jitter.
//!
//! Opt-in: callers wrap an operation with [`crate::FirestoreClient::with_retry`].
//! Single document reads and writes issued by the client are never retried
//! implicitly.

use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_retry;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env_u64 = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        Self {
            max_retries: env_u64("FIRESTORE_RETRY_MAX_ATTEMPTS", defaults.max_retries as u64) as u32,
            base_delay_ms: env_u64("FIRESTORE_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: env_u64("FIRESTORE_RETRY_MAX_MS", defaults.max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// A server-provided Retry-After wins. Otherwise `base * 2^attempt`, capped
    /// at `max_delay_ms`, with full jitter and a floor of `base_delay_ms`.
    pub fn delay_for(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        if let Some(after) = retry_after_ms {
            return Duration::from_millis(after);
        }

        let exp_delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped = exp_delay.min(self.max_delay_ms);

        let jittered = (capped as f64 * jitter_factor()) as u64;
        Duration::from_millis(jittered.max(self.base_delay_ms.min(capped)))
    }
}

/// Pseudo-random factor in [0, 1) from the clock's sub-second nanos.
fn jitter_factor() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

/// Execute an async operation, retrying transient failures.
///
/// Retries network errors, 429 (honoring Retry-After) and 5xx responses.
/// Everything else is returned immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> FirestoreResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = FirestoreResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        let span = info_span!("firestore_retry", operation = %operation, attempt = attempt + 1);

        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay_for(attempt, e.retry_after_ms());

                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Firestore operation failed, retrying: {}",
                    e
                );
                record_retry(operation);

                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| FirestoreError::request_failed("Retries exhausted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[test]
    fn test_delay_with_retry_after() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0, Some(2000)), Duration::from_millis(2000));
    }

    #[test]
    fn test_delay_respects_max() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 2000,
        };
        assert!(config.delay_for(10, None) <= Duration::from_millis(2000));
        assert!(config.delay_for(u32::MAX, None) <= Duration::from_millis(2000));
    }

    #[test]
    fn test_delay_minimum() {
        let config = RetryConfig::default();
        assert!(config.delay_for(0, None) >= Duration::from_millis(config.base_delay_ms));
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_server_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(&fast_config(), "test", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FirestoreError::from_http_status(503, "unavailable"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: FirestoreResult<()> = with_retry(&fast_config(), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FirestoreError::from_http_status(500, "boom"))
        })
        .await;

        assert!(matches!(result, Err(FirestoreError::ServerError(500, _))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_skips_non_retryable() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: FirestoreResult<()> = with_retry(&fast_config(), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FirestoreError::from_http_status(403, "denied"))
        })
        .await;

        assert!(matches!(result, Err(FirestoreError::PermissionDenied(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
