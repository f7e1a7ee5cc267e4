//! Retry wrapper for WS calls.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::WsError;
use crate::http::RetryConfig;

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. Backoff sleeps end early on cancellation.
pub async fn with_retry<T, F, Fut>(
    retry: &RetryConfig,
    cancel: Option<&CancellationToken>,
    label: &str,
    mut op: F,
) -> Result<T, WsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WsError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = retry.delay_for_attempt(attempt);
                attempt += 1;
                tracing::warn!(
                    "{}: {}; retry {}/{} in {}ms",
                    label,
                    e,
                    attempt,
                    retry.max_retries,
                    delay.as_millis()
                );
                match cancel {
                    Some(token) => tokio::select! {
                        _ = token.cancelled() => return Err(WsError::Interrupted),
                        _ = tokio::time::sleep(delay) => {}
                    },
                    None => tokio::time::sleep(delay).await,
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::RequestId;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            jitter: false,
            ..RetryConfig::default()
        }
    }

    fn timeout() -> WsError {
        WsError::Timeout {
            id: RequestId::new(1),
            after_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(3), None, "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(timeout())
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(2), None, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(timeout())
        })
        .await;
        assert!(matches!(result, Err(WsError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(5), None, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(WsError::Closed(RequestId::new(1)))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let token = CancellationToken::new();
        token.cancel();
        let slow = RetryConfig {
            initial_delay: Duration::from_secs(60),
            ..fast(3)
        };
        let result: Result<(), _> =
            with_retry(&slow, Some(&token), "test", || async { Err(timeout()) }).await;
        assert!(matches!(result, Err(WsError::Interrupted)));
    }
}
