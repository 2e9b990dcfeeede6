//! Bounded retry policy for outbound provider calls.
//!
//! Policy: at most [`MAX_ATTEMPTS`] attempts with a fixed [`RETRY_DELAY_MS`]
//! pause between them, and only for transient (connectivity-class) failures.
//! The delay is an async sleep inside the event's own handling task, so other
//! events keep flowing while one call backs off.

use super::ProviderError;
use std::future::Future;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

/// Fixed pause before the second attempt.
pub const RETRY_DELAY_MS: u64 = 1000;
/// Total attempts, including the first.
pub const MAX_ATTEMPTS: usize = 2;

/// Run a provider call under the retry policy.
///
/// # Errors
///
/// Returns the final `ProviderError` once the attempt budget is exhausted, or
/// immediately for non-transient failures.
pub async fn call_with_retry<F, Fut, T>(operation: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let strategy = FixedInterval::from_millis(RETRY_DELAY_MS).take(MAX_ATTEMPTS - 1);
    RetryIf::spawn(strategy, operation, ProviderError::is_transient).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    async fn flaky(
        attempts: &AtomicUsize,
        transient_failures: usize,
    ) -> Result<&'static str, ProviderError> {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        if n < transient_failures {
            Err(ProviderError::Network("connection reset".to_string()))
        } else {
            Ok("ok")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_retries_once_with_backoff() -> Result<(), ProviderError> {
        let attempts = AtomicUsize::new(0);
        let started = Instant::now();
        let result = call_with_retry(|| flaky(&attempts, 1)).await?;
        assert_eq!(result, "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        // Exactly one 1s backoff sleep was observed (auto-advanced time).
        assert_eq!(started.elapsed().as_millis(), u128::from(RETRY_DELAY_MS));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn second_transient_failure_is_final() {
        let attempts = AtomicUsize::new(0);
        let result = call_with_retry(|| flaky(&attempts, 5)).await;
        assert!(matches!(result, Err(ProviderError::Network(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failure_never_sleeps() {
        let attempts = AtomicUsize::new(0);
        let started = Instant::now();
        let result: Result<(), _> = call_with_retry(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Api("bad prompt".to_string()))
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Api(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed().as_millis(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_success_needs_one_attempt() -> Result<(), ProviderError> {
        let attempts = AtomicUsize::new(0);
        let result = call_with_retry(|| flaky(&attempts, 0)).await?;
        assert_eq!(result, "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
