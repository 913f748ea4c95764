//! Retry of store writes that lose a race to a superseding request.

use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

use super::StoreResult;
use crate::config::RetryPolicy;

/// Runs `op`, retrying on cancellation errors up to the policy's attempt
/// limit with a fixed backoff between attempts.
///
/// Non-cancellation errors are returned immediately.
pub async fn retry_on_cancel<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_cancellation() && attempt < attempts => {
                debug!("{label}: cancelled on attempt {attempt}/{attempts}, retrying");
                tokio::time::sleep(Duration::from_millis(policy.backoff_ms)).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_cancellation() {
                    warn!("{label}: still cancelled after {attempts} attempts: {err}");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ErrorContext, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_cancellations() {
        let calls = AtomicUsize::new(0);
        let result = retry_on_cancel(&fast_policy(), "unhide", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::cancelled("superseded", ErrorContext::default()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: StoreResult<()> = retry_on_cancel(&fast_policy(), "unhide", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::cancelled("superseded", ErrorContext::default()))
        })
        .await;
        assert!(result.unwrap_err().is_cancellation());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: StoreResult<()> = retry_on_cancel(&fast_policy(), "unhide", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::not_found("gone", ErrorContext::default()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
