//! Bounded retry for read-modify-write sequences that may lose an insert race.

use crate::error::{MetadataError, MetadataResult};
use std::future::Future;

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` attempts have failed with retryable errors.
///
/// `op` receives the 1-based attempt number and must re-read whatever state
/// it depends on; nothing is carried over between attempts.
pub async fn run_with_retry<T, F, Fut, P>(
    max_attempts: u32,
    is_retryable: P,
    mut op: F,
) -> MetadataResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = MetadataResult<T>>,
    P: Fn(&MetadataError) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) => {
                if attempt >= max_attempts {
                    return Err(MetadataError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                tracing::debug!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Retrying after retryable store error"
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_retryable_failures() {
        let calls = AtomicU32::new(0);
        let result = run_with_retry(3, MetadataError::is_unique_violation, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(MetadataError::UniqueViolation("k".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_reported() {
        let result: MetadataResult<()> =
            run_with_retry(2, MetadataError::is_unique_violation, |_| async {
                Err(MetadataError::UniqueViolation("k".to_string()))
            })
            .await;
        match result {
            Err(MetadataError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 2);
                assert!(source.is_unique_violation());
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: MetadataResult<()> =
            run_with_retry(5, MetadataError::is_unique_violation, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(MetadataError::NotFound("k".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(MetadataError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let result = run_with_retry(0, MetadataError::is_unique_violation, |_| async {
            Ok::<_, MetadataError>(7)
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
    }
}
