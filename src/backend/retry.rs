//! Read retry policy: a read-only lookup that fails transiently is attempted
//! exactly once more. Writes never go through here.

use std::future::Future;

use tracing::warn;

use crate::error::BackendError;

/// Run a read-only backend call, retrying once on a transient failure.
pub async fn read_with_retry<T, F, Fut>(operation: &str, mut call: F) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    match call().await {
        Err(e) if e.is_transient() => {
            warn!(operation, error = %e, "Transient read failure, retrying once");
            call().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result = read_with_retry("test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(BackendError::Transient("reset".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_transient_failure() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<(), _> = read_with_retry("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Transient("down".into()))
        })
        .await;
        assert!(matches!(result, Err(BackendError::Transient(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_transient_failure_is_not_retried() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<(), _> = read_with_retry("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Unexpected("bad row".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
