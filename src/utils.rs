use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use backoff::{future::retry, ExponentialBackoff};
use log::warn;
use crate::verify::VerifyError;

/// Run `f`, sending it again up to `retries` more times while it fails transiently.
pub async fn retry_wrapper<I, F, Fut>(retries: usize, f: F) -> Result<I, VerifyError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<I, VerifyError>>,
{
    let cur_times = AtomicUsize::new(0);
    let (cur_times, f) = (&cur_times, &f);
    retry(backoff_config(), || async move {
        let prev_times = cur_times.fetch_add(1, Ordering::AcqRel);
        let times = prev_times + 1;
        if times > 1 {
            warn!("retrying for the {} time", times);
        }
        f().await
            .map_err(|err| map_to_backoff_err(err, times, retries))
    })
        .await
}

fn map_to_backoff_err(err: VerifyError, cur_times: usize, retries: usize) -> backoff::Error<VerifyError> {
    if err.is_transient() && cur_times <= retries {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

#[inline]
fn backoff_config() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_millis(5000),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let calls = &AtomicUsize::new(0);
        let result = retry_wrapper(2, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(VerifyError::Transport("connection reset".to_string()))
            } else {
                Ok("ok")
            }
        })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = &AtomicUsize::new(0);
        let result: Result<(), _> = retry_wrapper(3, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(VerifyError::Status(400))
        })
            .await;
        assert!(matches!(result, Err(VerifyError::Status(400))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_retries_means_one_attempt() {
        let calls = &AtomicUsize::new(0);
        let result: Result<(), _> = retry_wrapper(0, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(VerifyError::Transport("timed out".to_string()))
        })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
