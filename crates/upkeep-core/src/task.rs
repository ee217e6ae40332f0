use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use upkeep_backend::UpdateError;

/// Sleep for `duration`, returning `false` if `cancel` fired first.
pub async fn sleep_or_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

/// Await a collaborator call bounded by `timeout` and by `cancel`.
pub async fn run_guarded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    operation: &'static str,
    future: F,
) -> Result<T, UpdateError>
where
    F: Future<Output = Result<T, UpdateError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(UpdateError::Cancelled { operation }),
        result = tokio::time::timeout(timeout, future) => match result {
            Ok(result) => result,
            Err(_) => Err(UpdateError::Timeout {
                operation,
                seconds: timeout.as_secs(),
            }),
        },
    }
}
