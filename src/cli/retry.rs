//! Transport retry for the CLI layer

use crate::infrastructure::constants::{RETRY_MAX_DELAY_SECS, RETRY_MIN_DELAY_MILLIS};
use crate::shared::error::KubeError;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff policy for retryable failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: usize) -> Self {
        Self {
            retries,
            min_delay: Duration::from_millis(RETRY_MIN_DELAY_MILLIS),
            max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
        }
    }

    pub fn with_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay.max(min_delay);
        self
    }

    fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.retries)
            .build()
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy is exhausted. Cancellation during a backoff wait returns the
/// last error.
pub async fn retry_retryable<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, KubeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, KubeError>>,
{
    let mut delays = policy.backoff();
    let mut attempt = 1usize;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_retryable() || cancel.is_cancelled() {
            return Err(err);
        }
        let Some(delay) = delays.next() else {
            return Err(err);
        };

        tracing::warn!(attempt, ?delay, error = %err, "retrying after transport failure");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(err),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
