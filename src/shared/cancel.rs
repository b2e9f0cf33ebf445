// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Timeout and cancellation bounds for network-bound calls

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of a future raced against a deadline and a cancellation token.
#[derive(Debug, PartialEq, Eq)]
pub enum Bounded<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

/// Run `fut` until it completes, `timeout` elapses, or `cancel` fires.
///
/// Cancellation wins over completion when both are ready. When the future is
/// abandoned its effect on the server is unknown.
pub async fn bounded<F>(fut: F, timeout: Duration, cancel: &CancellationToken) -> Bounded<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Bounded::Cancelled,
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(value) => Bounded::Completed(value),
            Err(_) => Bounded::TimedOut,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let token = CancellationToken::new();
        let outcome = bounded(async { 7 }, Duration::from_secs(1), &token).await;
        assert_eq!(outcome, Bounded::Completed(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let token = CancellationToken::new();
        let slow = tokio::time::sleep(Duration::from_secs(60));
        let outcome = bounded(slow, Duration::from_secs(5), &token).await;
        assert_eq!(outcome, Bounded::TimedOut);
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = bounded(async { 1 }, Duration::from_secs(1), &token).await;
        assert_eq!(outcome, Bounded::Cancelled);
    }
}
