// Copyright 2025 RISC Zero, Inc.
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

use std::{fmt::Display, future::Future, time::Duration};

/// Attempts used for ordinary chain reads.
pub const DEFAULT_ATTEMPTS: u32 = 3;
/// Upper bound on attempts, used for expensive aggregate queries.
pub const MAX_ATTEMPTS: u32 = 5;
/// Base delay; the pause before attempt `i` is `i * base`.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(150);

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: DEFAULT_ATTEMPTS, base_delay: DEFAULT_BASE_DELAY }
    }
}

impl RetryPolicy {
    /// `attempts` is clamped to `1..=MAX_ATTEMPTS`.
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self { attempts: attempts.clamp(1, MAX_ATTEMPTS), base_delay }
    }

    pub fn with_attempts(self, attempts: u32) -> Self {
        Self::new(attempts, self.base_delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Pause taken before the given 1-based attempt. The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.base_delay * attempt
        }
    }

    /// Run `op` until it succeeds or the attempts run out.
    ///
    /// The error of the final attempt is returned unchanged and no delay follows it.
    pub async fn execute<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.attempts => return Err(err),
                Err(err) => {
                    attempt += 1;
                    let delay = self.delay_before(attempt);
                    tracing::warn!(
                        "Attempt {} of {} failed: {}; retrying in {}ms",
                        attempt - 1,
                        self.attempts,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn attempts_are_clamped() {
        assert_eq!(RetryPolicy::new(0, DEFAULT_BASE_DELAY).attempts(), 1);
        assert_eq!(RetryPolicy::new(9, DEFAULT_BASE_DELAY).attempts(), MAX_ATTEMPTS);
        assert_eq!(RetryPolicy::default().with_attempts(4).attempts(), 4);
    }

    #[test]
    fn delay_is_linear_in_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(200));
        assert_eq!(policy.delay_before(3), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(150));
        let start = Instant::now();

        let result: Result<u32, String> = policy
            .execute(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call < 3 {
                        Err(format!("flaky {call}"))
                    } else {
                        Ok(call)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2 * 150ms before the second attempt, 3 * 150ms before the third.
        assert_eq!(start.elapsed(), Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_without_trailing_delay() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(100));
        let start = Instant::now();

        let result: Result<(), String> = policy
            .execute(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("failure {call}")) }
            })
            .await;

        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }
}
