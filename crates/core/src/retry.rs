//! Bounded retry with Fibonacci backoff.

use std::time::Duration;

use crate::Error;

/// Leading Fibonacci terms skipped so the first wait is already substantial (13 units).
const SKIPPED_TERMS: usize = 6;

/// Retry policy for transient request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Length of one backoff unit.
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, unit: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), unit }
    }

    /// Wait before retry number `retry` (0-based): 13, 21, 34, ... units.
    pub fn delay(&self, retry: u32) -> Duration {
        self.unit.saturating_mul(fibonacci(SKIPPED_TERMS + retry as usize))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> Result<T, Error>) -> Result<T, Error> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let wait = self.delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "backing off {:.1} seconds after {} tries for {}: {}",
                        wait.as_secs_f64(),
                        attempt,
                        what,
                        e
                    );
                    std::thread::sleep(wait);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Terms of 1, 1, 2, 3, 5, ... (0-based index), saturating.
fn fibonacci(n: usize) -> u32 {
    let (mut a, mut b) = (1u32, 1u32);
    for _ in 0..n {
        (a, b) = (b, a.saturating_add(b));
    }
    a
}
