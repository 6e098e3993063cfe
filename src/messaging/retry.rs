//! Bounded retry with a fixed delay between attempts.
//!
//! The policy makes at most `max_retries + 1` invocations of an operation,
//! sleeping `interval` between consecutive failed invocations. The sleep is
//! not interruptible: inside a reader it deliberately stalls the fetching of
//! later records until the current one is resolved.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default number of additional attempts after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Retry budget applied to the processing of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    interval: Duration,
}

/// Returned when every attempt allowed by the policy has failed.
#[derive(Debug)]
pub struct Exhausted<E> {
    /// Number of invocations made, always `max_retries + 1`.
    pub attempts: u32,
    /// Error returned by the final invocation.
    pub last_error: E,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_retries` retries spaced by `interval`.
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Number of retries after the first failure.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs `operation` until it succeeds or the budget is spent.
    ///
    /// The closure receives the 1-based attempt number. On success the
    /// number of invocations made is returned.
    ///
    /// # Example
    ///
    /// ```rust
    /// use missy::messaging::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let policy = RetryPolicy::new(2, Duration::ZERO);
    /// let attempts = policy
    ///     .run(|attempt| async move {
    ///         if attempt < 3 { Err("not yet") } else { Ok(()) }
    ///     })
    ///     .await
    ///     .unwrap();
    /// assert_eq!(attempts, 3);
    /// # }
    /// ```
    pub async fn run<F, Fut, E>(&self, mut operation: F) -> Result<u32, Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let mut retries: u32 = 0;
        loop {
            let attempt = retries.saturating_add(1);
            match operation(attempt).await {
                Ok(()) => return Ok(attempt),
                Err(error) => {
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "attempt failed"
                    );
                    if retries >= self.max_retries {
                        return Err(Exhausted {
                            attempts: attempt,
                            last_error: error,
                        });
                    }
                    retries += 1;
                    if !self.interval.is_zero() {
                        tokio::time::sleep(self.interval).await;
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL)
    }
}
