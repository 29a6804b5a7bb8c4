//! Bounded retry decorator for per-item operations.
//!
//! The dispatcher runs every item exactly once. Callers that want retries wrap
//! their operation with [`with_retry`] before handing it over; an item that
//! exhausts its attempts then fails like any other item. An item timeout set
//! on the dispatcher bounds all attempts together.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

/// Delay schedule between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Same delay every time
    Fixed(Duration),
    /// `base + increment * (attempt - 1)`
    Linear {
        /// Delay before the second attempt
        base: Duration,
        /// Added for every further attempt
        increment: Duration,
    },
    /// `base * multiplier^(attempt - 1)`, capped at `max`
    Exponential {
        /// Delay before the second attempt
        base: Duration,
        /// Growth factor per attempt
        multiplier: f64,
        /// Upper bound on any single delay
        max: Duration,
    },
}

/// How many times to try an operation and how long to wait in between
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; values below 1 mean 1
    pub max_attempts: u32,
    /// Delay schedule
    pub backoff: BackoffStrategy,
    /// Add up to 10% random delay to spread out retries
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                base: Duration::from_millis(100),
                multiplier: 2.0,
                max: Duration::from_secs(10),
            },
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::Fixed(Duration::ZERO),
            jitter: false,
        }
    }

    /// `max_attempts` attempts with a fixed delay and no jitter
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Fixed(delay),
            jitter: false,
        }
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based), without jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let step = attempt.saturating_sub(1);
        match &self.backoff {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Linear { base, increment } => {
                base.saturating_add(increment.saturating_mul(step))
            }
            BackoffStrategy::Exponential { base, multiplier, max } => {
                let secs = base.as_secs_f64() * multiplier.powi(step.min(i32::MAX as u32) as i32);
                if secs.is_finite() && secs >= 0.0 {
                    Duration::from_secs_f64(secs.min(max.as_secs_f64()))
                } else {
                    *max
                }
            }
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let jitter_ms = (delay.as_millis() as f64 * rand::random::<f64>() * 0.1) as u64;
        delay + Duration::from_millis(jitter_ms)
    }
}

/// Wrap `operation` so each call retries per `policy`, returning the last
/// error once attempts run out.
pub fn with_retry<I, T, E, F, Fut>(
    operation: F,
    policy: RetryPolicy,
) -> impl Fn(I) -> BoxFuture<'static, Result<T, E>> + Send + Sync + 'static
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let operation = Arc::new(operation);

    move |item: I| {
        let operation = Arc::clone(&operation);
        let policy = policy.clone();

        async move {
            let max_attempts = policy.attempts();
            let mut attempt = 1;

            loop {
                match operation(item.clone()).await {
                    Ok(value) => {
                        if attempt > 1 {
                            debug!(attempt = attempt, "Operation succeeded after retry");
                        }
                        return Ok(value);
                    }
                    Err(error) if attempt >= max_attempts => {
                        warn!(attempts = attempt, error = %error, "Operation failed after all retries");
                        return Err(error);
                    }
                    Err(error) => {
                        let delay = policy.jittered(policy.delay_for(attempt));
                        warn!(
                            attempt = attempt,
                            max_attempts = max_attempts,
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "Operation failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        }
        .boxed()
    }
}
