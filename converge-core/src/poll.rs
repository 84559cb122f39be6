//! Consistency poller.
//!
//! A successful create does not mean the object can be read back yet. The
//! poller retries a read under a bounded [`PollPolicy`] until it succeeds,
//! the attempts run out, permission is denied or the caller cancels.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RemoteError;

/// Delay schedule between attempts. Delays never decrease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    Fixed {
        interval_ms: u64,
    },
    Exponential {
        initial_ms: u64,
        max_ms: u64,
        #[serde(default = "default_multiplier")]
        multiplier: u32,
    },
}

fn default_multiplier() -> u32 {
    2
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Backoff {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed { interval_ms } => Duration::from_millis(interval_ms),
            Backoff::Exponential {
                initial_ms,
                max_ms,
                multiplier,
            } => {
                let factor = u64::from(multiplier.max(1)).saturating_pow(attempt.saturating_sub(1));
                let delay = initial_ms.saturating_mul(factor).min(max_ms.max(initial_ms));
                Duration::from_millis(delay)
            }
        }
    }
}

/// Bounded retry policy for visibility polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Total read attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Upper bound on the summed delays.
    #[serde(default)]
    pub max_elapsed_ms: Option<u64>,
}

impl PollPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed {
                interval_ms: millis(interval),
            },
            max_elapsed_ms: None,
        }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                initial_ms: millis(initial),
                max_ms: millis(max),
                multiplier: default_multiplier(),
            },
            max_elapsed_ms: None,
        }
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed_ms = Some(millis(max_elapsed));
        self
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_ms.map(Duration::from_millis)
    }

    /// Longest total time the policy can spend sleeping.
    pub fn wait_bound(&self) -> Duration {
        let schedule = (1..self.max_attempts.max(1))
            .map(|attempt| self.backoff.delay(attempt))
            .fold(Duration::ZERO, Duration::saturating_add);
        match self.max_elapsed() {
            Some(max) => schedule.min(max),
            None => schedule,
        }
    }

    /// Post-create default: 10 attempts, 0.5s doubling to 5s, at most 60s.
    pub fn create_default() -> Self {
        Self::exponential(10, Duration::from_millis(500), Duration::from_secs(5))
            .with_max_elapsed(Duration::from_secs(60))
    }

    /// Post-update re-check default: 3 attempts, 1s apart.
    pub fn recheck_default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::create_default()
    }
}

/// Why polling stopped without a successful read.
#[derive(Debug, Error)]
pub enum PollError {
    /// Attempts or time budget exhausted, or permission denied.
    #[error("not visible after {attempts} attempts: {last}")]
    Timeout {
        attempts: u32,
        #[source]
        last: RemoteError,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Suspends the poller between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retries reads until they succeed under a bounded policy.
#[derive(Clone)]
pub struct Poller {
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(sleeper: Arc<dyn Sleeper>, cancel: CancellationToken) -> Self {
        Self { sleeper, cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Call `read` until it returns `Ok`.
    ///
    /// Any error counts as "not visible yet", except
    /// [`RemoteError::PermissionDenied`], which stops immediately. The last
    /// error is returned in [`PollError::Timeout`] once the policy is
    /// exhausted. Cancellation is checked before every attempt and during
    /// every sleep.
    pub async fn poll_until_visible<T, F, Fut>(
        &self,
        policy: &PollPolicy,
        mut read: F,
    ) -> Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut slept = Duration::ZERO;
        let mut attempt = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let err = match read().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "object visible");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if err.is_permission_denied() {
                warn!(attempt, error = %err, "permission denied while polling");
                return Err(PollError::Timeout {
                    attempts: attempt,
                    last: err,
                });
            }
            if attempt >= max_attempts {
                warn!(attempt, error = %err, "poll attempts exhausted");
                return Err(PollError::Timeout {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = policy.backoff.delay(attempt);
            if let Some(max) = policy.max_elapsed()
                && slept.saturating_add(delay) > max
            {
                warn!(attempt, slept_ms = millis(slept), "poll time budget exhausted");
                return Err(PollError::Timeout {
                    attempts: attempt,
                    last: err,
                });
            }

            debug!(
                attempt,
                delay_ms = millis(delay),
                error = %err,
                "not visible yet, retrying"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(PollError::Cancelled { attempts: attempt });
                }
                _ = self.sleeper.sleep(delay) => {}
            }
            slept = slept.saturating_add(delay);
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Arc::new(TokioSleeper), CancellationToken::new())
    }
}

/// Sleeper that returns immediately and records the requested delays.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: std::sync::Mutex<Vec<Duration>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` once `sleeps` sleeps have been requested.
    pub fn cancelling(token: CancellationToken, sleeps: usize) -> Self {
        Self {
            delays: Default::default(),
            cancel_after: Some((sleeps, token)),
        }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut delays = self
                .delays
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            delays.push(duration);
            delays.len()
        };
        if let Some((after, token)) = &self.cancel_after
            && count >= *after
        {
            token.cancel();
        }
    }
}
