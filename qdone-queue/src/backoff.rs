//! Exponential-backoff controller (component A).
//!
//! A pure, stateless-between-calls retry driver: construct once from
//! [`qdone_common::Options`] and call [`Backoff::run`] per action. No attempt
//! count survives across calls — that bookkeeping belongs to whichever
//! caller needs it (the enqueue pipeline does not need it at all; each send
//! is independent). The delay formula is grounded on the sibling MTA's
//! `calculate_next_retry_time`, adapted from a wall-clock deadline to a
//! plain sleep duration and from `2^(attempt-1)` to the configurable
//! `base^attempt` this design calls for.

use std::{future::Future, time::Duration};

use qdone_common::Result;
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub max_retries: u32,
    pub jitter_fraction: f64,
    pub base: f64,
}

impl Backoff {
    #[must_use]
    pub const fn new(max_retries: u32, jitter_fraction: f64, base: f64) -> Self {
        Self {
            max_retries,
            jitter_fraction,
            base,
        }
    }

    #[must_use]
    pub fn from_options(options: &qdone_common::Options) -> Self {
        Self::new(options.send_retries, options.jitter_fraction, options.backoff_base)
    }

    /// Runs `action` until it succeeds, `should_retry` says to stop, or
    /// `max_retries` attempts have been made. Attempt numbers passed to
    /// `action` start at 1.
    pub async fn run<T, A, Fut, S>(&self, mut action: A, should_retry: S) -> Result<T>
    where
        A: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        S: Fn(&Result<T>) -> bool,
    {
        let mut attempt = 1u32;
        loop {
            let outcome = action(attempt).await;
            let retry_wanted = should_retry(&outcome);
            if retry_wanted && attempt < self.max_retries {
                tokio::time::sleep(self.delay_for(attempt)).await;
                attempt += 1;
                continue;
            }
            return outcome;
        }
    }

    /// `round(base^attempt * (1 + jitterFraction*(random-0.5)) * 1000)` ms.
    fn delay_for(&self, attempt: u32) -> Duration {
        let nominal = self.base.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let jitter = self.jitter_fraction * (rand::rng().random::<f64>() - 0.5);
        let millis = (nominal * (1.0 + jitter) * 1000.0).round().max(0.0);
        Duration::from_millis(millis as u64)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(3, 0.5, 2.0)
    }
}
