use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::Config;
use crate::errors::Error;

/// Time budget for one wait: total timeout plus the sleep between attempts.
/// Each `should*` call owns its own instance; nothing is shared between
/// concurrent waits.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&Config> for RetryConfig {
    fn from(config: &Config) -> Self {
        RetryConfig {
            timeout: config.timeout,
            poll_interval: config.poll_interval,
        }
    }
}

/// Result of a single attempt. Only `NotYet` triggers another poll.
pub enum Outcome<T, D> {
    Satisfied(T),
    NotYet(D),
    Fatal(Error),
}

/// Terminal wait failure: the deadline passed, or an attempt hit a
/// non-retryable error. `TimedOut` carries the last attempt's diagnostic so
/// error rendering needs no further driver calls.
pub enum WaitFailure<D> {
    TimedOut { last: D, elapsed: Duration },
    Fatal(Error),
}

/// Polls `attempt` until it is satisfied, fatal, or the deadline passes.
///
/// The attempt runs at least once even with a zero timeout. After a
/// `NotYet`, the loop stops without sleeping when the next poll interval
/// would land past the deadline, so an interval larger than the remaining
/// budget collapses to the attempts already made.
pub async fn until<T, D, F, Fut>(config: RetryConfig, mut attempt: F) -> Result<T, WaitFailure<D>>
where
    D: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Outcome<T, D>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match attempt().await {
            Outcome::Satisfied(value) => {
                debug!(
                    "wait satisfied after {} attempt(s) in {:?}",
                    attempts,
                    started.elapsed()
                );
                return Ok(value);
            }
            Outcome::Fatal(error) => {
                debug!("wait aborted on attempt {}: {}", attempts, error);
                return Err(WaitFailure::Fatal(error));
            }
            Outcome::NotYet(diagnostic) => {
                if started.elapsed() + config.poll_interval >= config.timeout {
                    debug!(
                        "wait timed out after {} attempt(s) in {:?}: {}",
                        attempts,
                        started.elapsed(),
                        diagnostic
                    );
                    return Err(WaitFailure::TimedOut {
                        last: diagnostic,
                        elapsed: started.elapsed(),
                    });
                }
                trace!("attempt {} not yet satisfied: {}", attempts, diagnostic);
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "wait_test.rs"]
mod wait_test;
