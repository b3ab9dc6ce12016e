use std::thread;
use std::time::Duration;

use tracing::warn;

const BACKOFF_STEP: Duration = Duration::from_secs(2);

pub(crate) trait Pause {
    fn pause(&mut self, duration: Duration);
}

pub(crate) struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum RetryError<E> {
    Exhausted { attempts: u32, last: E },
    Fatal { attempt: u32, error: E },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    max_retries: u32,
    backoff_step: Duration,
}

impl RetryPolicy {
    pub(crate) fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_step: BACKOFF_STEP,
        }
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    pub(crate) fn run<T, E, F, R>(
        &self,
        pause: &mut dyn Pause,
        mut operation: F,
        is_retryable: R,
    ) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
        R: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(error) if !is_retryable(&error) => {
                    return Err(RetryError::Fatal { attempt, error });
                }
                Err(error) if attempt >= max_attempts => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }
                Err(error) => {
                    let backoff = self.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "attempt failed; backing off"
                    );
                    pause.pause(backoff);
                    attempt += 1;
                }
            }
        }
    }
}
