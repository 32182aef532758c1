use crate::core::errors::ExchangeError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// A sequence ran and a new connection is live
    Reconnected,
    /// Another sequence was already in progress; nothing was done
    NotAttempting,
}

/// Bounded, single-flight reconnection driver
///
/// Only one sequence runs at a time: `attempting` is claimed with a
/// compare-and-swap and every other caller gets `NotAttempting` right away.
/// Between failed attempts the delay is `base × 2^n`, `n` being the number of
/// failures so far.
#[derive(Debug)]
pub struct ReconnectManager {
    attempting: AtomicBool,
    current_retry: AtomicU32,
    max_retries: u32,
    base_delay: Duration,
}

/// Releases the single-flight claim however the sequence ends
struct AttemptGuard<'a> {
    manager: &'a ReconnectManager,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.manager.current_retry.store(0, Ordering::Release);
        self.manager.attempting.store(false, Ordering::Release);
    }
}

impl ReconnectManager {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            attempting: AtomicBool::new(false),
            current_retry: AtomicU32::new(0),
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    pub fn is_attempting(&self) -> bool {
        self.attempting.load(Ordering::Acquire)
    }

    pub fn current_retry(&self) -> u32 {
        self.current_retry.load(Ordering::Acquire)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delays slept after the 1st, 2nd, ... failed attempt
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::from_millis(2).factor(self.base_delay.as_millis() as u64)
    }

    fn try_begin(&self) -> Option<AttemptGuard<'_>> {
        self.attempting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AttemptGuard { manager: self })
    }

    /// Run one reconnect sequence
    ///
    /// `attempt` is called with the 1-based attempt number and performs a full
    /// close → open → authenticate → replay cycle.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> Result<ReconnectOutcome, ExchangeError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), ExchangeError>>,
    {
        let Some(_guard) = self.try_begin() else {
            debug!("Reconnection already in progress");
            return Ok(ReconnectOutcome::NotAttempting);
        };

        let mut delays = self.backoff();
        loop {
            let attempt_no = self.current_retry() + 1;
            info!(
                attempt = attempt_no,
                max_attempts = self.max_retries,
                "Reconnection attempt"
            );

            match attempt(attempt_no).await {
                Ok(()) => {
                    info!(attempt = attempt_no, "Reconnection successful");
                    return Ok(ReconnectOutcome::Reconnected);
                }
                Err(e) => {
                    let failed = self.current_retry.fetch_add(1, Ordering::AcqRel) + 1;
                    if failed >= self.max_retries {
                        error!(error = %e, "Maximum reconnection attempts reached");
                        return Err(ExchangeError::FatalReconnectError {
                            attempts: self.max_retries,
                        });
                    }

                    let delay = delays.next().unwrap_or(self.base_delay);
                    warn!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnection failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
