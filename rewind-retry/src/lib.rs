//! Unified retry and backoff logic for rewind store operations
//!
//! This crate provides the retry policies and backoff schedules shared by
//! the artifact store adapters and the recovery orchestrator.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Classifies errors as transient (worth retrying) or permanent.
///
/// Store adapters implement this for their error type so callers can share
/// one retry loop without knowing which backend produced the failure.
pub trait Transient {
    /// Returns true if the error is transient and the operation should be retried
    fn is_transient(&self) -> bool;

    /// Returns true if the error is permanent and retries should stop
    fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Execute an async operation, retrying transient failures on the given
/// backoff schedule.
///
/// Permanent failures return immediately. Transient failures sleep for the
/// next interval of `policy` and retry until the policy's elapsed-time
/// budget runs out, at which point the last error is returned.
pub async fn with_backoff<T, E, F, Fut>(
    op_name: &'static str,
    mut policy: ExponentialBackoff,
    mut f: F,
) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    policy.reset();
    let mut attempt: u32 = 1;

    loop {
        debug!(operation = op_name, attempt, "attempting operation");

        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = op_name,
                        attempt, "operation succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() => match policy.next_backoff() {
                Some(delay) => {
                    warn!(
                        operation = op_name,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    warn!(
                        operation = op_name,
                        attempt,
                        error = %err,
                        "transient failure, retry budget exhausted"
                    );
                    return Err(err);
                }
            },
            Err(err) => {
                warn!(
                    operation = op_name,
                    attempt,
                    error = %err,
                    "permanent failure, not retrying"
                );
                return Err(err);
            }
        }
    }
}

/// Default backoff policy for general store operations
pub fn store_policy() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(100))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(Duration::from_secs(30)))
        .with_multiplier(2.0)
        .build()
}

/// Backoff policy for artifact downloads during recovery
///
/// Downloads are on the fatal path of a recovery run, so the budget is
/// longer than for general store calls.
pub fn download_policy() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(10))
        .with_max_elapsed_time(Some(Duration::from_secs(60)))
        .with_multiplier(1.5)
        .build()
}
