//! Retrying quest verification.
//!
//! Used right after a user submits a transaction, when the RPC node may not
//! have indexed it yet. A negative answer is retried as well as an error.

use crate::checker::Checker;
use crate::error::Verdict;
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

/// Attempt count and fixed delay for verification retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryOpts {
    /// Total number of attempts, including the first one.
    pub max_retries: u32,
    /// Wait between two attempts. There is no wait after the last one.
    pub delay: Duration,
}

impl Default for RetryOpts {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(2_000),
        }
    }
}

/// Run `attempt` until it reports `Found` or the attempts run out.
///
/// Returns `false` when every attempt came back negative or failed, so
/// "not found yet" and "could not check" look the same to the caller.
pub async fn retry_until_found<F, Fut>(description: &str, attempt: F, opts: RetryOpts) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = Verdict>,
{
    for attempt_number in 1..=opts.max_retries {
        match attempt().await {
            Verdict::Found => {
                info!("Verified {description} on attempt {attempt_number}");
                return true;
            }
            Verdict::NotFound => {
                debug!("{description} not found (attempt {attempt_number})");
            }
            Verdict::Unknown(reason) => {
                warn!("Failed to verify {description} (attempt {attempt_number}): {reason}");
            }
        }
        if attempt_number < opts.max_retries {
            time::sleep(opts.delay).await;
        }
    }
    false
}

/// Verify a quest for `address`, retrying as configured by `opts`.
pub async fn verify_with_retry(checker: &Checker, address: &str, opts: RetryOpts) -> bool {
    let description = format!("{} for {}", checker.id(), address);
    retry_until_found(&description, || checker.verdict(address), opts).await
}
