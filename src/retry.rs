//! Bounded retry with doubling backoff
//!
//! Wraps a single fallible async operation in an explicit attempt loop.
//! Used for the audit-trail write, which must tolerate transient sink
//! failures without ever blocking the user-visible response.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Ceiling for the backoff delay between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Run `op` up to `attempts` times, sleeping `base` (doubling, capped)
/// between failures. Returns the first success or the last error.
pub async fn with_backoff<T, F, Fut>(attempts: u32, base: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = base;
    let mut last_err = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(attempt, max = attempts, error = %e, "retryable operation failed");
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::Internal("retry invoked with zero attempts".to_string())))
}
