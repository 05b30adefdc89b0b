//! Retrying artifact store calls
//!
//! Store calls are the only thing retried in a run. A failed item is never
//! recomputed here; the next run picks it up because it has no artifact.
//! Only [`StoreError::Unavailable`] and transient I/O are worth another try;
//! a bad key or location fails on the first call.
//!
//! # Example
//!
//! ```no_run
//! use skel_queue::config::RetryConfig;
//! use skel_queue::retry::retry_store;
//! use skel_queue::store::{ArtifactStore, MemoryStore, StoreLocation};
//!
//! # async fn example() -> Result<(), skel_queue::StoreError> {
//! let store = MemoryStore::named(StoreLocation::parse("mem://example")?);
//! retry_store(&RetryConfig::default(), "put", || store.put("1.skel", vec![])).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::StoreError;
use crate::store::StoreResult;
use rand::Rng;
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

impl RetryConfig {
    /// Delay before retry number `retry` (counting from 1), without jitter
    ///
    /// Grows by `backoff_multiplier` per retry and never exceeds `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Whether another attempt at the same store call could succeed
pub fn is_transient(error: &StoreError) -> bool {
    match error {
        StoreError::Unavailable { .. } => true,
        StoreError::Io { source, .. } => matches!(
            source.kind(),
            ErrorKind::TimedOut
                | ErrorKind::Interrupted
                | ErrorKind::WouldBlock
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
                | ErrorKind::BrokenPipe
        ),
        StoreError::UnsupportedScheme { .. }
        | StoreError::InvalidLocation { .. }
        | StoreError::InvalidKey { .. } => false,
    }
}

/// Run a store call, retrying transient failures with backoff
///
/// `op` names the call in logs. At most `policy.max_attempts` retries follow
/// the first call; the last error is returned when they are spent or when
/// the error is permanent.
pub async fn retry_store<T, F, Fut>(
    policy: &RetryConfig,
    op: &'static str,
    mut call: F,
) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut retries = 0;
    loop {
        let error = match call().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::debug!(op, retries, "store call recovered");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !is_transient(&error) || retries >= policy.max_attempts {
            if retries > 0 {
                tracing::warn!(op, retries, error = %error, "store call still failing, giving up");
            }
            return Err(error);
        }

        retries += 1;
        let delay = jittered(policy.backoff(retries), policy.jitter);
        tracing::debug!(
            op,
            retry = retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "store call failed, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Stretch `delay` by a random factor in `[1, 2]`
fn jittered(delay: Duration, enabled: bool) -> Duration {
    if !enabled {
        return delay;
    }
    let factor = 1.0 + rand::thread_rng().gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
}
