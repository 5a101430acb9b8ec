//! Retry logic with exponential backoff
//!
//! [`RetryPolicy`] answers a single question: "should another attempt be made?"
//! The first `N` calls to [`RetryPolicy::retry`] sleep for
//! `min(2^(attempt-1), cap)` units and return `true`; the next call returns
//! `false`. [`with_retry`] wraps the usual attempt/ask/re-raise loop around it.
//!
//! # Example
//!
//! ```no_run
//! use mongodl::retry::{RetryPolicy, with_retry};
//! use mongodl::error::Error;
//!
//! # async fn example() -> Result<(), Error> {
//! let mut policy = RetryPolicy::new(3);
//! let body = with_retry(&mut policy, || async {
//!     // Your fallible network operation here
//!     Ok::<_, Error>("payload".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transfer problems (transport errors, bad status, truncated or corrupt
/// downloads) return `true`. Catalog and configuration problems return `false`
/// since another attempt would fail the same way.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Anything that went wrong on the wire, including timeouts
            Error::Network(_) => true,
            Error::Http { .. } => true,
            // Truncated or corrupt downloads
            Error::SizeMismatch { .. } => true,
            Error::ChecksumMismatch { .. } => true,
            // Local file I/O and archive reads during an attempt
            Error::Io(_) => true,
            Error::Extraction { .. } => true,
            // Downloaded JSON that failed to parse may be a partial body
            Error::Serialization(_) => true,
            // The cache disagrees with the server; retrying cannot fix it
            Error::CacheInconsistent { .. } => false,
            Error::UnknownArchiveFormat(_) => false,
            Error::InvalidPattern { .. } => false,
            Error::ExtractionEmpty { .. } => false,
            Error::Database(_) | Error::Sqlx(_) => false,
            Error::Config { .. } => false,
            Error::ManifestParse(_) => false,
            Error::MissingTargets(_) => false,
            Error::InvalidVersion(_) => false,
            Error::LookupMiss { .. } => false,
            Error::UnknownComponent(_) => false,
            Error::Platform(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Something that can wait for a duration
///
/// Injected into [`RetryPolicy`] so tests can record delays instead of sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `delay`
    async fn sleep(&self, delay: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Bounded exponential-backoff retry decision
pub struct RetryPolicy {
    retries: u32,
    attempt: u32,
    unit: Duration,
    max_delay_units: u64,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retries", &self.retries)
            .field("attempt", &self.attempt)
            .field("unit", &self.unit)
            .field("max_delay_units", &self.max_delay_units)
            .finish()
    }
}

impl RetryPolicy {
    /// Policy allowing `retries` retries with one-second units and a ten-minute cap
    pub fn new(retries: u32) -> Self {
        Self::from_config(
            &RetryConfig {
                max_retries: retries,
                ..Default::default()
            },
            Arc::new(TokioSleeper),
        )
    }

    /// Policy built from configuration with an explicit sleeper
    pub fn from_config(config: &RetryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            retries: config.max_retries,
            attempt: 0,
            unit: config.unit,
            max_delay_units: config.max_delay_units,
            sleeper,
        }
    }

    /// Replace the sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Number of retries granted so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Delay in units before retry number `attempt` (1-based)
    pub fn delay_units(attempt: u32, max_delay_units: u64) -> u64 {
        let exp = attempt.saturating_sub(1);
        1u64.checked_shl(exp)
            .unwrap_or(u64::MAX)
            .min(max_delay_units)
    }

    /// Decide whether another attempt should be made, sleeping first if so
    pub async fn retry(&mut self) -> bool {
        if self.attempt >= self.retries {
            return false;
        }
        self.attempt += 1;

        let units = Self::delay_units(self.attempt, self.max_delay_units);
        let delay = self
            .unit
            .saturating_mul(u32::try_from(units).unwrap_or(u32::MAX));

        tracing::warn!(
            attempt = self.attempt,
            retries = self.retries,
            delay_ms = delay.as_millis(),
            "Download attempt failed, retrying attempt {} of {}",
            self.attempt,
            self.retries
        );

        self.sleeper.sleep(delay).await;
        true
    }
}

/// Run `operation` until it succeeds or `policy` is exhausted
///
/// Every retryable failure is logged and followed by a call to
/// [`RetryPolicy::retry`]. Once the policy refuses, the last error is returned
/// unchanged. Non-retryable errors are returned immediately.
pub async fn with_retry<F, Fut, T, E>(policy: &mut RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    loop {
        match operation().await {
            Ok(result) => {
                if policy.attempts() > 0 {
                    tracing::info!(
                        attempts = policy.attempts() + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(error = %e, attempt = policy.attempts() + 1, "Attempt failed");
                if !policy.retry().await {
                    tracing::error!(
                        error = %e,
                        attempts = policy.attempts() + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                    return Err(e);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Operation failed with non-retryable error");
                return Err(e);
            }
        }
    }
}
