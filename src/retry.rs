//! Fixed-delay retry for media fetches
//!
//! Media hosts occasionally drop connections during bulk downloads. A failed
//! fetch is retried after a fixed pause (one retry after 60 seconds by
//! default); there is no exponential back-off and no jitter.
//!
//! # Example
//!
//! ```no_run
//! use coub_archive::config::RetryConfig;
//! use coub_archive::retry::with_fixed_retry;
//!
//! # async fn example() -> Result<(), String> {
//! let config = RetryConfig::default();
//! let body = with_fixed_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, String>(vec![0u8; 4])
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use std::future::Future;

/// Run `operation`, retrying it up to `config.retries` times after `config.delay`
///
/// Every error is treated as transient. Returns the first success or the
/// error of the last attempt.
pub async fn with_fixed_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if attempt < config.retries => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    retries = config.retries,
                    delay_ms = config.delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(config.delay).await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempts = attempt + 1,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(e);
            }
        }
    }
}
