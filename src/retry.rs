//! Bounded retries with exponential backoff for remote calls

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry parameters for one remote-call boundary
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub base_interval: Duration,
}

impl RetryPolicy {
    /// Listing and download calls against the report API
    pub fn report_api() -> Self {
        Self {
            max_tries: 3,
            base_interval: Duration::from_millis(500),
        }
    }

    /// Writes to the object store; minimum 1s before the first retry
    pub fn object_store_api() -> Self {
        Self {
            max_tries: 3,
            base_interval: Duration::from_secs(1),
        }
    }
}

/// Run `op` up to `max_tries` times, sleeping `base_interval * 2^(attempt-1)`
/// between attempts while the failure is in the retryable set. The last error
/// is surfaced once the failure is non-retryable or attempts are exhausted.
pub async fn with_retries<T, E, Fut, Op, R>(
    policy: &RetryPolicy,
    context: &str,
    is_retryable: R,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(context, attempt, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= policy.max_tries || !is_retryable(&err) {
                    return Err(err);
                }

                let backoff = policy.base_interval * 2u32.pow(attempt - 1);
                warn!(context, attempt, error = %err, "Call failed, retrying");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Retryable-failure set for the report API: connection refused, connection
/// reset and TLS handshake failures. Handshake errors surface through
/// `is_connect`; refused/reset can also appear as io errors deeper in the
/// source chain.
pub fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_connect() {
        return true;
    }

    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset
            ) {
                return true;
            }
        }
        source = cause.source();
    }

    false
}
