//! Retry controller for vendor calls.
//!
//! Fixed delay between attempts, no backoff and no jitter. Every failure is
//! classified first: context-length failures end the loop without an error,
//! fatal failures end it with one, and transient ones are retried until the
//! attempt budget runs out.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::client::VendorError;
use crate::error::{Error, Result};
use crate::metrics::{API_ATTEMPTS, API_FAILURES};

/// Vendor text that marks a prompt too long for the model.
pub const CONTEXT_LENGTH_MARKER: &str = "maximum context length";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    ContextLengthExceeded,
    Fatal,
}

/// The only place vendor error text is inspected.
pub fn classify(err: &VendorError) -> FailureKind {
    if err.message.contains(CONTEXT_LENGTH_MARKER) {
        return FailureKind::ContextLengthExceeded;
    }
    match err.status {
        // rejected credentials won't get better by waiting
        Some(401) | Some(403) => FailureKind::Fatal,
        _ => FailureKind::Transient,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Success(Value),
    ContextLengthExceeded,
}

impl RetryOutcome {
    pub fn into_response(self) -> Option<Value> {
        match self {
            RetryOutcome::Success(v) => Some(v),
            RetryOutcome::ContextLengthExceeded => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Runs `call` until it succeeds or hits a terminal failure.
    pub async fn run<F, Fut>(&self, mut call: F) -> Result<RetryOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<Value, VendorError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            API_ATTEMPTS.inc();

            let err = match call().await {
                Ok(response) => return Ok(RetryOutcome::Success(response)),
                Err(err) => err,
            };
            API_FAILURES.inc();
            warn!(attempt, max_attempts, "Exception occurred in API: {}", err);

            match classify(&err) {
                FailureKind::ContextLengthExceeded => {
                    warn!("prompt exceeds the model's context window, giving up");
                    return Ok(RetryOutcome::ContextLengthExceeded);
                }
                FailureKind::Fatal => return Err(Error::Api(err)),
                FailureKind::Transient if attempt >= max_attempts => {
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                FailureKind::Transient => {
                    info!("Retrying after {:?}...", self.delay);
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
