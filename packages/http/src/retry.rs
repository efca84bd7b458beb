//! Policy-driven retry engine for transient HTTP failures.

use std::error::Error;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use log::warn;
use url::Url;

use httpfs_core::error::{HttpFsError, Result};
use httpfs_core::settings::{RetrySettings, RetryableKind};

use crate::cause::CauseChain;

/// Tells a [`RetryHandler::try_once_then_with_retries`] closure whether it is
/// running the first attempt (resource state untouched) or a retry, which
/// must perform its compensating action (typically a reopen) first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retry,
}

/// Classifies failures and drives a bounded retry loop with exponential
/// backoff, bound to the URI it reports about.
#[derive(Debug, Clone)]
pub struct RetryHandler {
    settings: RetrySettings,
    uri: Url,
}

impl RetryHandler {
    pub fn new(settings: RetrySettings, uri: Url) -> Self {
        Self { settings, uri }
    }

    /// The maximum number of retries before giving up.
    pub fn max_retries(&self) -> u32 {
        self.settings.max_retries
    }

    /// Runs `to_run` up to `max_retries + 1` times.
    ///
    /// Retryable failures are logged, slept on and retried; anything else is
    /// surfaced immediately. Functions may run repeatedly, so state changed
    /// by an unsuccessful attempt must not poison later ones. When the
    /// budget runs out the last failure is wrapped in
    /// [`HttpFsError::OutOfRetries`] together with the attempt count and the
    /// total time slept.
    pub fn run_with_retries<T>(&self, mut to_run: impl FnMut() -> Result<T>) -> Result<T> {
        let mut total_sleep = Duration::ZERO;
        let mut tries: u32 = 0;
        loop {
            tries += 1;
            let err = match to_run() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !self.is_retryable(&err) {
                return Err(err);
            }
            warn!(
                "retrying connection to {} due to error: {}; this will be retry #{}",
                self.uri, err, tries
            );
            total_sleep += sleep_before_next_attempt(tries);
            if tries > self.settings.max_retries {
                return Err(HttpFsError::OutOfRetries {
                    retries: tries - 1,
                    total_wait: total_sleep,
                    cause: Box::new(err),
                });
            }
        }
    }

    /// Runs `to_run(Attempt::First)` once. On a retryable failure, falls
    /// back to `run_with_retries(|| to_run(Attempt::Retry))`; a
    /// non-retryable failure is surfaced immediately.
    ///
    /// The first attempt may have mutated resource state (a partial read, a
    /// partial skip) that a plain retry cannot safely repeat; the `Retry`
    /// branch of the closure is expected to compensate, typically by
    /// reopening.
    pub fn try_once_then_with_retries<T>(
        &self,
        mut to_run: impl FnMut(Attempt) -> Result<T>,
    ) -> Result<T> {
        match to_run(Attempt::First) {
            Ok(value) => Ok(value),
            Err(err) if self.is_retryable(&err) => {
                warn!(
                    "retrying connection to {} after an initial failure: {}",
                    self.uri, err
                );
                self.run_with_retries(|| to_run(Attempt::Retry))
            }
            Err(err) => Err(err),
        }
    }

    /// Whether any cause in the failure chain matches the configured
    /// retryable HTTP codes, failure kinds, message substrings or the user
    /// predicate.
    pub fn is_retryable(&self, err: &HttpFsError) -> bool {
        for cause in CauseChain::new(err) {
            if let Some(fs_err) = cause.downcast_ref::<HttpFsError>() {
                if let Some(code) = fs_err.response_code() {
                    if self.settings.retryable_codes.contains(&code) {
                        return true;
                    }
                }
            }
            if self
                .settings
                .retryable_kinds
                .iter()
                .any(|kind| kind_matches(*kind, cause))
            {
                return true;
            }
            let message = cause.to_string();
            if self
                .settings
                .retryable_messages
                .iter()
                .any(|needle| message.contains(needle.as_str()))
            {
                return true;
            }
            if let Some(predicate) = &self.settings.retry_predicate {
                if predicate(cause) {
                    return true;
                }
            }
        }
        false
    }
}

fn kind_matches(kind: RetryableKind, cause: &(dyn Error + 'static)) -> bool {
    match kind {
        RetryableKind::Timeout => {
            cause
                .downcast_ref::<reqwest::Error>()
                .is_some_and(|e| e.is_timeout())
                || cause
                    .downcast_ref::<io::Error>()
                    .is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
        }
        RetryableKind::UnexpectedEof => cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::UnexpectedEof),
        RetryableKind::Socket => {
            cause
                .downcast_ref::<reqwest::Error>()
                .is_some_and(|e| e.is_connect())
                || cause.downcast_ref::<io::Error>().is_some_and(|e| {
                    matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionRefused
                            | io::ErrorKind::BrokenPipe
                            | io::ErrorKind::NotConnected
                    )
                })
        }
        // the blocking client stack exposes no typed TLS error to downcast
        // to, so match on the rendered message
        RetryableKind::Tls => {
            let message = cause.to_string().to_ascii_lowercase();
            message.contains("tls") || message.contains("ssl") || message.contains("certificate")
        }
    }
}

/// Exponential backoff in milliseconds, capped at `2^7`. Returns the time
/// actually slept.
fn sleep_before_next_attempt(attempt: u32) -> Duration {
    let delay = Duration::from_millis(1u64 << attempt.min(7));
    let start = Instant::now();
    thread::sleep(delay);
    start.elapsed()
}
