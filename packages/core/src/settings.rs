//! Configuration for HTTP/S filesystems, clients and retry behavior.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// User-supplied retry classification, applied to every cause in a failure
/// chain in addition to the built-in rules.
pub type RetryPredicate = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

/// Redirect-following policy for the HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    /// Never follow redirects.
    Never,
    /// Follow redirects, except from an HTTPS URL to an HTTP URL.
    #[default]
    Normal,
    /// Always follow redirects.
    Always,
}

/// Coarse classes of transient failure, matched against every cause in an
/// error chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryableKind {
    /// TLS negotiation or certificate failures.
    Tls,
    /// The stream ended before the expected number of bytes.
    UnexpectedEof,
    /// Socket-level failures: reset, aborted, refused, broken pipe.
    Socket,
    /// Connect or request timeouts.
    Timeout,
}

/// Controls how failures are classified and how often they are retried.
#[derive(Clone)]
pub struct RetrySettings {
    /// Number of retries after the initial attempt; 0 means a single try.
    pub max_retries: u32,
    /// HTTP status codes treated as transient.
    pub retryable_codes: HashSet<u16>,
    /// Failure classes treated as transient.
    pub retryable_kinds: HashSet<RetryableKind>,
    /// Substrings matched against each cause's message.
    pub retryable_messages: Vec<String>,
    /// Extra user classification, additive to the built-in rules.
    pub retry_predicate: Option<RetryPredicate>,
}

impl RetrySettings {
    /// Status codes retried by default.
    pub const DEFAULT_RETRYABLE_CODES: [u16; 3] = [500, 502, 503];

    /// Failure classes retried by default.
    pub const DEFAULT_RETRYABLE_KINDS: [RetryableKind; 4] = [
        RetryableKind::Tls,
        RetryableKind::UnexpectedEof,
        RetryableKind::Socket,
        RetryableKind::Timeout,
    ];

    /// Messages retried by default. Bad data coming back mid-request
    /// surfaces as a protocol error in the client stack.
    pub const DEFAULT_RETRYABLE_MESSAGES: [&'static str; 1] = ["protocol error:"];
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retryable_codes: Self::DEFAULT_RETRYABLE_CODES.into_iter().collect(),
            retryable_kinds: Self::DEFAULT_RETRYABLE_KINDS.into_iter().collect(),
            retryable_messages: Self::DEFAULT_RETRYABLE_MESSAGES
                .iter()
                .map(|message| message.to_string())
                .collect(),
            retry_predicate: None,
        }
    }
}

impl fmt::Debug for RetrySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySettings")
            .field("max_retries", &self.max_retries)
            .field("retryable_codes", &self.retryable_codes)
            .field("retryable_kinds", &self.retryable_kinds)
            .field("retryable_messages", &self.retryable_messages)
            .field("retry_predicate", &self.retry_predicate.is_some())
            .finish()
    }
}

/// Settings controlling newly created filesystems, channels and clients.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Connection timeout for the HTTP client.
    pub timeout: Duration,
    /// Redirect-following policy.
    pub redirect: RedirectPolicy,
    /// Retry configuration.
    pub retry: RetrySettings,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            redirect: RedirectPolicy::Normal,
            retry: RetrySettings::default(),
        }
    }
}
