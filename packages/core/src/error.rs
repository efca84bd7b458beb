//! Error taxonomy shared across the workspace.

use std::io;
use std::time::Duration;

/// Convenience alias for results produced by this workspace.
pub type Result<T, E = HttpFsError> = std::result::Result<T, E>;

/// Errors raised by HTTP/S filesystems, paths and channels.
///
/// Every network-facing operation funnels its failures into this single type
/// so that callers have one recovery surface. Which variants count as
/// transient is decided by [`crate::settings::RetrySettings`].
#[derive(Debug, thiserror::Error)]
pub enum HttpFsError {
    /// Operation on a channel after it was closed.
    #[error("channel is closed")]
    ClosedChannel,

    /// Write or truncate attempted on a read-only channel.
    #[error("channel is not writable")]
    NonWritableChannel,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A string could not be interpreted as an HTTP/S path.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A path or URI belonging to a different provider was presented.
    #[error("provider mismatch: {0}")]
    ProviderMismatch(String),

    #[error("file system already exists for {0}")]
    FileSystemAlreadyExists(String),

    #[error("no file system registered for {0}")]
    FileSystemNotFound(String),

    /// HTTP 404 on open or HEAD.
    #[error("file not found at {0} (http 404 response)")]
    FileNotFound(String),

    /// HTTP 401, 403 or 407 on an existence or access check.
    #[error("access denied to {uri} (http status {code})")]
    AccessDenied { uri: String, code: u16 },

    /// 200 where 206 was expected, or vice versa.
    #[error("{message}")]
    IncompatibleRangeResponse { code: u16, message: String },

    /// Any other response code that is not specially handled.
    #[error("{message}")]
    UnexpectedStatus { code: u16, message: String },

    /// A failure that could have been retried was, until the retry budget
    /// ran out.
    #[error("all {retries} retries failed, waited a total of {} ms between attempts", total_wait.as_millis())]
    OutOfRetries {
        /// Number of retries attempted before giving up.
        retries: u32,
        /// Total time slept between attempts.
        total_wait: Duration,
        /// The most recent underlying failure.
        #[source]
        cause: Box<HttpFsError>,
    },

    /// A wire-level failure, wrapped with call-site context.
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("{0}")]
    Io(#[from] io::Error),
}

impl HttpFsError {
    /// The HTTP status code carried by an unexpected-response error.
    ///
    /// Range-mismatch errors are a refinement of the unexpected-response
    /// case and report their code here as well.
    pub fn response_code(&self) -> Option<u16> {
        match self {
            HttpFsError::UnexpectedStatus { code, .. }
            | HttpFsError::IncompatibleRangeResponse { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<HttpFsError> for io::Error {
    fn from(err: HttpFsError) -> Self {
        let kind = match &err {
            HttpFsError::FileNotFound(_) => io::ErrorKind::NotFound,
            HttpFsError::AccessDenied { .. } => io::ErrorKind::PermissionDenied,
            HttpFsError::InvalidArgument(_) | HttpFsError::InvalidPath { .. } => {
                io::ErrorKind::InvalidInput
            }
            HttpFsError::UnsupportedOperation(_) | HttpFsError::NonWritableChannel => {
                io::ErrorKind::Unsupported
            }
            HttpFsError::ClosedChannel => io::ErrorKind::NotConnected,
            HttpFsError::Io(e) => e.kind(),
            _ => io::ErrorKind::Other,
        };
        match err {
            HttpFsError::Io(e) => e,
            err => io::Error::new(kind, err),
        }
    }
}
