//! Read-only HTTP/S filesystem identified by `(scheme, authority)`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use crate::error::{HttpFsError, Result};
use crate::path::{self, HttpPath};

/// Separator for the path component of an HTTP/S URL.
pub const SEPARATOR: &str = "/";

/// URL scheme served by a provider. HTTP and HTTPS filesystems behave
/// identically; the scheme is the only per-provider variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Parses a scheme string, case-insensitively.
    pub fn of(scheme: &str) -> Option<Scheme> {
        if scheme.eq_ignore_ascii_case("http") {
            Some(Scheme::Http)
        } else if scheme.eq_ignore_ascii_case("https") {
            Some(Scheme::Https)
        } else {
            None
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A read-only filesystem for one authority of one scheme.
///
/// Filesystems are immutable and always open; they are owned by their
/// provider's authority map and live for the process.
#[derive(Debug)]
pub struct HttpFileSystem {
    scheme: Scheme,
    authority: String,
}

impl HttpFileSystem {
    pub fn new(scheme: Scheme, authority: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            scheme,
            authority: authority.into(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// The `host[:port]` (with optional userinfo) this filesystem serves.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Always `true`: open connections are not tracked, so the filesystem
    /// cannot be closed.
    pub fn is_open(&self) -> bool {
        true
    }

    /// No-op; an HTTP/S filesystem is always open.
    pub fn close(&self) {
        log::warn!(
            "http filesystem for {}://{} is always open (close is a no-op)",
            self.scheme,
            self.authority
        );
    }

    pub fn is_read_only(&self) -> bool {
        true
    }

    pub fn separator(&self) -> &'static str {
        SEPARATOR
    }

    /// The root path, representing `scheme://authority` with no path
    /// component.
    pub fn root(self: &Arc<Self>) -> HttpPath {
        HttpPath::with_bytes(self.clone(), Bytes::new(), None, None, true)
    }

    /// The single root directory of this filesystem.
    pub fn root_directories(self: &Arc<Self>) -> Vec<HttpPath> {
        vec![self.root()]
    }

    /// Builds a path by joining `first` and `more` with the separator. The
    /// result must be empty or absolute; query and fragment are split off
    /// the joined string.
    pub fn get_path(self: &Arc<Self>, first: &str, more: &[&str]) -> Result<HttpPath> {
        let joined = if more.is_empty() {
            first.to_string()
        } else {
            format!("{}{}{}", first, SEPARATOR, more.join(SEPARATOR))
        };
        if !joined.is_empty() && !joined.starts_with(SEPARATOR) {
            return Err(HttpFsError::InvalidPath {
                path: joined,
                reason: "cannot construct a relative http/s path".to_string(),
            });
        }
        let (path, query, fragment) =
            path::split_uri_reference(&joined).map_err(|reason| HttpFsError::InvalidPath {
                path: joined.clone(),
                reason,
            })?;
        HttpPath::new(self.clone(), path, query, fragment)
    }

    /// Builds a path from a URL, carrying over its raw path, query and
    /// fragment.
    pub fn path_from_uri(self: &Arc<Self>, uri: &Url) -> Result<HttpPath> {
        HttpPath::new(self.clone(), uri.path(), uri.query(), uri.fragment())
    }
}

impl PartialEq for HttpFileSystem {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.authority.eq_ignore_ascii_case(&other.authority)
    }
}

impl Eq for HttpFileSystem {}

impl Hash for HttpFileSystem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.authority.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for HttpFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}
