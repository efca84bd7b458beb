//! URL-as-path model for HTTP/S resources.
//!
//! An [`HttpPath`] represents the path component of an HTTP/S URL under
//! filesystem-path semantics: root, parent, name count, prefix and suffix
//! tests, sibling resolution. The path component is kept in its normalized,
//! percent-encoded form as a byte sequence; the optional query and fragment
//! are carried verbatim.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use url::Url;

use crate::error::{HttpFsError, Result};
use crate::filesystem::HttpFileSystem;

const SEPARATOR: u8 = b'/';

/// A path owned by an [`HttpFileSystem`].
///
/// Paths are immutable value objects. The stored bytes never contain two
/// consecutive separators and never end with a separator (except for the
/// degenerate single-separator form produced by normalizing an all-slash
/// input). Absolute paths are either empty (the root) or begin with `/`.
///
/// Relative paths are produced by [`subpath`](HttpPath::subpath),
/// [`name`](HttpPath::name) and [`file_name`](HttpPath::file_name); they are
/// byte windows into their parent and keep the separator that preceded the
/// first retained name, which [`fmt::Display`] strips.
#[derive(Debug, Clone)]
pub struct HttpPath {
    fs: Arc<HttpFileSystem>,
    normalized: Bytes,
    segments: OnceLock<Vec<(usize, usize)>>,
    query: Option<String>,
    fragment: Option<String>,
    absolute: bool,
}

impl HttpPath {
    /// Creates an absolute path on `fs` from an already percent-encoded path
    /// string plus optional raw query and fragment.
    pub(crate) fn new(
        fs: Arc<HttpFileSystem>,
        path: &str,
        query: Option<&str>,
        fragment: Option<&str>,
    ) -> Result<Self> {
        let normalized = normalized_path_bytes(path, true)?;
        Ok(Self::with_bytes(
            fs,
            normalized,
            query.map(str::to_string),
            fragment.map(str::to_string),
            true,
        ))
    }

    pub(crate) fn with_bytes(
        fs: Arc<HttpFileSystem>,
        normalized: Bytes,
        query: Option<String>,
        fragment: Option<String>,
        absolute: bool,
    ) -> Self {
        Self {
            fs,
            normalized,
            segments: OnceLock::new(),
            query,
            fragment,
            absolute,
        }
    }

    /// The filesystem owning this path.
    pub fn file_system(&self) -> &Arc<HttpFileSystem> {
        &self.fs
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// The raw query component, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The raw fragment component, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The root of this path's filesystem: absolute, empty byte sequence, no
    /// query, no fragment.
    pub fn root(&self) -> HttpPath {
        HttpPath::with_bytes(self.fs.clone(), Bytes::new(), None, None, true)
    }

    /// The last name of the path as a relative path, or `None` for the root.
    pub fn file_name(&self) -> Option<HttpPath> {
        let segments = self.segments();
        let &(start, end) = segments.last()?;
        Some(self.slice_relative(start, end))
    }

    /// The parent path, preserving the absolute flag; the root's parent is
    /// the root itself.
    pub fn parent(&self) -> HttpPath {
        let segments = self.segments();
        match segments.len() {
            0 => self.root(),
            count => {
                let start = segments[0].0;
                let end = segments[count - 1].0;
                HttpPath::with_bytes(
                    self.fs.clone(),
                    self.normalized.slice(start..end),
                    None,
                    None,
                    self.absolute,
                )
            }
        }
    }

    /// Number of `/`-delimited non-empty names in the stored bytes; the root
    /// has zero.
    pub fn name_count(&self) -> usize {
        self.segments().len()
    }

    /// Name `index` as a relative path.
    pub fn name(&self, index: usize) -> Result<HttpPath> {
        self.subpath(index, index + 1)
    }

    /// The names of the path in order, each as a relative path.
    pub fn iter(&self) -> impl Iterator<Item = HttpPath> + '_ {
        self.segments()
            .iter()
            .map(|&(start, end)| self.slice_relative(start, end))
    }

    /// Relative path holding the names in `[begin_index, end_index)`.
    ///
    /// Bounds are strict: `begin_index` must name an existing element and
    /// `end_index` must be past it and within the name count.
    pub fn subpath(&self, begin_index: usize, end_index: usize) -> Result<HttpPath> {
        let segments = self.segments();
        if begin_index >= segments.len() || end_index <= begin_index || end_index > segments.len()
        {
            return Err(HttpFsError::InvalidArgument(format!(
                "invalid indexes for path with {} name(s): [{}, {}]",
                segments.len(),
                begin_index,
                end_index
            )));
        }
        let start = segments[begin_index].0;
        let end = segments[end_index - 1].1;
        Ok(self.slice_relative(start, end))
    }

    fn slice_relative(&self, start: usize, end: usize) -> HttpPath {
        HttpPath::with_bytes(
            self.fs.clone(),
            self.normalized.slice(start..end),
            None,
            None,
            false,
        )
    }

    /// Whether this path's bytes start with `other`'s, ending on a name
    /// boundary. Paths from a different filesystem never match.
    pub fn starts_with(&self, other: &HttpPath) -> bool {
        self.fs == other.fs && self.starts_with_bytes(&other.normalized)
    }

    /// String variant of [`starts_with`](HttpPath::starts_with); the
    /// argument is normalized first. Strings that are not valid paths never
    /// match.
    pub fn starts_with_str(&self, other: &str) -> bool {
        match normalized_path_bytes(other, false) {
            Ok(bytes) => self.starts_with_bytes(&bytes),
            Err(_) => false,
        }
    }

    fn starts_with_bytes(&self, other: &[u8]) -> bool {
        let olen = effective_len(other);
        let this = &self.normalized[..];
        if olen > this.len() {
            return false;
        }
        if this[..olen] != other[..olen] {
            return false;
        }
        // require a name boundary right after the match
        olen >= this.len() || this[olen] == SEPARATOR
    }

    /// Whether this path's bytes end with `other`'s. A match at the byte
    /// boundary is accepted; paths from a different filesystem never match.
    pub fn ends_with(&self, other: &HttpPath) -> bool {
        self.fs == other.fs && self.ends_with_bytes(&other.normalized, true)
    }

    /// String variant of [`ends_with`](HttpPath::ends_with). Unless the
    /// match covers the whole path, the byte before it must be a separator:
    /// `/foo/bar` ends with `"bar"` but not with `"/bar"`. The empty string
    /// matches every path.
    pub fn ends_with_str(&self, other: &str) -> bool {
        if other.is_empty() {
            return true;
        }
        match normalized_path_bytes(other, false) {
            Ok(bytes) => self.ends_with_bytes(&bytes, false),
            Err(_) => false,
        }
    }

    fn ends_with_bytes(&self, other: &[u8], path_version: bool) -> bool {
        let this = &self.normalized[..];
        let olen = effective_len(other);
        let len = effective_len(this);
        if olen == 0 {
            return len == 0;
        }
        if len < olen {
            return false;
        }
        if this[len - olen..len] != other[..olen] {
            return false;
        }
        if len == olen {
            return true;
        }
        // the string version additionally requires a name boundary, so that
        // "/foo/bar" ends with "bar" but not with "ar"
        path_version || this[len - olen - 1] == SEPARATOR
    }

    /// Resolves `other` against this path: the names of `other` are appended
    /// and its query and fragment are adopted. Resolving an absolute path is
    /// not supported and fails, by design: silently treating an absolute
    /// foreign path as an HTTP resource hides bugs in downstream callers.
    pub fn resolve(&self, other: &HttpPath) -> Result<HttpPath> {
        if other.is_absolute() {
            return Err(HttpFsError::UnsupportedOperation(format!(
                "cannot resolve an absolute path against an http(s) path (this path: {self}, other: {other})"
            )));
        }
        Ok(HttpPath::with_bytes(
            self.fs.clone(),
            concat_paths(&self.normalized, &other.normalized),
            other.query.clone(),
            other.fragment.clone(),
            self.absolute,
        ))
    }

    /// Parses `other` as a relative URI reference (path, optional query and
    /// fragment, all already percent-encoded) and resolves it. Strings with
    /// a scheme are rejected as unsupported; strings with characters that
    /// are not valid in an encoded URI fail with an invalid-argument error.
    pub fn resolve_str(&self, other: &str) -> Result<HttpPath> {
        let relative = self.relative_from_str(other)?;
        self.resolve(&relative)
    }

    /// Resolves `other` against this path's parent.
    pub fn resolve_sibling(&self, other: &HttpPath) -> Result<HttpPath> {
        self.parent().resolve(other)
    }

    /// String variant of [`resolve_sibling`](HttpPath::resolve_sibling).
    pub fn resolve_sibling_str(&self, other: &str) -> Result<HttpPath> {
        self.parent().resolve_str(other)
    }

    fn relative_from_str(&self, other: &str) -> Result<HttpPath> {
        if has_scheme(other) {
            return Err(HttpFsError::UnsupportedOperation(format!(
                "resolving absolute URI strings against an http(s) path is not supported: {other}"
            )));
        }
        let (path, query, fragment) = split_uri_reference(other)
            .map_err(|reason| HttpFsError::InvalidArgument(format!(
                "cannot resolve against an invalid URI '{other}': {reason}"
            )))?;
        Ok(HttpPath::with_bytes(
            self.fs.clone(),
            normalized_path_bytes(path, false)?,
            query.map(str::to_string),
            fragment.map(str::to_string),
            false,
        ))
    }

    /// Reconstructs the `scheme://authority/path[?query][#fragment]` URL.
    pub fn to_uri(&self) -> Result<Url> {
        let uri = self.to_uri_string(true);
        Url::parse(&uri).map_err(|e| HttpFsError::InvalidPath {
            path: uri,
            reason: e.to_string(),
        })
    }

    /// This path if already absolute, otherwise an absolute twin.
    pub fn to_absolute_path(&self) -> HttpPath {
        if self.absolute {
            return self.clone();
        }
        let normalized = if self.normalized.is_empty() || self.normalized[0] == SEPARATOR {
            self.normalized.clone()
        } else {
            let mut bytes = Vec::with_capacity(self.normalized.len() + 1);
            bytes.push(SEPARATOR);
            bytes.extend_from_slice(&self.normalized);
            Bytes::from(bytes)
        };
        HttpPath::with_bytes(
            self.fs.clone(),
            normalized,
            self.query.clone(),
            self.fragment.clone(),
            true,
        )
    }

    pub fn normalize(&self) -> Result<HttpPath> {
        Err(HttpFsError::UnsupportedOperation(
            "normalize is not implemented for http(s) paths".to_string(),
        ))
    }

    pub fn relativize(&self, _other: &HttpPath) -> Result<HttpPath> {
        Err(HttpFsError::UnsupportedOperation(
            "relativize is not implemented for http(s) paths".to_string(),
        ))
    }

    pub fn to_real_path(&self) -> Result<HttpPath> {
        Err(HttpFsError::UnsupportedOperation(
            "to_real_path is not implemented for http(s) paths".to_string(),
        ))
    }

    pub fn to_file_path(&self) -> Result<std::path::PathBuf> {
        Err(HttpFsError::UnsupportedOperation(
            "an http(s) path cannot be converted to a local file path".to_string(),
        ))
    }

    /// SPI ordering: authority case-insensitively, then path bytes, then
    /// query and fragment with absent-first semantics. The absolute flag
    /// does not participate; [`PartialOrd`] refines this ordering with it so
    /// that comparison stays consistent with equality.
    pub fn compare(&self, other: &HttpPath) -> Ordering {
        let authority = cmp_ignore_ascii_case(self.fs.authority(), other.fs.authority());
        if authority != Ordering::Equal {
            return authority;
        }
        let path = self.normalized.cmp(&other.normalized);
        if path != Ordering::Equal {
            return path;
        }
        let query = self.query.cmp(&other.query);
        if query != Ordering::Equal {
            return query;
        }
        self.fragment.cmp(&other.fragment)
    }

    fn segments(&self) -> &[(usize, usize)] {
        self.segments
            .get_or_init(|| compute_segments(&self.normalized))
    }

    fn to_uri_string(&self, include_root: bool) -> String {
        let mut out = String::new();
        if include_root {
            out.push_str(self.fs.scheme().as_str());
            out.push_str("://");
            out.push_str(self.fs.authority());
            out.push_str(&String::from_utf8_lossy(&self.normalized));
        } else if !self.normalized.is_empty() {
            let bytes = if self.normalized[0] == SEPARATOR {
                &self.normalized[1..]
            } else {
                &self.normalized[..]
            };
            out.push_str(&String::from_utf8_lossy(bytes));
        }
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

impl fmt::Display for HttpPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri_string(self.absolute))
    }
}

impl PartialEq for HttpPath {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl Eq for HttpPath {}

impl PartialOrd for HttpPath {
    /// `None` when the paths belong to different providers (schemes).
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.fs.scheme() != other.fs.scheme() {
            return None;
        }
        Some(
            self.compare(other)
                .then_with(|| self.absolute.cmp(&other.absolute)),
        )
    }
}

impl Hash for HttpPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fs.scheme().hash(state);
        self.fs.authority().to_ascii_lowercase().hash(state);
        self.absolute.hash(state);
        self.normalized.hash(state);
        self.query.hash(state);
        self.fragment.hash(state);
    }
}

/// Normalizes a percent-encoded path string into path bytes: collapses
/// separator runs, strips the trailing separator, rejects NUL. With
/// `check_absolute`, a non-empty path must start with the separator.
pub(crate) fn normalized_path_bytes(path: &str, check_absolute: bool) -> Result<Bytes> {
    if check_absolute && !path.is_empty() && !path.starts_with('/') {
        return Err(HttpFsError::InvalidPath {
            path: path.to_string(),
            reason: "relative HTTP/S paths are not supported".to_string(),
        });
    }
    if path.contains('\0') {
        return Err(HttpFsError::InvalidPath {
            path: path.replace('\0', "\\0"),
            reason: "NUL character not allowed in path".to_string(),
        });
    }
    if path.is_empty() || path == "/" {
        return Ok(Bytes::new());
    }
    Ok(normalize_bytes(path.as_bytes().to_vec()))
}

fn normalize_bytes(raw: Vec<u8>) -> Bytes {
    let mut out = Vec::with_capacity(raw.len());
    let mut prev = 0u8;
    for byte in raw {
        if byte == SEPARATOR && prev == SEPARATOR {
            continue;
        }
        out.push(byte);
        prev = byte;
    }
    while out.len() > 1 && out.last() == Some(&SEPARATOR) {
        out.pop();
    }
    Bytes::from(out)
}

/// Length of `path` ignoring a single trailing separator (the lone-separator
/// path keeps its byte).
fn effective_len(path: &[u8]) -> usize {
    let mut len = path.len();
    if len > 1 && path[len - 1] == SEPARATOR {
        len -= 1;
    }
    len
}

/// Byte ranges of the non-empty names in `bytes`. Each range keeps the
/// separator preceding its first byte, so slicing reproduces the stored
/// form (`/a/b` → `/a`, `/b`).
fn compute_segments(bytes: &[u8]) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        if bytes[i] == SEPARATOR {
            i += 1;
        }
        let content = i;
        while i < bytes.len() && bytes[i] != SEPARATOR {
            i += 1;
        }
        if i > content {
            segments.push((start, i));
        }
    }
    segments
}

fn concat_paths(base: &[u8], relative: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(base.len() + 1 + relative.len());
    out.extend_from_slice(base);
    out.push(SEPARATOR);
    out.extend_from_slice(relative);
    normalize_bytes(out)
}

fn cmp_ignore_ascii_case(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|byte| byte.to_ascii_lowercase())
        .cmp(b.bytes().map(|byte| byte.to_ascii_lowercase()))
}

/// `true` when the string begins with a URI scheme (`letter
/// *(letter/digit/+/-/.) ":"` before any `/`, `?` or `#`).
fn has_scheme(s: &str) -> bool {
    let Some(colon) = s.find(':') else {
        return false;
    };
    if let Some(stop) = s.find(['/', '?', '#']) {
        if stop < colon {
            return false;
        }
    }
    let scheme = &s[..colon];
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Splits a URI reference into `(path, query, fragment)` and validates that
/// every component only holds characters valid in an encoded URI. Errors
/// carry the offending reason.
pub(crate) fn split_uri_reference(s: &str) -> Result<(&str, Option<&str>, Option<&str>), String> {
    let (before_fragment, fragment) = match s.split_once('#') {
        Some((before, fragment)) => (before, Some(fragment)),
        None => (s, None),
    };
    let (path, query) = match before_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (before_fragment, None),
    };
    validate_encoded(path, "path")?;
    if let Some(query) = query {
        validate_encoded(query, "query")?;
    }
    if let Some(fragment) = fragment {
        validate_encoded(fragment, "fragment")?;
    }
    Ok((path, query, fragment))
}

fn validate_encoded(component: &str, name: &str) -> Result<(), String> {
    let bytes = component.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        match byte {
            b'%' => {
                let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                    && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
                if !valid {
                    return Err(format!("malformed percent-escape in {name} at index {i}"));
                }
                i += 3;
            }
            // unreserved / sub-delims / pchar extras, plus the separators
            // that survive the split above
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'.'
            | b'_'
            | b'~'
            | b'!'
            | b'$'
            | b'&'
            | b'\''
            | b'('
            | b')'
            | b'*'
            | b'+'
            | b','
            | b';'
            | b'='
            | b':'
            | b'@'
            | b'/'
            | b'?'
            | 0x80.. => {
                i += 1;
            }
            _ => {
                return Err(format!(
                    "character '{}' is not allowed in an encoded {name}",
                    byte as char
                ));
            }
        }
    }
    Ok(())
}
