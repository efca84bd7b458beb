//! Remote HTTP/S resources as read-only, randomly seekable byte channels.
//!
//! A URL can be treated like a local file: query its size, seek to an
//! arbitrary offset and read bytes, without downloading the whole object.
//! Point reads and seeks become ranged GET requests; transient wire
//! failures are retried with exponential backoff.
//!
//! ```no_run
//! use url::Url;
//!
//! fn main() -> httpfs::Result<()> {
//!     let uri = Url::parse("https://example.com/genome.fasta").unwrap();
//!     let mut channel = httpfs::open(&uri)?;
//!     let size = channel.size()?;
//!     channel.set_position(size - 16)?;
//!     let mut tail = [0u8; 16];
//!     let read = channel.read(&mut tail)?;
//!     println!("read {read} trailing bytes");
//!     Ok(())
//! }
//! ```
//!
//! This crate is a facade over `httpfs-core` (settings, errors, the
//! URL-as-path algebra) and `httpfs-http` (channels, retries, the provider
//! registry), re-exporting the public surface of both.

use std::sync::Arc;

use url::Url;

pub use httpfs_core::error::{HttpFsError, Result};
pub use httpfs_core::filesystem::{HttpFileSystem, Scheme};
pub use httpfs_core::path::HttpPath;
pub use httpfs_core::settings::{
    HttpSettings, RedirectPolicy, RetryPredicate, RetrySettings, RetryableKind,
};
pub use httpfs_http::cause::{CauseChain, MAX_DEPTH};
pub use httpfs_http::channel::HttpSeekableByteChannel;
pub use httpfs_http::client::build_client;
pub use httpfs_http::provider::{
    AccessMode, HttpBasicFileAttributes, HttpFileSystemProvider, OpenOption,
};
pub use httpfs_http::retry::{Attempt, RetryHandler};

fn shared_provider(uri: &Url) -> Result<Arc<HttpFileSystemProvider>> {
    let scheme = Scheme::of(uri.scheme()).ok_or_else(|| {
        HttpFsError::ProviderMismatch(format!(
            "no provider installed for scheme '{}'",
            uri.scheme()
        ))
    })?;
    Ok(HttpFileSystemProvider::shared(scheme))
}

/// Opens a read channel on `uri` at offset 0, using the shared provider's
/// current settings.
pub fn open(uri: &Url) -> Result<HttpSeekableByteChannel> {
    open_at(uri, 0)
}

/// Opens a read channel on `uri` at an initial byte offset.
pub fn open_at(uri: &Url, position: u64) -> Result<HttpSeekableByteChannel> {
    let provider = shared_provider(uri)?;
    HttpSeekableByteChannel::with_settings(uri.clone(), &provider.settings(), position)
}

/// Probes `uri` for existence under the shared provider's settings.
pub fn exists(uri: &Url) -> Result<bool> {
    let provider = shared_provider(uri)?;
    httpfs_http::client::exists(uri, &provider.settings())
}

/// Builds a path from `uri` on the shared provider for its scheme.
pub fn path_of(uri: &Url) -> Result<HttpPath> {
    shared_provider(uri)?.get_path(uri)
}
