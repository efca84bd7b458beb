//! Networked half of the HTTP/S virtual filesystem.
//!
//! This crate layers the seekable byte channel over a blocking HTTP client,
//! drives every network call through the retry engine, and exposes the
//! scheme-dispatched provider registry that hands out filesystems, paths and
//! channels.

pub mod cause;
pub mod channel;
pub mod client;
pub mod provider;
pub mod retry;

pub use channel::HttpSeekableByteChannel;
pub use provider::{AccessMode, HttpBasicFileAttributes, HttpFileSystemProvider, OpenOption};
pub use retry::{Attempt, RetryHandler};
