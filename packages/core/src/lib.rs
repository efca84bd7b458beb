//! Core model for HTTP/S-backed virtual filesystems.
//!
//! This crate holds everything that does not touch the network: the
//! configuration records, the error taxonomy shared by the whole workspace,
//! the `(scheme, authority)` filesystem value type and the URL-as-path
//! algebra.
//!
//! The networked half (channels, retries, the provider registry) lives in
//! `httpfs-http`; most users want the `httpfs` facade crate instead of
//! depending on this one directly.

pub mod error;
pub mod filesystem;
pub mod path;
pub mod settings;

pub use error::{HttpFsError, Result};
pub use filesystem::{HttpFileSystem, Scheme};
pub use path::HttpPath;
pub use settings::{HttpSettings, RedirectPolicy, RetryPredicate, RetrySettings, RetryableKind};
