//! Scheme-dispatched provider with an authority-keyed filesystem cache.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};
use std::time::SystemTime;

use url::Url;

use httpfs_core::error::{HttpFsError, Result};
use httpfs_core::filesystem::{HttpFileSystem, Scheme};
use httpfs_core::path::HttpPath;
use httpfs_core::settings::HttpSettings;

use crate::channel::HttpSeekableByteChannel;
use crate::client;

/// Options accepted when opening a byte channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOption {
    Read,
    Write,
    Append,
    Create,
    CreateNew,
    Truncate,
}

/// Access modes accepted by [`HttpFileSystemProvider::check_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

/// Minimal attribute view of a remote HTTP/S resource: it is always a
/// regular file, and nothing else is known about it.
#[derive(Debug, Clone, Copy)]
pub struct HttpBasicFileAttributes;

impl HttpBasicFileAttributes {
    pub fn is_regular_file(&self) -> bool {
        true
    }

    pub fn is_directory(&self) -> bool {
        false
    }

    pub fn is_symbolic_link(&self) -> bool {
        false
    }

    pub fn size(&self) -> Result<u64> {
        Err(attribute_unsupported("size"))
    }

    pub fn last_modified_time(&self) -> Result<SystemTime> {
        Err(attribute_unsupported("last_modified_time"))
    }

    pub fn last_access_time(&self) -> Result<SystemTime> {
        Err(attribute_unsupported("last_access_time"))
    }

    pub fn creation_time(&self) -> Result<SystemTime> {
        Err(attribute_unsupported("creation_time"))
    }
}

fn attribute_unsupported(attribute: &str) -> HttpFsError {
    HttpFsError::UnsupportedOperation(format!(
        "attribute '{attribute}' is not available for http/s resources"
    ))
}

static HTTP_PROVIDER: LazyLock<Arc<HttpFileSystemProvider>> =
    LazyLock::new(|| HttpFileSystemProvider::new(Scheme::Http));
static HTTPS_PROVIDER: LazyLock<Arc<HttpFileSystemProvider>> =
    LazyLock::new(|| HttpFileSystemProvider::new(Scheme::Https));

/// Filesystem provider for one URL scheme.
///
/// The provider owns the authority→filesystem cache and the provider-wide
/// settings used when opening channels and probing access. HTTP and HTTPS
/// behave identically; each scheme gets its own provider instance.
pub struct HttpFileSystemProvider {
    scheme: Scheme,
    filesystems: RwLock<HashMap<String, Arc<HttpFileSystem>>>,
    settings: RwLock<HttpSettings>,
}

impl HttpFileSystemProvider {
    /// A fresh provider with default settings and an empty filesystem
    /// cache. Embedders that want isolation (tests, mostly) start here;
    /// everyone else uses [`shared`](HttpFileSystemProvider::shared).
    pub fn new(scheme: Scheme) -> Arc<Self> {
        Arc::new(Self {
            scheme,
            filesystems: RwLock::new(HashMap::new()),
            settings: RwLock::new(HttpSettings::default()),
        })
    }

    /// The process-wide provider instance for `scheme`.
    pub fn shared(scheme: Scheme) -> Arc<Self> {
        match scheme {
            Scheme::Http => HTTP_PROVIDER.clone(),
            Scheme::Https => HTTPS_PROVIDER.clone(),
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// A snapshot of the provider-wide settings.
    pub fn settings(&self) -> HttpSettings {
        self.settings.read().unwrap().clone()
    }

    /// Replaces the provider-wide settings. Filesystems and channels
    /// created from now on use the new values.
    pub fn set_settings(&self, settings: HttpSettings) {
        *self.settings.write().unwrap() = settings;
    }

    fn check_uri(&self, uri: &Url) -> Result<()> {
        if !uri.has_authority() || uri.authority().is_empty() {
            return Err(HttpFsError::InvalidArgument(format!(
                "the {} provider requires a URI with an authority: {uri}",
                self.scheme
            )));
        }
        if !self.scheme.as_str().eq_ignore_ascii_case(uri.scheme()) {
            return Err(HttpFsError::ProviderMismatch(format!(
                "invalid scheme '{}' for the {} provider",
                uri.scheme(),
                self.scheme
            )));
        }
        Ok(())
    }

    /// Installs a new filesystem for the URI's authority; fails if one
    /// already exists.
    pub fn new_file_system(&self, uri: &Url) -> Result<Arc<HttpFileSystem>> {
        self.check_uri(uri)?;
        let mut filesystems = self.filesystems.write().unwrap();
        if filesystems.contains_key(uri.authority()) {
            return Err(HttpFsError::FileSystemAlreadyExists(uri.to_string()));
        }
        let fs = HttpFileSystem::new(self.scheme, uri.authority());
        filesystems.insert(uri.authority().to_string(), fs.clone());
        Ok(fs)
    }

    /// The cached filesystem for the URI's authority.
    pub fn get_file_system(&self, uri: &Url) -> Result<Arc<HttpFileSystem>> {
        self.check_uri(uri)?;
        self.filesystems
            .read()
            .unwrap()
            .get(uri.authority())
            .cloned()
            .ok_or_else(|| HttpFsError::FileSystemNotFound(uri.to_string()))
    }

    fn get_or_create_file_system(&self, authority: &str) -> Arc<HttpFileSystem> {
        self.filesystems
            .write()
            .unwrap()
            .entry(authority.to_string())
            .or_insert_with(|| HttpFileSystem::new(self.scheme, authority))
            .clone()
    }

    /// Builds a path from `uri`, creating its filesystem on first use.
    pub fn get_path(&self, uri: &Url) -> Result<HttpPath> {
        self.check_uri(uri)?;
        self.get_or_create_file_system(uri.authority())
            .path_from_uri(uri)
    }

    /// Opens a read channel on `path` at offset 0.
    ///
    /// Only an empty option set or a read-only option set is accepted; any
    /// write-oriented option fails before the URI is even looked at.
    pub fn new_byte_channel(
        &self,
        path: &HttpPath,
        options: &[OpenOption],
    ) -> Result<HttpSeekableByteChannel> {
        if !options.iter().all(|option| *option == OpenOption::Read) {
            return Err(HttpFsError::UnsupportedOperation(format!(
                "only {:?} is supported by the {} provider, but {:?} option(s) were provided",
                OpenOption::Read,
                self.scheme,
                options
            )));
        }
        let uri = path.to_uri()?;
        self.check_uri(&uri)?;
        HttpSeekableByteChannel::with_settings(uri, &self.settings(), 0)
    }

    /// Checks that `path` exists and every requested mode is supported.
    /// Absent resources fail with a file-not-found error; any mode other
    /// than read is unsupported on a read-only filesystem.
    pub fn check_access(&self, path: &HttpPath, modes: &[AccessMode]) -> Result<()> {
        let uri = path.to_uri()?;
        self.check_uri(&uri)?;
        if !client::exists(&uri, &self.settings())? {
            return Err(HttpFsError::FileNotFound(uri.to_string()));
        }
        for mode in modes {
            if *mode != AccessMode::Read {
                return Err(HttpFsError::UnsupportedOperation(format!(
                    "unsupported access mode {mode:?} for the read-only {} provider",
                    self.scheme
                )));
            }
        }
        Ok(())
    }

    /// The minimal attribute record for any HTTP/S path.
    pub fn read_attributes(&self, _path: &HttpPath) -> Result<HttpBasicFileAttributes> {
        Ok(HttpBasicFileAttributes)
    }

    pub fn create_directory(&self, _dir: &HttpPath) -> Result<()> {
        Err(self.read_only("cannot create directories"))
    }

    pub fn delete(&self, _path: &HttpPath) -> Result<()> {
        Err(self.read_only("cannot delete paths"))
    }

    pub fn copy(&self, _source: &HttpPath, _target: &HttpPath) -> Result<()> {
        Err(self.read_only("cannot copy paths"))
    }

    pub fn move_to(&self, _source: &HttpPath, _target: &HttpPath) -> Result<()> {
        Err(self.read_only("cannot move paths"))
    }

    pub fn set_attribute(&self, _path: &HttpPath, _attribute: &str) -> Result<()> {
        Err(self.read_only("cannot set attributes on paths"))
    }

    pub fn new_directory_stream(&self, _dir: &HttpPath) -> Result<Vec<HttpPath>> {
        Err(HttpFsError::UnsupportedOperation(
            "directory listing is not implemented for http/s filesystems".to_string(),
        ))
    }

    pub fn is_same_file(&self, _path: &HttpPath, _other: &HttpPath) -> Result<bool> {
        Err(HttpFsError::UnsupportedOperation(
            "is_same_file is not implemented for http/s filesystems".to_string(),
        ))
    }

    pub fn is_hidden(&self, _path: &HttpPath) -> Result<bool> {
        Err(HttpFsError::UnsupportedOperation(
            "is_hidden is not implemented for http/s filesystems".to_string(),
        ))
    }

    pub fn file_store(&self, _path: &HttpPath) -> Result<()> {
        Err(HttpFsError::UnsupportedOperation(
            "file stores are not implemented for http/s filesystems".to_string(),
        ))
    }

    fn read_only(&self, action: &str) -> HttpFsError {
        HttpFsError::UnsupportedOperation(format!(
            "the {} provider is read-only: {action}",
            self.scheme
        ))
    }
}

impl std::fmt::Debug for HttpFileSystemProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFileSystemProvider")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}
