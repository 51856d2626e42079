//! Storage abstraction for the shared cache directory
//!
//! The cache never touches the filesystem directly. Everything goes through
//! a [`Store`], addressed by [`Location`] handles that pair a store with a
//! path, so the same engine can run over a local disk or a mounted network
//! filesystem.
//!
//! Stores return plain `io::Result`; callers attach context when converting
//! into [`crate::error::CacheError`].

mod local;
#[cfg(test)]
pub(crate) mod testing;

pub use local::LocalStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::io::{AsyncRead, AsyncWrite};

static LOCAL_STORE: LazyLock<Arc<LocalStore>> = LazyLock::new(|| Arc::new(LocalStore));

/// Boxed reader returned by [`Store::open_read`]
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed writer returned by [`Store::open_write`]
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Hierarchical storage backend
///
/// Implementations must make `rename` atomic: a reader either sees nothing
/// at the destination or the complete source. Backends that cannot promise
/// that must fail the rename instead.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check whether anything exists at `path`
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Create an empty file. Fails if the parent is missing.
    ///
    /// Returns `false` if something already exists at `path`.
    async fn create_new(&self, path: &Path) -> io::Result<bool>;

    /// Create a directory and all missing parents
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Open a file for streaming reads
    async fn open_read(&self, path: &Path) -> io::Result<ByteReader>;

    /// Open a file for writing, truncating any previous content
    async fn open_write(&self, path: &Path) -> io::Result<ByteWriter>;

    /// Atomically move `src` to `dst`
    async fn rename(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Delete a file or directory
    async fn delete(&self, path: &Path, recursive: bool) -> io::Result<()>;

    /// List the direct children of a directory
    async fn list_status(&self, path: &Path) -> io::Result<Vec<EntryStatus>>;

    /// Set the last-modified time of a file
    async fn set_last_modified(&self, path: &Path, time: DateTime<Utc>) -> io::Result<()>;

    /// Get the last-modified time of a file or directory
    async fn last_modified(&self, path: &Path) -> io::Result<DateTime<Utc>>;

    /// Human-readable backend name for display
    fn store_name(&self) -> &'static str;
}

/// Raw listing record produced by a [`Store`]
#[derive(Debug, Clone)]
pub struct EntryStatus {
    pub name: String,
    pub is_directory: bool,
    pub last_modified: DateTime<Utc>,
    pub length: u64,
}

/// A path inside a particular [`Store`]
#[derive(Clone)]
pub struct Location {
    store: Arc<dyn Store>,
    path: PathBuf,
}

impl Location {
    /// Create a location in the given store
    pub fn new(store: Arc<dyn Store>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Create a location on the process-wide local filesystem store
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let store: Arc<dyn Store> = LOCAL_STORE.clone();
        Self::new(store, path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, if it is valid UTF-8
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Child location in the same store
    pub fn append(&self, child: &str) -> Location {
        Location {
            store: Arc::clone(&self.store),
            path: self.path.join(child),
        }
    }

    /// Unique sibling location ending in `suffix`, for staging writes
    pub fn temp_sibling(&self, suffix: &str) -> Location {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}{}", uuid::Uuid::new_v4().simple(), suffix));
        Location {
            store: Arc::clone(&self.store),
            path: PathBuf::from(name),
        }
    }

    /// Whether both locations are backed by the same store instance
    pub fn same_store(&self, other: &Location) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.store), Arc::as_ptr(&other.store))
    }

    pub async fn exists(&self) -> io::Result<bool> {
        self.store.exists(&self.path).await
    }

    pub async fn create_new(&self) -> io::Result<bool> {
        self.store.create_new(&self.path).await
    }

    pub async fn mkdirs(&self) -> io::Result<()> {
        self.store.create_dir_all(&self.path).await
    }

    pub async fn open_read(&self) -> io::Result<ByteReader> {
        self.store.open_read(&self.path).await
    }

    pub async fn open_write(&self) -> io::Result<ByteWriter> {
        self.store.open_write(&self.path).await
    }

    /// Atomically move this location onto `dst`, which must share the store
    pub async fn rename_to(&self, dst: &Location) -> io::Result<()> {
        if !self.same_store(dst) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot rename {} to {} across stores",
                    self.path.display(),
                    dst.path.display()
                ),
            ));
        }
        self.store.rename(&self.path, &dst.path).await
    }

    pub async fn delete(&self, recursive: bool) -> io::Result<()> {
        self.store.delete(&self.path, recursive).await
    }

    pub async fn set_last_modified(&self, time: DateTime<Utc>) -> io::Result<()> {
        self.store.set_last_modified(&self.path, time).await
    }

    pub async fn last_modified(&self) -> io::Result<DateTime<Utc>> {
        self.store.last_modified(&self.path).await
    }

    /// List the direct children of this directory
    pub async fn list_status(&self) -> io::Result<Vec<LocationStatus>> {
        let entries = self.store.list_status(&self.path).await?;
        Ok(entries
            .into_iter()
            .map(|entry| LocationStatus {
                location: self.append(&entry.name),
                is_directory: entry.is_directory,
                last_modified: entry.last_modified,
                length: entry.length,
            })
            .collect())
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("store", &self.store.store_name())
            .field("path", &self.path)
            .finish()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Status of a listed [`Location`]
#[derive(Debug, Clone)]
pub struct LocationStatus {
    /// Where the entry lives
    pub location: Location,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
    /// Size in bytes (0 for directories on most backends)
    pub length: u64,
}

impl LocationStatus {
    pub fn name(&self) -> Option<&str> {
        self.location.name()
    }
}
