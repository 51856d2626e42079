//! Local store with injectable faults, for exercising races in tests

use super::{ByteReader, ByteWriter, EntryStatus, LocalStore, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

type Hook = Box<dyn Fn(&Path) + Send + Sync>;

/// Wraps [`LocalStore`] and lets a test interfere with chosen operations
#[derive(Default)]
pub(crate) struct HookedStore {
    after_touch: Option<Hook>,
    before_first_create: Option<Hook>,
    create_hook_fired: AtomicBool,
    undeletable: Option<String>,
}

impl HookedStore {
    /// Run `hook` after every successful `set_last_modified`
    pub(crate) fn after_touch(mut self, hook: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.after_touch = Some(Box::new(hook));
        self
    }

    /// Run `hook` before the first `create_new` only
    pub(crate) fn before_first_create(
        mut self,
        hook: impl Fn(&Path) + Send + Sync + 'static,
    ) -> Self {
        self.before_first_create = Some(Box::new(hook));
        self
    }

    /// Fail every delete of a path whose file name is `name`
    pub(crate) fn undeletable(mut self, name: &str) -> Self {
        self.undeletable = Some(name.to_string());
        self
    }
}

#[async_trait]
impl Store for HookedStore {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        LocalStore.exists(path).await
    }

    async fn create_new(&self, path: &Path) -> io::Result<bool> {
        if let Some(hook) = &self.before_first_create {
            if !self.create_hook_fired.swap(true, Ordering::SeqCst) {
                hook(path);
            }
        }
        LocalStore.create_new(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        LocalStore.create_dir_all(path).await
    }

    async fn open_read(&self, path: &Path) -> io::Result<ByteReader> {
        LocalStore.open_read(path).await
    }

    async fn open_write(&self, path: &Path) -> io::Result<ByteWriter> {
        LocalStore.open_write(path).await
    }

    async fn rename(&self, src: &Path, dst: &Path) -> io::Result<()> {
        LocalStore.rename(src, dst).await
    }

    async fn delete(&self, path: &Path, recursive: bool) -> io::Result<()> {
        let blocked = self
            .undeletable
            .as_deref()
            .is_some_and(|name| path.file_name().is_some_and(|n| n == name));
        if blocked {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "delete refused",
            ));
        }
        LocalStore.delete(path, recursive).await
    }

    async fn list_status(&self, path: &Path) -> io::Result<Vec<EntryStatus>> {
        LocalStore.list_status(path).await
    }

    async fn set_last_modified(&self, path: &Path, time: DateTime<Utc>) -> io::Result<()> {
        LocalStore.set_last_modified(path, time).await?;
        if let Some(hook) = &self.after_touch {
            hook(path);
        }
        Ok(())
    }

    async fn last_modified(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        LocalStore.last_modified(path).await
    }

    fn store_name(&self) -> &'static str {
        "hooked"
    }
}
