//! Local filesystem store backed by `tokio::fs`

use super::{ByteReader, ByteWriter, EntryStatus, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tokio::fs;

/// Store over a local (or locally mounted) filesystem
///
/// `rename` relies on the platform rename, which is atomic within a single
/// filesystem. Staged files always sit next to their destination, so the
/// cache never renames across mount points.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStore;

#[async_trait]
impl Store for LocalStore {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    async fn create_new(&self, path: &Path) -> io::Result<bool> {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn open_read(&self, path: &Path) -> io::Result<ByteReader> {
        let file = fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn open_write(&self, path: &Path) -> io::Result<ByteWriter> {
        let file = fs::File::create(path).await?;
        Ok(Box::new(file))
    }

    async fn rename(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::rename(src, dst).await
    }

    async fn delete(&self, path: &Path, recursive: bool) -> io::Result<()> {
        let metadata = fs::symlink_metadata(path).await?;
        if !metadata.is_dir() {
            fs::remove_file(path).await
        } else if recursive {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_dir(path).await
        }
    }

    async fn list_status(&self, path: &Path) -> io::Result<Vec<EntryStatus>> {
        let mut entries = fs::read_dir(path).await?;
        let mut statuses = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            // Entries can vanish between readdir and stat when another
            // process is reaping or trimming; skip them.
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            statuses.push(EntryStatus {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory: metadata.is_dir(),
                last_modified: DateTime::<Utc>::from(metadata.modified()?),
                length: metadata.len(),
            });
        }

        Ok(statuses)
    }

    async fn set_last_modified(&self, path: &Path, time: DateTime<Utc>) -> io::Result<()> {
        let path = path.to_path_buf();
        let time = SystemTime::from(time);
        tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new().write(true).open(&path)?;
            file.set_modified(time)
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn last_modified(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        let metadata = fs::metadata(path).await?;
        Ok(DateTime::<Utc>::from(metadata.modified()?))
    }

    fn store_name(&self) -> &'static str {
        "local"
    }
}
