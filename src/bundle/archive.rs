//! Tar archive bundler
//!
//! Lays classes out under `classes/`, jar resources under `lib/` and every
//! other resource under `resources/`. Headers carry fixed metadata so that
//! identical inputs always produce byte-identical archives.

use super::{Bundler, ClassRef};
use crate::error::{CacheError, CacheResult};
use crate::store::Location;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

const CLASSES_DIR: &str = "classes";
const LIB_DIR: &str = "lib";
const RESOURCES_DIR: &str = "resources";

/// Bundler that packs its inputs into an uncompressed tar archive
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveBundler;

impl ArchiveBundler {
    pub fn new() -> Self {
        Self
    }

    /// Archive entry path for an extra resource
    fn resource_entry(resource: &Location) -> CacheResult<String> {
        let name = resource.name().ok_or_else(|| {
            CacheError::bundle(
                resource.to_string(),
                "resource path has no usable file name",
            )
        })?;

        let dir = if name.ends_with(".jar") {
            LIB_DIR
        } else {
            RESOURCES_DIR
        };
        Ok(format!("{}/{}", dir, name))
    }

    fn append_entry(
        builder: &mut tar::Builder<Vec<u8>>,
        path: &str,
        data: &[u8],
    ) -> CacheResult<()> {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        builder
            .append_data(&mut header, path, data)
            .map_err(|e| CacheError::io(format!("adding {} to archive", path), e))
    }
}

async fn read_all(location: &Location) -> CacheResult<Vec<u8>> {
    let mut reader = location
        .open_read()
        .await
        .map_err(|e| CacheError::io(format!("opening {}", location), e))?;
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .await
        .map_err(|e| CacheError::io(format!("reading {}", location), e))?;
    Ok(data)
}

#[async_trait]
impl Bundler for ArchiveBundler {
    async fn create_bundle(
        &self,
        target: &Location,
        classes: &[ClassRef],
        resources: &[Location],
    ) -> CacheResult<()> {
        let mut builder = tar::Builder::new(Vec::new());

        for class in classes {
            let data = read_all(class.location()).await?;
            let entry = format!("{}/{}", CLASSES_DIR, class.name());
            Self::append_entry(&mut builder, &entry, &data)?;
        }

        for resource in resources {
            let data = read_all(resource).await?;
            let entry = Self::resource_entry(resource)?;
            Self::append_entry(&mut builder, &entry, &data)?;
        }

        let archive = builder
            .into_inner()
            .map_err(|e| CacheError::io("finalizing archive", e))?;

        let mut writer = target
            .open_write()
            .await
            .map_err(|e| CacheError::io(format!("creating bundle {}", target), e))?;
        writer
            .write_all(&archive)
            .await
            .map_err(|e| CacheError::io(format!("writing bundle {}", target), e))?;
        writer
            .shutdown()
            .await
            .map_err(|e| CacheError::io(format!("flushing bundle {}", target), e))?;

        debug!(
            "Wrote bundle {} ({} classes, {} resources, {} bytes)",
            target,
            classes.len(),
            resources.len(),
            archive.len()
        );
        Ok(())
    }
}
