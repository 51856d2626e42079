//! Bundle cache engine
//!
//! Wraps a [`Bundler`] and reuses bundles built earlier in the same session.
//! Requests are keyed by the content hash of their inputs; a miss builds into
//! a staged file next to the slot and publishes it with an atomic rename, a
//! hit refreshes the slot mtime. Either way the bundle is copied to the
//! caller's target through a handle opened before the slot could be trimmed.
//!
//! Lookups only ever consult this process's own session directory, even
//! when a sibling session holds the same hash. Sharing hits across processes
//! would mean trusting publication and invalidation by unrelated writers on
//! possibly networked storage.
//!
//! Two concurrent misses for the same hash both build; the last rename wins.
//! Readers only ever see complete bundles at a slot path, but the duplicate
//! build work is not avoided.

use crate::bundle::{class_set, Bundler, ClassRef};
use crate::cache::cleanup::{CleanupHandle, CleanupPolicy, CleanupTask};
use crate::cache::hasher::{hash_inputs, ContentHash};
use crate::cache::session::{Session, SessionId, TEMP_SUFFIX};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::store::{ByteReader, Location};
use async_trait::async_trait;
use chrono::Utc;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// What a single `produce` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced {
    /// Content hash of the inputs (`None` when caching is disabled)
    pub hash: Option<ContentHash>,
    /// Whether an existing cache entry was reused
    pub cache_hit: bool,
}

struct ActiveSession {
    root: Location,
    session: Session,
    cleanup: CleanupHandle,
}

/// Session-scoped, content-addressed cache in front of a [`Bundler`]
pub struct BundleCache {
    bundler: Arc<dyn Bundler>,
    active: Option<ActiveSession>,
}

impl BundleCache {
    /// Open a new session under `root` and start its cleanup task
    pub async fn start(
        root: Location,
        bundler: Arc<dyn Bundler>,
        policy: CleanupPolicy,
    ) -> CacheResult<Self> {
        if policy.period.is_zero() {
            return Err(CacheError::ConfigInvalid {
                path: root.path().to_path_buf(),
                reason: "cleanup period must be greater than zero".to_string(),
            });
        }

        let session = Session::open(&root).await?;
        let cleanup = CleanupTask::new(root.clone(), session.clone(), policy).spawn();

        Ok(Self {
            bundler,
            active: Some(ActiveSession {
                root,
                session,
                cleanup,
            }),
        })
    }

    /// A pass-through engine that never hashes, stores or cleans up
    pub fn disabled(bundler: Arc<dyn Bundler>) -> Self {
        debug!("Bundle cache disabled, building directly");
        Self {
            bundler,
            active: None,
        }
    }

    /// Build an engine from configuration on the local filesystem
    pub async fn from_config(config: &CacheConfig, bundler: Arc<dyn Bundler>) -> CacheResult<Self> {
        if !config.enabled {
            return Ok(Self::disabled(bundler));
        }

        let root = Location::local(config.resolved_root());
        Self::start(root, bundler, CleanupPolicy::from_config(config)).await
    }

    /// Current session, if caching is enabled
    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|active| &active.session)
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session().map(Session::id)
    }

    /// Shared cache root, if caching is enabled
    pub fn root(&self) -> Option<&Location> {
        self.active.as_ref().map(|active| &active.root)
    }

    /// Produce a bundle of `classes` and `resources` at `target`
    pub async fn produce(
        &self,
        target: &Location,
        classes: &[ClassRef],
        resources: &[Location],
    ) -> CacheResult<Produced> {
        let Some(active) = &self.active else {
            self.bundler.create_bundle(target, classes, resources).await?;
            return Ok(Produced {
                hash: None,
                cache_hit: false,
            });
        };

        let hash = hash_inputs(classes, resources).await?;
        let slot = active.session.dir().append(hash.as_str());

        // An open reader keeps the bundle readable if trimming removes the slot
        let (reader, cache_hit) = match self.open_hit(&slot).await? {
            Some(reader) => {
                debug!("Cached bundle found for {} ({})", target, hash.short());
                (reader, true)
            }
            None => {
                debug!("No cached bundle for {} ({}), building", target, hash.short());
                (self.publish(active, &slot, classes, resources).await?, false)
            }
        };

        copy_out(reader, &slot, target).await?;

        Ok(Produced {
            hash: Some(hash),
            cache_hit,
        })
    }

    /// Produce a bundle of `classes` with no extra resources
    pub async fn produce_classes(
        &self,
        target: &Location,
        classes: &[ClassRef],
    ) -> CacheResult<Produced> {
        self.produce(target, classes, &[]).await
    }

    /// Produce a bundle from one or more classes, dropping repeated names
    pub async fn produce_with(
        &self,
        target: &Location,
        first: ClassRef,
        rest: impl IntoIterator<Item = ClassRef>,
    ) -> CacheResult<Produced> {
        let classes = class_set(std::iter::once(first).chain(rest));
        self.produce(target, &classes, &[]).await
    }

    /// Open the slot and refresh its mtime; `None` means it must be built
    async fn open_hit(&self, slot: &Location) -> CacheResult<Option<ByteReader>> {
        let reader = match slot.open_read().await {
            Ok(reader) => reader,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(format!("opening cache entry {}", slot), e)),
        };

        // Recency signal for trimming
        match slot.set_last_modified(Utc::now()).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Cache entry {} trimmed after lookup, reading open copy", slot);
            }
            Err(e) => return Err(CacheError::io(format!("touching cache entry {}", slot), e)),
        }

        Ok(Some(reader))
    }

    /// Build into a staged sibling of `slot`, rename it into place and
    /// return a reader over the built bundle
    async fn publish(
        &self,
        active: &ActiveSession,
        slot: &Location,
        classes: &[ClassRef],
        resources: &[Location],
    ) -> CacheResult<ByteReader> {
        // The directory may have been reaped by a process that judged us dead
        active
            .session
            .dir()
            .mkdirs()
            .await
            .map_err(|e| CacheError::io(format!("creating session {}", active.session.dir()), e))?;

        let staged = slot.temp_sibling(TEMP_SUFFIX);
        if let Err(e) = self.bundler.create_bundle(&staged, classes, resources).await {
            discard(&staged).await;
            return Err(e);
        }

        // Opened before the rename so the bytes stay reachable once published
        let reader = match staged.open_read().await {
            Ok(reader) => reader,
            Err(e) => {
                discard(&staged).await;
                return Err(CacheError::io(format!("opening staged bundle {}", staged), e));
            }
        };

        if let Err(e) = staged.rename_to(slot).await {
            // Losing a publication race is fine as long as someone won
            let published = slot.exists().await.unwrap_or(false);
            discard(&staged).await;
            if !published {
                return Err(CacheError::io(format!("publishing cache entry {}", slot), e));
            }
            debug!("Cache entry {} published concurrently", slot);
            return Ok(reader);
        }

        info!("Cached bundle {}", slot);
        Ok(reader)
    }

    /// Stop cleanup and remove this session's liveness marker
    pub async fn shutdown(self) -> CacheResult<()> {
        let Some(active) = self.active else {
            return Ok(());
        };

        // Stop first so no heartbeat can recreate the marker afterwards
        active.cleanup.stop().await;
        active.session.close().await
    }
}

#[async_trait]
impl Bundler for BundleCache {
    async fn create_bundle(
        &self,
        target: &Location,
        classes: &[ClassRef],
        resources: &[Location],
    ) -> CacheResult<()> {
        self.produce(target, classes, resources).await.map(|_| ())
    }
}

/// Best-effort removal of a staged file
async fn discard(staged: &Location) {
    match staged.delete(false).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staged bundle {}: {}", staged, e),
    }
}

/// Stream an opened cache entry into `dst`, possibly across stores
async fn copy_out(mut reader: ByteReader, slot: &Location, dst: &Location) -> CacheResult<u64> {
    let mut writer = dst
        .open_write()
        .await
        .map_err(|e| CacheError::io(format!("creating {}", dst), e))?;

    let copied = tokio::io::copy(&mut reader, &mut writer)
        .await
        .map_err(|e| CacheError::io(format!("copying {} to {}", slot, dst), e))?;
    writer
        .shutdown()
        .await
        .map_err(|e| CacheError::io(format!("flushing {}", dst), e))?;

    Ok(copied)
}
