//! Cache sessions and the liveness marker protocol
//!
//! Each process owns one session: a directory `root/<id>/` holding its cache
//! entries and a zero-length `active` marker. The marker's mtime is the only
//! liveness signal other processes can see. It is refreshed on every cleanup
//! cycle, and a session whose marker is missing or older than
//! `STALE_FACTOR` cleanup periods is considered dead and may be reaped by
//! any other session.
//!
//! This is soft state, not a lock. Nothing stops two processes from racing
//! on a directory; the convention only decides who is allowed to reclaim
//! space eventually.

use crate::error::{CacheError, CacheResult};
use crate::store::{Location, LocationStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name of the liveness marker inside a session directory
pub const ACTIVE_FILE_NAME: &str = "active";

/// Suffix of staged, not yet published, bundle files
pub const TEMP_SUFFIX: &str = ".tmp";

/// Cleanup periods a marker may go without a heartbeat before its session is dead
pub const STALE_FACTOR: u32 = 4;

/// Unique identifier of one process's cache session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier (UUIDv7, so time-ordered plus random bits)
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Liveness of a session as judged by an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    /// Marker heartbeat is recent enough
    Live,
    /// Marker exists but has not been refreshed in time
    Stale,
    /// No marker at all (crashed before creating it, or stopped cleanly)
    Orphaned,
}

impl Liveness {
    /// Judge a session from its marker mtime
    ///
    /// Dead means `modified <= now - STALE_FACTOR * period`.
    pub fn classify(marker: Option<DateTime<Utc>>, now: DateTime<Utc>, period: Duration) -> Self {
        let Some(modified) = marker else {
            return Self::Orphaned;
        };

        let Ok(window) = chrono::Duration::from_std(period.saturating_mul(STALE_FACTOR)) else {
            return Self::Live;
        };

        match now.checked_sub_signed(window) {
            Some(cutoff) if modified <= cutoff => Self::Stale,
            _ => Self::Live,
        }
    }

    /// Whether a session in this state may be reaped
    pub fn is_dead(&self) -> bool {
        !matches!(self, Self::Live)
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Stale => write!(f, "stale"),
            Self::Orphaned => write!(f, "orphaned"),
        }
    }
}

/// Read the marker mtime of a session directory, `None` if there is no marker
pub async fn marker_time(session_dir: &Location) -> io::Result<Option<DateTime<Utc>>> {
    let marker = session_dir.append(ACTIVE_FILE_NAME);
    match marker.last_modified().await {
        Ok(modified) => Ok(Some(modified)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether a listed child of a session directory is a cache entry
///
/// The marker, staged temp files and directories are not entries.
pub fn is_cache_entry(status: &LocationStatus) -> bool {
    if status.is_directory {
        return false;
    }
    match status.name() {
        Some(name) => name != ACTIVE_FILE_NAME && !name.ends_with(TEMP_SUFFIX),
        None => false,
    }
}

/// One process's session directory and liveness marker
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    dir: Location,
    marker: Location,
}

impl Session {
    /// Describe a session under `root` without touching the store
    pub fn attach(root: &Location, id: SessionId) -> Self {
        let dir = root.append(id.as_str());
        let marker = dir.append(ACTIVE_FILE_NAME);
        Self { id, dir, marker }
    }

    /// Create a new session under `root` and write its liveness marker
    pub async fn open(root: &Location) -> CacheResult<Self> {
        root.mkdirs()
            .await
            .map_err(|e| CacheError::CacheRootUnusable {
                path: root.path().to_path_buf(),
                source: e,
            })?;

        let session = Self::attach(root, SessionId::generate());
        session.create_marker().await.map_err(|e| CacheError::SessionStart {
            session: session.id.to_string(),
            source: e,
        })?;

        info!("Started cache session {} under {}", session.id, root);
        Ok(session)
    }

    async fn create_marker(&self) -> io::Result<()> {
        self.dir.mkdirs().await?;
        let created = match self.marker.create_new().await {
            // A sibling reaped the directory before the marker appeared
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Session directory {} vanished, recreating", self.dir);
                self.dir.mkdirs().await?;
                self.marker.create_new().await?
            }
            result => result?,
        };
        if !created {
            debug!("Marker {} already present", self.marker);
        }
        Ok(())
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Session directory holding the cache entries
    pub fn dir(&self) -> &Location {
        &self.dir
    }

    pub fn marker(&self) -> &Location {
        &self.marker
    }

    /// Refresh the marker mtime to now
    ///
    /// If another process already judged this session dead and removed the
    /// marker, the session directory and marker are recreated.
    pub async fn heartbeat(&self) -> CacheResult<()> {
        match self.marker.set_last_modified(Utc::now()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Liveness marker for session {} disappeared, recreating it",
                    self.id
                );
                self.create_marker()
                    .await
                    .map_err(|e| CacheError::io(format!("recreating marker {}", self.marker), e))
            }
            Err(e) => Err(CacheError::io(
                format!("refreshing marker {}", self.marker),
                e,
            )),
        }
    }

    /// Remove the liveness marker, leaving entries for other sessions to reap
    pub async fn close(&self) -> CacheResult<()> {
        match self.marker.delete(false).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Marker {} already gone", self.marker);
            }
            Err(e) => {
                return Err(CacheError::io(
                    format!("removing marker {}", self.marker),
                    e,
                ))
            }
        }
        info!("Closed cache session {}", self.id);
        Ok(())
    }
}

/// Observed state of one session directory under the cache root
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub liveness: Liveness,
    pub heartbeat: Option<DateTime<Utc>>,
    pub entries: usize,
    pub bytes: u64,
}

/// Summarise every session directory under `root`
pub async fn list_sessions(root: &Location, period: Duration) -> CacheResult<Vec<SessionSummary>> {
    if !root
        .exists()
        .await
        .map_err(|e| CacheError::io(format!("checking cache root {}", root), e))?
    {
        return Ok(vec![]);
    }

    let now = Utc::now();
    let children = root
        .list_status()
        .await
        .map_err(|e| CacheError::io(format!("listing cache root {}", root), e))?;

    let mut summaries = Vec::new();
    for child in children.into_iter().filter(|c| c.is_directory) {
        let Some(id) = child.name().map(str::to_string) else {
            continue;
        };

        let heartbeat = marker_time(&child.location)
            .await
            .map_err(|e| CacheError::io(format!("reading marker of {}", child.location), e))?;

        let entries: Vec<LocationStatus> = match child.location.list_status().await {
            Ok(statuses) => statuses.into_iter().filter(is_cache_entry).collect(),
            // Reaped while we were looking
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(CacheError::io(
                    format!("listing session {}", child.location),
                    e,
                ))
            }
        };

        summaries.push(SessionSummary {
            id,
            liveness: Liveness::classify(heartbeat, now, period),
            heartbeat,
            entries: entries.len(),
            bytes: entries.iter().map(|e| e.length).sum(),
        });
    }

    // Newest heartbeat first, sessions without a marker last
    summaries.sort_by(|a, b| b.heartbeat.cmp(&a.heartbeat));
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::HookedStore;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;
    use tempfile::TempDir;

    const PERIOD: Duration = Duration::from_secs(60);

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn classify_boundaries() {
        let now = Utc::now();
        let window = ChronoDuration::seconds(4 * 60);
        let eps = ChronoDuration::seconds(5);

        assert_eq!(Liveness::classify(None, now, PERIOD), Liveness::Orphaned);
        assert_eq!(
            Liveness::classify(Some(now - window - eps), now, PERIOD),
            Liveness::Stale
        );
        assert_eq!(
            Liveness::classify(Some(now - window), now, PERIOD),
            Liveness::Stale
        );
        assert_eq!(
            Liveness::classify(Some(now - window + eps), now, PERIOD),
            Liveness::Live
        );
        assert_eq!(Liveness::classify(Some(now), now, PERIOD), Liveness::Live);
    }

    #[test]
    fn liveness_is_dead() {
        assert!(!Liveness::Live.is_dead());
        assert!(Liveness::Stale.is_dead());
        assert!(Liveness::Orphaned.is_dead());
    }

    #[tokio::test]
    async fn open_creates_directory_and_marker() {
        let temp = TempDir::new().unwrap();
        let root = Location::local(temp.path().join("cache"));

        let session = Session::open(&root).await.unwrap();

        assert!(session.marker().exists().await.unwrap());
        assert_eq!(
            session.marker().path(),
            temp.path()
                .join("cache")
                .join(session.id().as_str())
                .join(ACTIVE_FILE_NAME)
        );
        let len = std::fs::metadata(session.marker().path()).unwrap().len();
        assert_eq!(len, 0);
    }

    #[tokio::test]
    async fn open_fails_on_unusable_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let err = Session::open(&Location::local(file.join("cache")))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::CacheRootUnusable { .. }));
    }

    #[tokio::test]
    async fn open_survives_directory_reaped_before_marker() {
        let temp = TempDir::new().unwrap();
        // Remove the fresh session directory just before the marker is created
        let store = HookedStore::default().before_first_create(|marker| {
            if let Some(dir) = marker.parent() {
                std::fs::remove_dir_all(dir).unwrap();
            }
        });
        let root = Location::new(Arc::new(store), temp.path().join("cache"));

        let session = Session::open(&root).await.unwrap();

        assert!(session.dir().exists().await.unwrap());
        assert!(session.marker().exists().await.unwrap());
    }

    #[tokio::test]
    async fn heartbeat_refreshes_marker() {
        let temp = TempDir::new().unwrap();
        let root = Location::local(temp.path());
        let session = Session::open(&root).await.unwrap();

        let old = Utc::now() - ChronoDuration::hours(2);
        session.marker().set_last_modified(old).await.unwrap();
        session.heartbeat().await.unwrap();

        let refreshed = session.marker().last_modified().await.unwrap();
        assert!(refreshed > old + ChronoDuration::hours(1));
    }

    #[tokio::test]
    async fn heartbeat_recreates_reaped_session() {
        let temp = TempDir::new().unwrap();
        let root = Location::local(temp.path());
        let session = Session::open(&root).await.unwrap();

        session.dir().delete(true).await.unwrap();
        session.heartbeat().await.unwrap();

        assert!(session.marker().exists().await.unwrap());
    }

    #[tokio::test]
    async fn close_removes_only_marker() {
        let temp = TempDir::new().unwrap();
        let root = Location::local(temp.path());
        let session = Session::open(&root).await.unwrap();
        std::fs::write(session.dir().path().join("abc"), b"bundle").unwrap();

        session.close().await.unwrap();
        session.close().await.unwrap();

        assert!(!session.marker().exists().await.unwrap());
        assert!(session.dir().append("abc").exists().await.unwrap());
    }

    #[tokio::test]
    async fn list_sessions_reports_liveness_and_usage() {
        let temp = TempDir::new().unwrap();
        let root = Location::local(temp.path());

        let live = Session::open(&root).await.unwrap();
        std::fs::write(live.dir().path().join("aaa"), b"12345").unwrap();
        std::fs::write(live.dir().path().join("bbb.1234.tmp"), b"partial").unwrap();

        let stale = Session::open(&root).await.unwrap();
        stale
            .marker()
            .set_last_modified(Utc::now() - ChronoDuration::hours(1))
            .await
            .unwrap();

        std::fs::create_dir_all(temp.path().join("orphan")).unwrap();

        let summaries = list_sessions(&root, PERIOD).await.unwrap();
        assert_eq!(summaries.len(), 3);

        let find = |id: &str| summaries.iter().find(|s| s.id == id).unwrap();
        let live_summary = find(live.id().as_str());
        assert_eq!(live_summary.liveness, Liveness::Live);
        assert_eq!(live_summary.entries, 1);
        assert_eq!(live_summary.bytes, 5);
        assert_eq!(find(stale.id().as_str()).liveness, Liveness::Stale);
        assert_eq!(find("orphan").liveness, Liveness::Orphaned);
        assert_eq!(summaries.last().unwrap().id, "orphan");
    }

    #[tokio::test]
    async fn list_sessions_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let root = Location::local(temp.path().join("never-created"));
        assert!(list_sessions(&root, PERIOD).await.unwrap().is_empty());
    }
}
