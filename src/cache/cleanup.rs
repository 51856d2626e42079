//! Background cleanup of the shared cache root
//!
//! One task per engine wakes every cleanup period, starting immediately, and
//! runs two independent phases:
//!
//! | Phase | Scope | Action |
//! |-------|-------|--------|
//! | A: reap | sibling sessions | heartbeat own marker, delete dead siblings |
//! | B: trim | own session | keep the `max_entries` most recently touched entries |
//!
//! Failures are logged and counted, never propagated: this task is the only
//! thing reclaiming space, so one bad cycle must not stop the next.

use crate::cache::session::{is_cache_entry, marker_time, Liveness, Session, SessionId};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::store::{Location, LocationStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// How often cleanup runs and how much each session may keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub period: Duration,
    pub max_entries: usize,
}

impl CleanupPolicy {
    pub fn new(period: Duration, max_entries: usize) -> Self {
        Self {
            period,
            max_entries,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.cleanup_period(), config.max_entries)
    }
}

/// Outcome of one cleanup cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Ids of sibling sessions deleted in phase A
    pub reaped: Vec<String>,
    /// Own entries deleted in phase B
    pub trimmed: usize,
    /// Operations that failed and were skipped
    pub failures: usize,
}

/// A sibling session judged dead
#[derive(Debug, Clone)]
pub struct DeadSession {
    pub location: Location,
    pub liveness: Liveness,
    pub heartbeat: Option<DateTime<Utc>>,
}

impl DeadSession {
    pub fn id(&self) -> &str {
        self.location.name().unwrap_or_default()
    }
}

/// Find sessions under `root` whose marker is missing or stale
///
/// `own` is never reported. Entries whose marker cannot be read are logged
/// and skipped.
pub async fn find_dead_sessions(
    root: &Location,
    own: Option<&SessionId>,
    period: Duration,
    now: DateTime<Utc>,
) -> CacheResult<Vec<DeadSession>> {
    let children = root
        .list_status()
        .await
        .map_err(|e| CacheError::io(format!("listing cache root {}", root), e))?;

    let mut dead = Vec::new();
    for child in children {
        if own.is_some_and(|id| child.name() == Some(id.as_str())) {
            continue;
        }

        // A stray file at the root can never hold a marker
        let heartbeat = if child.is_directory {
            match marker_time(&child.location).await {
                Ok(time) => time,
                Err(e) => {
                    warn!("Failed to read marker of {}: {}", child.location, e);
                    continue;
                }
            }
        } else {
            None
        };

        let liveness = Liveness::classify(heartbeat, now, period);
        if liveness.is_dead() {
            dead.push(DeadSession {
                location: child.location,
                liveness,
                heartbeat,
            });
        }
    }

    Ok(dead)
}

/// Recursively delete dead sessions, recording results in `report`
pub async fn reap_sessions(dead: &[DeadSession], report: &mut CycleReport) {
    for session in dead {
        match session.location.delete(true).await {
            Ok(()) => {
                info!("Reaped {} cache session {}", session.liveness, session.id());
                report.reaped.push(session.id().to_string());
            }
            Err(e) => {
                error!("Failed to cleanup location {}: {}", session.location, e);
                report.failures += 1;
            }
        }
    }
}

/// Periodic cleanup bound to one live session
pub struct CleanupTask {
    root: Location,
    session: Session,
    policy: CleanupPolicy,
}

impl CleanupTask {
    pub fn new(root: Location, session: Session, policy: CleanupPolicy) -> Self {
        Self {
            root,
            session,
            policy,
        }
    }

    /// Run both phases once
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        if let Err(e) = self.reap_phase(&mut report).await {
            error!("Failed to reap dead cache sessions: {}", e);
            report.failures += 1;
        }

        if let Err(e) = self.trim_phase(&mut report).await {
            error!("Failed to trim cache session {}: {}", self.session.id(), e);
            report.failures += 1;
        }

        debug!(
            "Cleanup cycle for session {}: reaped {}, trimmed {}, failures {}",
            self.session.id(),
            report.reaped.len(),
            report.trimmed,
            report.failures
        );
        report
    }

    /// Phase A: heartbeat, then delete dead sibling sessions
    async fn reap_phase(&self, report: &mut CycleReport) -> CacheResult<()> {
        let now = Utc::now();

        // A failed heartbeat does not stop us judging others
        if let Err(e) = self.session.heartbeat().await {
            warn!("Heartbeat failed for session {}: {}", self.session.id(), e);
            report.failures += 1;
        }

        let dead = find_dead_sessions(
            &self.root,
            Some(self.session.id()),
            self.policy.period,
            now,
        )
        .await?;
        reap_sessions(&dead, report).await;
        Ok(())
    }

    /// Phase B: delete the least recently touched entries beyond the limit
    async fn trim_phase(&self, report: &mut CycleReport) -> CacheResult<()> {
        let dir = self.session.dir();
        let mut entries: Vec<LocationStatus> = dir
            .list_status()
            .await
            .map_err(|e| CacheError::io(format!("listing session {}", dir), e))?
            .into_iter()
            .filter(is_cache_entry)
            .collect();

        if entries.len() <= self.policy.max_entries {
            return Ok(());
        }

        entries.sort_by_key(|entry| entry.last_modified);
        let excess = entries.len() - self.policy.max_entries;

        for entry in &entries[..excess] {
            match entry.location.delete(false).await {
                Ok(()) => {
                    debug!("Trimmed cache entry {}", entry.location);
                    report.trimmed += 1;
                }
                Err(e) => {
                    warn!("Failed to trim cache entry {}: {}", entry.location, e);
                    report.failures += 1;
                }
            }
        }

        Ok(())
    }

    /// Start the periodic task; the first cycle runs immediately
    pub fn spawn(self) -> CleanupHandle {
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.policy.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    // Fires on explicit stop and when the handle is dropped
                    _ = &mut shutdown_rx => break,

                    _ = interval.tick() => {
                        self.run_cycle().await;
                    }
                }
            }

            debug!("Cleanup task for session {} stopped", self.session.id());
        });

        CleanupHandle { shutdown, task }
    }
}

/// Handle to a running cleanup task
///
/// Dropping the handle cancels future cycles without waiting.
pub struct CleanupHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Cancel future cycles and wait for an in-flight one to finish
    pub async fn stop(self) {
        let CleanupHandle { shutdown, task } = self;
        let _ = shutdown.send(());
        if let Err(e) = task.await {
            warn!("Cleanup task ended abnormally: {}", e);
        }
    }
}
