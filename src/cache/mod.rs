//! Session-scoped bundle cache
//!
//! Bundles are stored under a shared root, one directory per process
//! session, each entry named by the content hash of its inputs:
//!
//! ```text
//! <root>/<session-id>/active        liveness marker (mtime = last heartbeat)
//! <root>/<session-id>/<sha256-hex>  published bundle
//! <root>/<session-id>/<hash>.<nonce>.tmp  bundle being built
//! ```
//!
//! # Session States
//!
//! | State | Marker | Reaped by siblings |
//! |-------|--------|--------------------|
//! | Live | touched within 4 cleanup periods | no |
//! | Stale | older than 4 cleanup periods | yes |
//! | Orphaned | missing | yes |

pub mod cleanup;
pub mod engine;
pub mod hasher;
pub mod session;

pub use cleanup::{
    find_dead_sessions, reap_sessions, CleanupHandle, CleanupPolicy, CleanupTask, CycleReport,
    DeadSession,
};
pub use engine::{BundleCache, Produced};
pub use hasher::{hash_inputs, ContentHash, ContentHasher};
pub use session::{list_sessions, Liveness, Session, SessionId, SessionSummary};
