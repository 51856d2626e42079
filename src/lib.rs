//! bundle-cache - session-scoped content-addressed bundle cache
//!
//! Wraps a bundle builder so identical requests within one process reuse
//! the bundle built the first time, while a background task reclaims space
//! left behind by sessions that have died.

pub mod bundle;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod store;
pub mod ui;

pub use error::{CacheError, CacheResult};
