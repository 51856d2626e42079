//! Error types for bundle-cache
//!
//! All modules use `CacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bundle-cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur in bundle-cache
#[derive(Error, Debug)]
pub enum CacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache root {path} is unusable: {source}")]
    CacheRootUnusable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Session errors
    #[error("Failed to start cache session {session}: {source}")]
    SessionStart {
        session: String,
        #[source]
        source: std::io::Error,
    },

    // Bundle errors
    #[error("Bundle build failed for {target}: {reason}")]
    Bundle { target: String, reason: String },

    #[error("Invalid class reference: {0}")]
    ClassRefInvalid(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a bundle build error
    pub fn bundle(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Bundle {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error comes from a missing file or directory
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io { source, .. }
            | Self::CacheRootUnusable { source, .. }
            | Self::SessionStart { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigInvalid { .. } => Some("Check the [cache] section of your config file"),
            Self::CacheRootUnusable { .. } => {
                Some("Point cache.root at a writable directory, or pass --no-cache")
            }
            Self::ClassRefInvalid(_) => Some("Classes are given as NAME=PATH"),
            _ => None,
        }
    }
}
