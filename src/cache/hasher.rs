//! Content hashing over ordered byte sources
//!
//! The cache key of a bundle request is the SHA-256 of every class body
//! followed by every resource body, concatenated in caller order. Sources
//! are streamed through the digest, never loaded whole.
//!
//! The key is order-sensitive: the same inputs presented in a different
//! order may hash differently. Callers that want order-independent keys
//! sort their inputs first.

use crate::bundle::ClassRef;
use crate::error::{CacheError, CacheResult};
use crate::store::Location;
use sha2::{Digest, Sha256};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Hex-encoded SHA-256 digest identifying a cache slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for display
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental hasher fed from async readers
pub struct ContentHasher {
    digest: Sha256,
    buffer: Vec<u8>,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            digest: Sha256::new(),
            buffer: vec![0; READ_BUFFER_SIZE],
        }
    }

    /// Stream a reader to EOF into the digest, returning the bytes consumed
    pub async fn update_from<R>(&mut self, reader: &mut R) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut consumed = 0u64;
        loop {
            let n = reader.read(&mut self.buffer).await?;
            if n == 0 {
                break;
            }
            self.digest.update(&self.buffer[..n]);
            consumed += n as u64;
        }
        Ok(consumed)
    }

    /// Open a location and stream it into the digest
    pub async fn update_from_location(&mut self, location: &Location) -> CacheResult<u64> {
        let mut reader = location
            .open_read()
            .await
            .map_err(|e| CacheError::io(format!("opening {} for hashing", location), e))?;

        self.update_from(&mut reader)
            .await
            .map_err(|e| CacheError::io(format!("hashing {}", location), e))
    }

    pub fn finish(self) -> ContentHash {
        ContentHash(hex::encode(self.digest.finalize()))
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash the bodies of `classes` followed by `resources`
pub async fn hash_inputs(classes: &[ClassRef], resources: &[Location]) -> CacheResult<ContentHash> {
    let mut hasher = ContentHasher::new();

    for class in classes {
        hasher.update_from_location(class.location()).await?;
    }
    for resource in resources {
        hasher.update_from_location(resource).await?;
    }

    Ok(hasher.finish())
}
