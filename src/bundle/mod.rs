//! Bundle building abstraction
//!
//! A [`Bundler`] turns an ordered set of classes plus extra resources into a
//! single packaged artifact at a target [`Location`]. The cache engine wraps
//! any bundler and is itself a bundler.

mod archive;

pub use archive::ArchiveBundler;

use crate::error::{CacheError, CacheResult};
use crate::store::Location;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Produces a packaged artifact from classes and resources
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Write a bundle containing `classes` and `resources` to `target`
    ///
    /// Classes are given in caller order, resources follow them.
    async fn create_bundle(
        &self,
        target: &Location,
        classes: &[ClassRef],
        resources: &[Location],
    ) -> CacheResult<()>;
}

/// A compiled unit to include in a bundle
///
/// `name` is the entry name inside the bundle (for example
/// `com/example/Main.class`); `location` is where its bytes are read from.
/// Two class references are the same class when their names match.
#[derive(Clone)]
pub struct ClassRef {
    name: String,
    location: Location,
}

impl ClassRef {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }

    /// Parse a `NAME=PATH` pair referring to the local filesystem
    pub fn parse_local(pair: &str) -> CacheResult<Self> {
        let (name, path) = pair
            .split_once('=')
            .ok_or_else(|| CacheError::ClassRefInvalid(format!("no '=' found in '{pair}'")))?;

        if name.is_empty() || path.is_empty() {
            return Err(CacheError::ClassRefInvalid(format!(
                "empty name or path in '{pair}'"
            )));
        }

        Ok(Self::new(name, Location::local(path)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRef")
            .field("name", &self.name)
            .field("location", &self.location.path())
            .finish()
    }
}

/// Build an insertion-ordered class set, dropping repeated names
pub fn class_set(classes: impl IntoIterator<Item = ClassRef>) -> Vec<ClassRef> {
    let mut seen = HashSet::new();
    classes
        .into_iter()
        .filter(|class| seen.insert(class.name.clone()))
        .collect()
}
