//! Pluggable resource sources
//!
//! A [`ResourceSource`] turns a resource path produced by the layout into
//! raw unit text. The default reads from the filesystem; the in-memory
//! source serves tests and embedded unit sets.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use dotload_core::loader::{InMemorySource, ResourceSource};
//!
//! let source = InMemorySource::new().with_resource("pkg/__index__.unit", "let x = 1");
//! assert!(source.fetch(Path::new("pkg/__index__.unit")).unwrap().is_some());
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;


/// Source of raw unit content.
///
/// `Ok(None)` means the resource is absent; `Err` is reserved for failures
/// reading a resource that exists. Content that is not valid UTF-8 is
/// reported as [`io::ErrorKind::InvalidData`].
pub trait ResourceSource: Send + Sync {
    /// Fetch the content at `path`
    fn fetch(&self, path: &Path) -> io::Result<Option<String>>;

    /// Source name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// Reads unit resources from the filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemSource;

impl FileSystemSource {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceSource for FileSystemSource {
    fn fetch(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

/// In-memory unit resources keyed by path
#[derive(Debug, Default)]
pub struct InMemorySource {
    resources: RwLock<HashMap<PathBuf, String>>,
    fetches: AtomicU64,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Add or replace a resource
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.resources.write().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &Path) -> Option<String> {
        self.resources.write().remove(path)
    }

    /// Number of `fetch` calls served, hits and misses alike
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

impl ResourceSource for InMemorySource {
    fn fetch(&self, path: &Path) -> io::Result<Option<String>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.resources.read().get(path).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
