//! Loaders
//!
//! A [`Loader`] turns a [`LoaderHandle`] claimed by a resolver into a
//! [`LoadedUnit`]. The registry loader runs the full pipeline:
//!
//! ```text
//! locate → check restriction → fetch → compile → materialise → execute
//! ```
//!
//! Failure at any step aborts the load; the partially built namespace is
//! dropped and never reaches a caller.

mod layout;
mod registry_loader;
mod script;
mod source;
mod unit;

pub use layout::{LayoutConfig, DEFAULT_EXTENSION, DEFAULT_INDEX_RESOURCE};
pub use registry_loader::RegistryLoader;
pub use script::{Literal, Statement, UnitScript};
pub use source::{FileSystemSource, InMemorySource, ResourceSource};
pub use unit::{LoadedUnit, Namespace, Scalar, Value, NAME_ATTRIBUTE};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::name::{CodeUnitName, UnitKind};
use crate::system::ImportSystem;

/// Produces loaded units for handles issued by a resolver
pub trait Loader: Send + Sync {
    /// Load the unit named by `handle`.
    ///
    /// `system` is the pipeline the unit's nested requests re-enter; the
    /// current originator is available through `system.tracker()`.
    fn load(&self, handle: &LoaderHandle, system: &ImportSystem) -> Result<LoadedUnit>;

    /// Loader name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// A resolver's claim on a name, bound to the loader that will produce it
#[derive(Clone)]
pub struct LoaderHandle {
    name: CodeUnitName,
    kind: UnitKind,
    search_hint: Option<Vec<PathBuf>>,
    resolver: String,
    loader: Arc<dyn Loader>,
}

impl LoaderHandle {
    pub fn new(
        name: CodeUnitName,
        kind: UnitKind,
        resolver: impl Into<String>,
        loader: Arc<dyn Loader>,
    ) -> Self {
        Self {
            name,
            kind,
            search_hint: None,
            resolver: resolver.into(),
            loader,
        }
    }

    pub fn with_search_hint(mut self, search_hint: Option<&[PathBuf]>) -> Self {
        self.search_hint = search_hint.map(<[PathBuf]>::to_vec);
        self
    }

    pub fn name(&self) -> &CodeUnitName {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn search_hint(&self) -> Option<&[PathBuf]> {
        self.search_hint.as_deref()
    }

    /// Id of the resolver that issued this handle
    pub fn resolver_id(&self) -> &str {
        &self.resolver
    }

    /// Run the bound loader
    pub fn load(&self, system: &ImportSystem) -> Result<LoadedUnit> {
        self.loader.load(self, system)
    }
}

impl fmt::Debug for LoaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderHandle")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("search_hint", &self.search_hint)
            .field("resolver", &self.resolver)
            .field("loader", &self.loader.name())
            .finish()
    }
}
