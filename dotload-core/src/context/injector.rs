//! Resolution Override Injector
//!
//! Every loaded unit gets its own [`ResolutionOverride`], bound once at
//! materialisation. It differs from the system's entry point in one way:
//! each request runs inside `with_context(owner, ..)`, so the chain and the
//! restriction check see the owning unit as originator.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use crate::error::{DotloadError, Result};
use crate::loader::{LoadedUnit, Value};
use crate::name::CodeUnitName;
use crate::system::{ImportSystem, SystemInner};

/// Per-unit resolution entry point
#[derive(Clone)]
pub struct ResolutionOverride {
    owner: CodeUnitName,
    // Weak: units are owned by the system's cache, so a strong handle
    // here would keep the system alive through its own cache.
    system: Weak<SystemInner>,
}

impl ResolutionOverride {
    pub(crate) fn new(owner: CodeUnitName, system: &ImportSystem) -> Self {
        Self {
            owner,
            system: system.downgrade(),
        }
    }

    /// The unit this override is bound to
    pub fn owner(&self) -> &CodeUnitName {
        &self.owner
    }

    /// Whether the backing import system is still alive
    pub fn is_attached(&self) -> bool {
        self.system.strong_count() > 0
    }

    /// Resolve `name` through the full chain with the owner as originator
    pub fn import(&self, name: &str) -> Result<Arc<LoadedUnit>> {
        self.import_with_hint(name, None)
    }

    /// Like [`import`](Self::import), passing a search-path hint to the chain
    pub fn import_with_hint(
        &self,
        name: &str,
        search_hint: Option<&[PathBuf]>,
    ) -> Result<Arc<LoadedUnit>> {
        let system = self.system()?;
        system
            .tracker()
            .with_context(self.owner.clone(), || system.import_with_hint(name, search_hint))
    }

    /// Resolve `unit.attribute` with the owner as originator
    pub fn load_attribute(&self, path: &str) -> Result<Value> {
        let system = self.system()?;
        system
            .tracker()
            .with_context(self.owner.clone(), || system.load_attribute(path))
    }

    fn system(&self) -> Result<ImportSystem> {
        self.system
            .upgrade()
            .map(ImportSystem::from_inner)
            .ok_or(DotloadError::SystemUnavailable)
    }
}

impl fmt::Debug for ResolutionOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionOverride")
            .field("owner", &self.owner)
            .field("attached", &self.is_attached())
            .finish()
    }
}
