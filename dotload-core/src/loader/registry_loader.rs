//! Registry-backed loader

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{DotloadError, Result};
use crate::name::UnitKind;
use crate::registry::{Registry, RestrictionDecision};
use crate::system::ImportSystem;

use super::layout::LayoutConfig;
use super::script::UnitScript;
use super::source::{FileSystemSource, ResourceSource};
use super::unit::{LoadedUnit, Namespace, Value};
use super::{Loader, LoaderHandle};

/// Loads registry units from a resource source using a fixed layout
pub struct RegistryLoader {
    registry: Arc<Registry>,
    layout: LayoutConfig,
    source: Arc<dyn ResourceSource>,
    environ: BTreeMap<String, Value>,
}

impl RegistryLoader {
    /// Loader reading from the filesystem under `layout.root`
    pub fn new(registry: Arc<Registry>, layout: LayoutConfig) -> Self {
        Self::with_source(registry, layout, Arc::new(FileSystemSource::new()))
    }

    pub fn with_source(
        registry: Arc<Registry>,
        layout: LayoutConfig,
        source: Arc<dyn ResourceSource>,
    ) -> Self {
        Self {
            registry,
            layout,
            source,
            environ: BTreeMap::new(),
        }
    }

    /// Seed `key` into every namespace this loader materialises
    pub fn with_environ(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.environ.insert(key.into(), value.into());
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn environ(&self) -> &BTreeMap<String, Value> {
        &self.environ
    }
}

impl Loader for RegistryLoader {
    fn load(&self, handle: &LoaderHandle, system: &ImportSystem) -> Result<LoadedUnit> {
        let name = handle.name();
        let kind = handle.kind();
        let path = self.layout.locate(name, kind);

        // Restriction is decided before the resource is even read
        let originator = system.tracker().current();
        if let RestrictionDecision::Denied { rule, .. } =
            self.registry.check_access(name, originator.as_ref())
        {
            tracing::warn!(
                requested = %name,
                context = ?originator.as_ref().map(|o| o.as_str()),
                rule = %rule,
                outcome = "denied",
                "restricted unit"
            );
            return Err(DotloadError::AccessDenied {
                name: name.to_string(),
                originator: originator.map(|o| o.to_string()),
                rule,
            });
        }

        let content = match self.source.fetch(&path) {
            Ok(Some(content)) => content,
            Ok(None) => {
                return Err(DotloadError::ResourceNotFound {
                    name: name.to_string(),
                    path: path.display().to_string(),
                })
            }
            // bytes that are not text can never compile
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(DotloadError::CompileFailure {
                    name: name.to_string(),
                    line: 0,
                    detail: format!("{}: {}", path.display(), e),
                })
            }
            Err(e) => {
                return Err(DotloadError::ResourceUnreadable {
                    name: name.to_string(),
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        let digest = compute_digest(&content);

        let script = UnitScript::compile(name, &content)?;

        let mut namespace = Namespace::new(name.clone());
        for (key, value) in &self.environ {
            namespace.set(key.clone(), value.clone());
        }
        let resolution = system.make_override(name.clone());

        script.execute(&mut namespace, &resolution)?;

        tracing::debug!(
            unit = %name,
            kind = %kind,
            path = %path.display(),
            statements = script.len(),
            "unit executed"
        );

        let unit = LoadedUnit::new(namespace, kind, resolution).with_origin(path, digest);
        Ok(match kind {
            UnitKind::Container => unit.with_search_path(self.layout.search_path(name)),
            UnitKind::Leaf => unit,
        })
    }

    fn name(&self) -> &'static str {
        "registry"
    }
}

impl fmt::Debug for RegistryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryLoader")
            .field("units", &self.registry.len())
            .field("layout", &self.layout)
            .field("source", &self.source.name())
            .field("environ", &self.environ.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// SHA-256 hex digest of unit content
fn compute_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
