//! System configuration
//!
//! ```json
//! {
//!   "layout": { "root": "./units", "extension": "unit", "index_resource": "__index__" },
//!   "discover": true,
//!   "registry": { "restricted": ["pkg.secret"] },
//!   "environ": { "platform": "linux", "debug": false },
//!   "events": { "enabled": true, "capacity": 1024 }
//! }
//! ```
//!
//! With `discover` set, containers and leaves are found by scanning
//! `layout.root`; anything declared under `registry` is merged in.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DotloadError, Result};
use crate::loader::{LayoutConfig, Scalar};
use crate::registry::{discover_manifest, RegistryManifest, RestrictionEntry};
use crate::trace::EventLogConfig;

/// Configuration for an [`ImportSystem`](crate::ImportSystem)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Name-to-resource mapping
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Declared units and restrictions
    #[serde(default)]
    pub registry: RegistryManifest,

    /// Scan `layout.root` for units
    #[serde(default)]
    pub discover: bool,

    /// Bindings seeded into every namespace the registry loader materialises
    #[serde(default)]
    pub environ: BTreeMap<String, Scalar>,

    /// Resolution event log
    #[serde(default)]
    pub events: EventLogConfig,
}

impl SystemConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_registry(mut self, registry: RegistryManifest) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_discovery(mut self, discover: bool) -> Self {
        self.discover = discover;
        self
    }

    pub fn with_environ(mut self, key: impl Into<String>, value: Scalar) -> Self {
        self.environ.insert(key.into(), value);
        self
    }

    pub fn with_events(mut self, events: EventLogConfig) -> Self {
        self.events = events;
        self
    }

    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DotloadError::ConfigLoadError {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Load a configuration from a JSON file.
    ///
    /// A relative `layout.root` is resolved against the file's directory.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DotloadError::ConfigLoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut config: Self =
            serde_json::from_str(&content).map_err(|e| DotloadError::ConfigLoadError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if config.layout.root.is_relative() {
            if let Some(dir) = path.parent() {
                config.layout.root = dir.join(&config.layout.root);
            }
        }
        Ok(config)
    }

    /// The effective registry manifest, running discovery if enabled
    pub fn manifest(&self) -> Result<RegistryManifest> {
        if !self.discover {
            return Ok(self.registry.clone());
        }

        let mut manifest = discover_manifest(&self.layout)?;
        merge_names(&mut manifest.containers, &self.registry.containers);
        merge_names(&mut manifest.leaves, &self.registry.leaves);
        // a declared container overrides a discovered leaf of the same name
        manifest
            .leaves
            .retain(|leaf| !self.registry.containers.contains(leaf));
        manifest
            .restricted
            .extend(self.registry.restricted.iter().cloned());

        Ok(manifest)
    }

    /// Restriction entries as configured
    pub fn restricted(&self) -> &[RestrictionEntry] {
        &self.registry.restricted
    }
}

fn merge_names(into: &mut Vec<String>, extra: &[String]) {
    into.extend(extra.iter().cloned());
    into.sort();
    into.dedup();
}
