//! Import system - the global resolution pipeline
//!
//! ```text
//! import("a.b.c")
//!   ├─ import ancestors first: "a", then "a.b" (each must be a container)
//!   └─ for each name:
//!        cache hit? ──► return cached unit
//!        else single-flight load:
//!          chain snapshot ──► resolver₁: NotMine ──► resolver₂: Found(handle)
//!                                                     └─ handle.load(system)
//! ```
//!
//! Nested requests from a unit's top-level code come back in through that
//! unit's [`ResolutionOverride`], which sets the originator for the
//! duration of the request.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::cache::{CacheStats, UnitCache};
use crate::config::SystemConfig;
use crate::context::{ContextTracker, ResolutionOverride};
use crate::error::{DotloadError, Result};
use crate::loader::{FileSystemSource, LoadedUnit, RegistryLoader, ResourceSource, Value};
use crate::name::CodeUnitName;
use crate::registry::Registry;
use crate::resolver::{RegistryResolver, Resolution, ResolutionChain, ResolveRequest, Resolver};
use crate::trace::{EventLog, EventLogConfig, Outcome, ResolutionEvent};

/// Shared state behind every [`ImportSystem`] handle
pub(crate) struct SystemInner {
    chain: RwLock<ResolutionChain>,
    cache: UnitCache,
    tracker: ContextTracker,
    events: EventLog,
}

/// Handle to a resolution pipeline. Clones share the same chain, cache and
/// context tracker.
#[derive(Clone)]
pub struct ImportSystem {
    inner: Arc<SystemInner>,
}

impl ImportSystem {
    /// Empty pipeline: no resolvers, default event log
    pub fn new() -> Self {
        Self::with_event_log(EventLogConfig::default())
    }

    pub fn with_event_log(config: EventLogConfig) -> Self {
        Self {
            inner: Arc::new(SystemInner {
                chain: RwLock::new(ResolutionChain::new()),
                cache: UnitCache::new(),
                tracker: ContextTracker::new(),
                events: EventLog::with_config(config),
            }),
        }
    }

    /// Build a pipeline with one registry resolver reading from the filesystem
    pub fn from_config(config: &SystemConfig) -> Result<Self> {
        Self::from_config_with_source(config, Arc::new(FileSystemSource::new()))
    }

    /// Like [`from_config`](Self::from_config) with a custom resource source
    pub fn from_config_with_source(
        config: &SystemConfig,
        source: Arc<dyn ResourceSource>,
    ) -> Result<Self> {
        let manifest = config.manifest()?;
        let registry = Arc::new(Registry::from_manifest(&manifest)?);

        let mut loader = RegistryLoader::with_source(registry, config.layout.clone(), source);
        for (key, value) in &config.environ {
            loader = loader.with_environ(key.clone(), value.clone());
        }

        let system = Self::with_event_log(config.events.clone());
        system.register_resolver(RegistryResolver::new(loader))?;

        tracing::info!(
            root = %config.layout.root.display(),
            units = manifest.containers.len() + manifest.leaves.len(),
            restricted = manifest.restricted.len(),
            "import system configured"
        );
        Ok(system)
    }

    pub(crate) fn from_inner(inner: Arc<SystemInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<SystemInner> {
        Arc::downgrade(&self.inner)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Chain membership
    // ═══════════════════════════════════════════════════════════════════════

    /// Add a resolver at the front of the chain
    pub fn register_resolver<R: Resolver + 'static>(&self, resolver: R) -> Result<()> {
        self.inner.chain.write().push_front(Arc::new(resolver))
    }

    /// Add a resolver at the back of the chain (fallback)
    pub fn append_resolver<R: Resolver + 'static>(&self, resolver: R) -> Result<()> {
        self.inner.chain.write().push_back(Arc::new(resolver))
    }

    /// Remove the resolver with `id`; loaded units stay cached
    pub fn unregister_resolver(&self, id: &str) -> Result<()> {
        self.inner.chain.write().remove(id).map(|_| ())
    }

    /// Resolver ids in consultation order
    pub fn resolver_ids(&self) -> Vec<String> {
        self.inner.chain.read().ids()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Resolution
    // ═══════════════════════════════════════════════════════════════════════

    /// Resolve and load `name`, with the current context as originator
    pub fn import(&self, name: &str) -> Result<Arc<LoadedUnit>> {
        self.import_with_hint(name, None)
    }

    /// Resolve and load `name`.
    ///
    /// `search_hint` applies to the outermost segment; every nested segment
    /// is resolved with its parent container's search path.
    pub fn import_with_hint(
        &self,
        name: &str,
        search_hint: Option<&[PathBuf]>,
    ) -> Result<Arc<LoadedUnit>> {
        let name = CodeUnitName::parse(name)?;
        let mut hint: Option<Vec<PathBuf>> = search_hint.map(<[PathBuf]>::to_vec);

        for ancestor in name.ancestors() {
            if self.inner.cache.is_loading_here(&ancestor) {
                // a container's own top-level code importing its children
                hint = None;
                continue;
            }

            let parent = self.import_one(&ancestor, hint.as_deref())?;
            if !parent.kind().is_container() {
                return Err(DotloadError::NotAContainer {
                    name: name.to_string(),
                    parent: ancestor.to_string(),
                });
            }
            hint = parent.search_path().map(<[PathBuf]>::to_vec);
        }

        self.import_one(&name, hint.as_deref())
    }

    /// Load `unit.attribute` and return the attribute's value
    pub fn load_attribute(&self, path: &str) -> Result<Value> {
        let (unit_name, attribute) = match path.rsplit_once('.') {
            Some((unit, attribute)) if !unit.is_empty() && !attribute.is_empty() => {
                (unit, attribute)
            }
            _ => {
                return Err(DotloadError::InvalidName {
                    name: path.to_string(),
                    reason: "expected '<unit>.<attribute>'".to_string(),
                })
            }
        };

        let unit = self.import(unit_name)?;
        unit.get(attribute)
            .cloned()
            .ok_or_else(|| DotloadError::AttributeNotFound {
                unit: unit_name.to_string(),
                attribute: attribute.to_string(),
            })
    }

    fn import_one(&self, name: &CodeUnitName, hint: Option<&[PathBuf]>) -> Result<Arc<LoadedUnit>> {
        let context = self.inner.tracker.current();
        let mut attempted = false;

        let lookup = self.inner.cache.get_or_load(name, || {
            attempted = true;
            self.find_and_load(name, hint, context.as_ref())
        });

        match lookup {
            Ok(lookup) => {
                if lookup.was_cached() {
                    tracing::debug!(
                        requested = %name,
                        context = ?context.as_ref().map(|c| c.as_str()),
                        outcome = "cache_hit",
                        "resolve"
                    );
                    self.record(ResolutionEvent::new(
                        name,
                        hint,
                        context.as_ref(),
                        Outcome::CacheHit,
                    ));
                }
                Ok(lookup.into_unit())
            }
            Err(e) => {
                // the chain records its own failures
                if !attempted {
                    self.record(ResolutionEvent::new(
                        name,
                        hint,
                        context.as_ref(),
                        failure_outcome(&e),
                    ));
                }
                Err(e)
            }
        }
    }

    fn find_and_load(
        &self,
        name: &CodeUnitName,
        hint: Option<&[PathBuf]>,
        context: Option<&CodeUnitName>,
    ) -> Result<Arc<LoadedUnit>> {
        // snapshot: registration never waits on an in-flight load
        let chain = self.inner.chain.read().clone();
        let request = ResolveRequest {
            name,
            search_hint: hint,
            context,
        };

        for resolver in chain.iter() {
            let handle = match resolver.resolve(&request) {
                Resolution::NotMine => {
                    self.record(
                        ResolutionEvent::new(name, hint, context, Outcome::NotMine)
                            .with_resolver(resolver.id()),
                    );
                    continue;
                }
                Resolution::Found(handle) => handle,
            };

            self.record(
                ResolutionEvent::new(name, hint, context, Outcome::Claimed)
                    .with_resolver(resolver.id()),
            );

            return match handle.load(self) {
                Ok(unit) => {
                    tracing::info!(
                        requested = %name,
                        context = ?context.map(|c| c.as_str()),
                        resolver = %resolver.id(),
                        outcome = "loaded",
                        "unit loaded"
                    );
                    self.record(
                        ResolutionEvent::new(name, hint, context, Outcome::Loaded)
                            .with_resolver(resolver.id()),
                    );
                    Ok(Arc::new(unit))
                }
                Err(e) => {
                    tracing::debug!(
                        requested = %name,
                        resolver = %resolver.id(),
                        error = %e,
                        outcome = "failed",
                        "load failed"
                    );
                    self.record(
                        ResolutionEvent::new(name, hint, context, failure_outcome(&e))
                            .with_resolver(resolver.id()),
                    );
                    Err(e)
                }
            };
        }

        tracing::debug!(
            requested = %name,
            context = ?context.map(|c| c.as_str()),
            outcome = "unresolved",
            "no resolver claimed the name"
        );
        let err = DotloadError::Unresolved {
            name: name.to_string(),
        };
        self.record(ResolutionEvent::new(name, hint, context, failure_outcome(&err)));
        Err(err)
    }

    fn record(&self, event: ResolutionEvent) {
        self.inner.events.record(event);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Cache and context access
    // ═══════════════════════════════════════════════════════════════════════

    /// A loaded unit, without resolving anything
    pub fn get(&self, name: &str) -> Option<Arc<LoadedUnit>> {
        let name = CodeUnitName::parse(name).ok()?;
        self.inner.cache.get(&name)
    }

    /// Forget a loaded unit; the next import executes it again
    pub fn invalidate(&self, name: &str) -> bool {
        match CodeUnitName::parse(name) {
            Ok(name) => self.inner.cache.invalidate(&name),
            Err(_) => false,
        }
    }

    pub fn loaded_names(&self) -> Vec<CodeUnitName> {
        self.inner.cache.loaded_names()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Originator of the request running on this thread, if any
    pub fn current_context(&self) -> Option<CodeUnitName> {
        self.inner.tracker.current()
    }

    pub fn tracker(&self) -> &ContextTracker {
        &self.inner.tracker
    }

    pub fn events(&self) -> &EventLog {
        &self.inner.events
    }

    /// The resolution entry point bound into `owner`'s namespace
    pub fn make_override(&self, owner: CodeUnitName) -> ResolutionOverride {
        ResolutionOverride::new(owner, self)
    }
}

fn failure_outcome(error: &DotloadError) -> Outcome {
    match error {
        DotloadError::AccessDenied {
            originator, rule, ..
        } => Outcome::Denied {
            originator: originator.clone(),
            rule: rule.clone(),
        },
        other => Outcome::Failed {
            code: other.error_code().to_string(),
            message: other.to_string(),
        },
    }
}

impl Default for ImportSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ImportSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportSystem")
            .field("resolvers", &self.resolver_ids())
            .field("loaded", &self.inner.cache.len())
            .finish()
    }
}
