//! # dotload - context-aware code unit loading
//!
//! dotload resolves dotted names (`pkg.sub.mod`) to executable code units
//! through an ordered chain of resolvers, and tags every nested request with
//! the identity of the unit that issued it:
//!
//! - **Registry**: which names are containers, which are leaves, which are
//!   restricted and who is exempt
//! - **Resolver chain**: the first resolver to claim a name wins; the rest
//!   are never consulted
//! - **Loader**: locate → check restriction → fetch → compile → materialise
//!   → execute
//! - **Context tracking**: each loaded unit gets its own resolution override,
//!   so restriction checks on nested requests see the real originator
//!
//! ## Core Principle
//!
//! > Knowing a name exists never implies permission to load it.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dotload_core::{
//!     DotloadError, ImportSystem, InMemorySource, LayoutConfig, Registry, RegistryLoader,
//!     RegistryManifest, RegistryResolver,
//! };
//!
//! let manifest = RegistryManifest::new()
//!     .with_container("pkg")
//!     .with_leaf("pkg.mod")
//!     .with_leaf("pkg.secret")
//!     .with_restricted("pkg.secret");
//! let registry = Arc::new(Registry::from_manifest(&manifest).unwrap());
//!
//! let source = InMemorySource::new()
//!     .with_resource("units/pkg/__index__.unit", "let version = 1")
//!     .with_resource("units/pkg/mod.unit", "import pkg.secret as secret")
//!     .with_resource("units/pkg/secret.unit", "let key = \"hunter2\"");
//!
//! let loader =
//!     RegistryLoader::with_source(registry, LayoutConfig::new("units"), Arc::new(source));
//!
//! let system = ImportSystem::new();
//! system.register_resolver(RegistryResolver::new(loader)).unwrap();
//!
//! // pkg.mod's nested import is denied, and the error names who asked
//! match system.import("pkg.mod") {
//!     Err(DotloadError::AccessDenied { name, originator, .. }) => {
//!         assert_eq!(name, "pkg.secret");
//!         assert_eq!(originator.as_deref(), Some("pkg.mod"));
//!     }
//!     other => panic!("unexpected: {:?}", other),
//! }
//! assert!(system.get("pkg.mod").is_none());
//! assert!(system.get("pkg").is_some());
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod name;
pub mod registry;
pub mod resolver;
pub mod system;
pub mod trace;

// Re-export main types
pub use cache::{CacheLookup, CacheStats, UnitCache};
pub use config::SystemConfig;
pub use context::{ContextGuard, ContextTracker, ResolutionOverride};
pub use error::{DotloadError, ErrorCategory, ErrorDetail, ErrorResponse, Result};
pub use loader::{
    FileSystemSource, InMemorySource, LayoutConfig, LoadedUnit, Loader, LoaderHandle, Namespace,
    RegistryLoader, ResourceSource, Scalar, UnitScript, Value,
};
pub use name::{CodeUnitName, UnitKind};
pub use registry::{
    discover_manifest, NamePattern, Registry, RegistryManifest, RestrictionDecision,
    RestrictionEntry, RestrictionRule,
};
pub use resolver::{
    BuiltinResolver, RegistryResolver, Resolution, ResolutionChain, ResolveRequest, Resolver,
};
pub use system::ImportSystem;
pub use trace::{EventLog, EventLogConfig, Outcome, ResolutionEvent};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
