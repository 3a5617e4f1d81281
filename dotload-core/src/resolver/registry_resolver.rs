//! Registry-backed resolver

use std::fmt;
use std::sync::Arc;

use crate::loader::{Loader, LoaderHandle, RegistryLoader};
use crate::registry::Registry;

use super::{Resolution, ResolveRequest, Resolver};

/// Default chain id of a [`RegistryResolver`]
pub const DEFAULT_RESOLVER_ID: &str = "registry";

/// Claims every name its registry knows, restricted or not
pub struct RegistryResolver {
    id: String,
    registry: Arc<Registry>,
    loader: Arc<RegistryLoader>,
}

impl RegistryResolver {
    pub fn new(loader: RegistryLoader) -> Self {
        Self {
            id: DEFAULT_RESOLVER_ID.to_string(),
            registry: Arc::clone(loader.registry()),
            loader: Arc::new(loader),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn loader(&self) -> &Arc<RegistryLoader> {
        &self.loader
    }
}

impl Resolver for RegistryResolver {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolve(&self, request: &ResolveRequest<'_>) -> Resolution {
        let kind = self.registry.is_known(request.name);

        tracing::debug!(
            resolver = %self.id,
            requested = %request.name,
            hint = ?request.search_hint,
            context = ?request.context.map(|c| c.as_str()),
            outcome = if kind.is_some() { "claimed" } else { "not_mine" },
            "resolve"
        );

        match kind {
            Some(kind) => {
                let loader: Arc<dyn Loader> = self.loader.clone();
                Resolution::Found(
                    LoaderHandle::new(request.name.clone(), kind, self.id.clone(), loader)
                        .with_search_hint(request.search_hint),
                )
            }
            None => Resolution::NotMine,
        }
    }
}

impl fmt::Debug for RegistryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryResolver")
            .field("id", &self.id)
            .field("units", &self.registry.len())
            .finish()
    }
}
