//! Builtin resolver
//!
//! Serves units whose namespaces are supplied programmatically rather than
//! loaded from resources. Typically appended at the back of the chain as the
//! fallback for names no registry knows.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::loader::{LoadedUnit, Loader, LoaderHandle, Namespace, Value};
use crate::name::{CodeUnitName, UnitKind};
use crate::system::ImportSystem;

use super::{Resolution, ResolveRequest, Resolver};

type UnitTable = BTreeMap<CodeUnitName, BTreeMap<String, Value>>;

/// Resolver for programmatically defined units.
///
/// Registering `a.b` also registers `a` (empty) so parent-first imports
/// succeed. A unit is a container when another registered unit sits below it.
#[derive(Debug, Clone)]
pub struct BuiltinResolver {
    id: String,
    units: Arc<UnitTable>,
}

impl BuiltinResolver {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            units: Arc::new(BTreeMap::new()),
        }
    }

    /// Register `name` (and its ancestors) with an empty namespace
    pub fn with_unit(mut self, name: CodeUnitName) -> Self {
        self.entry(name);
        self
    }

    /// Bind `attribute` in the namespace of `unit`, registering it if needed
    pub fn with_attribute(
        mut self,
        unit: CodeUnitName,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.entry(unit).insert(attribute.into(), value.into());
        self
    }

    pub fn contains(&self, name: &CodeUnitName) -> bool {
        self.units.contains_key(name)
    }

    /// Kind of a registered unit
    pub fn kind_of(&self, name: &CodeUnitName) -> Option<UnitKind> {
        if !self.units.contains_key(name) {
            return None;
        }
        let has_children = self.units.keys().any(|other| name.is_ancestor_of(other));
        Some(if has_children {
            UnitKind::Container
        } else {
            UnitKind::Leaf
        })
    }

    fn entry(&mut self, name: CodeUnitName) -> &mut BTreeMap<String, Value> {
        let units = Arc::make_mut(&mut self.units);
        for ancestor in name.ancestors() {
            units.entry(ancestor).or_default();
        }
        units.entry(name).or_default()
    }
}

impl Resolver for BuiltinResolver {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolve(&self, request: &ResolveRequest<'_>) -> Resolution {
        let kind = self.kind_of(request.name);

        tracing::debug!(
            resolver = %self.id,
            requested = %request.name,
            context = ?request.context.map(|c| c.as_str()),
            outcome = if kind.is_some() { "claimed" } else { "not_mine" },
            "resolve"
        );

        match kind {
            Some(kind) => {
                let loader: Arc<dyn Loader> = Arc::new(BuiltinLoader {
                    units: Arc::clone(&self.units),
                });
                Resolution::Found(
                    LoaderHandle::new(request.name.clone(), kind, self.id.clone(), loader)
                        .with_search_hint(request.search_hint),
                )
            }
            None => Resolution::NotMine,
        }
    }
}

struct BuiltinLoader {
    units: Arc<UnitTable>,
}

impl Loader for BuiltinLoader {
    fn load(&self, handle: &LoaderHandle, system: &ImportSystem) -> Result<LoadedUnit> {
        let name = handle.name();
        let mut namespace = Namespace::new(name.clone());
        if let Some(attrs) = self.units.get(name) {
            for (key, value) in attrs {
                namespace.set(key.clone(), value.clone());
            }
        }

        Ok(LoadedUnit::new(
            namespace,
            handle.kind(),
            system.make_override(name.clone()),
        ))
    }

    fn name(&self) -> &'static str {
        "builtin"
    }
}
