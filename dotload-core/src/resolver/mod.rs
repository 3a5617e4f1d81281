//! Resolvers and the resolution chain
//!
//! A resolver answers one question: "is this name mine?". It either passes
//! with [`Resolution::NotMine`] so the next resolver in the chain is asked,
//! or claims the name with a [`LoaderHandle`]. Claiming never checks the
//! restriction policy; that is a loading-time concern.
//!
//! ## Chain order
//!
//! ```text
//! request ──► [front ... back] ──► first Found wins
//!               │
//!               └─ register_resolver → front, append_resolver → back
//! ```

mod builtin;
mod chain;
mod registry_resolver;

pub use builtin::BuiltinResolver;
pub use chain::ResolutionChain;
pub use registry_resolver::RegistryResolver;

use std::path::PathBuf;

use crate::loader::LoaderHandle;
use crate::name::CodeUnitName;

/// One request as seen by a resolver
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    /// The dotted name being resolved
    pub name: &'a CodeUnitName,
    /// Search path of the enclosing container, if any
    pub search_hint: Option<&'a [PathBuf]>,
    /// Originator of the request; `None` at top level
    pub context: Option<&'a CodeUnitName>,
}

/// A resolver's answer
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Not handled here; ask the next resolver
    NotMine,
    /// Claimed; load through the handle
    Found(LoaderHandle),
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

/// A member of the resolution chain
pub trait Resolver: Send + Sync {
    /// Unique id within a chain
    fn id(&self) -> &str;

    /// Claim `request.name` or pass
    fn resolve(&self, request: &ResolveRequest<'_>) -> Resolution;
}
