//! Resolution chain
//!
//! An ordered list of resolvers with unique ids. The chain itself is a
//! plain value; the import system keeps it behind a lock and clones it per
//! request, so registration never waits on an in-flight load.

use std::fmt;
use std::sync::Arc;

use crate::error::{DotloadError, Result};

use super::{Resolution, ResolveRequest, Resolver};

/// Ordered resolvers, consulted front to back
#[derive(Clone, Default)]
pub struct ResolutionChain {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl ResolutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the front (highest priority)
    pub fn push_front(&mut self, resolver: Arc<dyn Resolver>) -> Result<()> {
        self.ensure_unique(resolver.id())?;
        self.resolvers.insert(0, resolver);
        Ok(())
    }

    /// Insert at the back (fallback)
    pub fn push_back(&mut self, resolver: Arc<dyn Resolver>) -> Result<()> {
        self.ensure_unique(resolver.id())?;
        self.resolvers.push(resolver);
        Ok(())
    }

    /// Remove the resolver with `id`
    pub fn remove(&mut self, id: &str) -> Result<Arc<dyn Resolver>> {
        let idx = self
            .resolvers
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| DotloadError::ResolverNotFound {
                resolver_id: id.to_string(),
            })?;
        Ok(self.resolvers.remove(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resolvers.iter().any(|r| r.id() == id)
    }

    /// Resolver ids in consultation order
    pub fn ids(&self) -> Vec<String> {
        self.resolvers.iter().map(|r| r.id().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Resolver>> {
        self.resolvers.iter()
    }

    /// First claim in chain order, without side effects on passes
    pub fn resolve(&self, request: &ResolveRequest<'_>) -> Resolution {
        self.resolvers
            .iter()
            .map(|r| r.resolve(request))
            .find(Resolution::is_found)
            .unwrap_or(Resolution::NotMine)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    fn ensure_unique(&self, id: &str) -> Result<()> {
        if self.contains(id) {
            return Err(DotloadError::ResolverAlreadyRegistered {
                resolver_id: id.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ResolutionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionChain")
            .field("resolvers", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::CodeUnitName;
    use crate::resolver::BuiltinResolver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        id: &'static str,
        calls: AtomicUsize,
    }

    impl Resolver for Counting {
        fn id(&self) -> &str {
            self.id
        }

        fn resolve(&self, _request: &ResolveRequest<'_>) -> Resolution {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Resolution::NotMine
        }
    }

    fn name(s: &str) -> CodeUnitName {
        CodeUnitName::parse(s).unwrap()
    }

    #[test]
    fn test_order_and_uniqueness() {
        let mut chain = ResolutionChain::new();
        chain.push_back(Arc::new(BuiltinResolver::new("b"))).unwrap();
        chain.push_front(Arc::new(BuiltinResolver::new("a"))).unwrap();
        chain.push_back(Arc::new(BuiltinResolver::new("c"))).unwrap();

        assert_eq!(chain.ids(), vec!["a", "b", "c"]);

        let err = chain
            .push_back(Arc::new(BuiltinResolver::new("b")))
            .unwrap_err();
        assert!(matches!(err, DotloadError::ResolverAlreadyRegistered { .. }));

        chain.remove("b").unwrap();
        assert_eq!(chain.ids(), vec!["a", "c"]);
        assert!(matches!(
            chain.remove("b"),
            Err(DotloadError::ResolverNotFound { .. })
        ));
    }

    #[test]
    fn test_first_claim_wins() {
        let before = Arc::new(Counting {
            id: "before",
            calls: AtomicUsize::new(0),
        });
        let after = Arc::new(Counting {
            id: "after",
            calls: AtomicUsize::new(0),
        });

        let mut chain = ResolutionChain::new();
        chain.push_back(before.clone()).unwrap();
        chain
            .push_back(Arc::new(BuiltinResolver::new("first").with_unit(name("json"))))
            .unwrap();
        chain
            .push_back(Arc::new(BuiltinResolver::new("second").with_unit(name("json"))))
            .unwrap();
        chain.push_back(after.clone()).unwrap();

        let json = name("json");
        let resolution = chain.resolve(&ResolveRequest {
            name: &json,
            search_hint: None,
            context: None,
        });

        match resolution {
            Resolution::Found(handle) => assert_eq!(handle.resolver_id(), "first"),
            Resolution::NotMine => panic!("json should be claimed"),
        }
        assert_eq!(before.calls.load(Ordering::SeqCst), 1);
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);
    }
}
