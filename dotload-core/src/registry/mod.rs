//! Registry - static knowledge of resolvable units
//!
//! The registry answers two questions and nothing else:
//!
//! - is this dotted name known, and is it a container or a leaf?
//! - is this dotted name restricted, and is the current originator exempt?
//!
//! It is built once from a [`RegistryManifest`] and is immutable afterwards,
//! so it is shared freely between resolvers, loaders and threads behind an
//! `Arc`.

mod discover;
mod manifest;
mod pattern;

pub use discover::discover_manifest;
pub use manifest::{RegistryManifest, RestrictionEntry};
pub use pattern::{NamePattern, RestrictionRule};

use std::collections::HashMap;

use crate::error::{DotloadError, Result};
use crate::name::{CodeUnitName, UnitKind};

/// Outcome of a restriction check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestrictionDecision {
    /// The load may proceed
    Allowed,
    /// The load is denied by the rule whose pattern is `rule`
    Denied { name: CodeUnitName, rule: String },
}

impl RestrictionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RestrictionDecision::Allowed)
    }
}

/// Immutable registry of known and restricted units
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Known units by name
    units: HashMap<CodeUnitName, UnitKind>,

    /// Restriction rules, in declaration order
    rules: Vec<RestrictionRule>,
}

impl Registry {
    /// Create an empty registry (knows nothing, restricts nothing)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a manifest, rejecting inconsistent declarations
    pub fn from_manifest(manifest: &RegistryManifest) -> Result<Self> {
        manifest
            .validate()
            .map_err(|errors| DotloadError::InvalidRegistry {
                reason: errors.join("; "),
            })?;

        let mut units = HashMap::new();
        for raw in &manifest.containers {
            units.insert(CodeUnitName::parse(raw)?, UnitKind::Container);
        }
        for raw in &manifest.leaves {
            units.insert(CodeUnitName::parse(raw)?, UnitKind::Leaf);
        }

        let mut rules = Vec::with_capacity(manifest.restricted.len());
        for entry in &manifest.restricted {
            let mut rule = RestrictionRule::new(NamePattern::compile(entry.pattern())?);
            for origin in entry.allow_from() {
                rule = rule.allow_from(NamePattern::compile(origin)?);
            }
            if let Some(reason) = entry.reason() {
                rule = rule.with_reason(reason);
            }
            rules.push(rule);
        }

        Ok(Self { units, rules })
    }

    /// Kind of a known unit, `None` if this registry does not know the name
    pub fn is_known(&self, name: &CodeUnitName) -> Option<UnitKind> {
        self.units.get(name).copied()
    }

    /// Whether any restriction rule covers `name`, regardless of originator
    pub fn is_restricted(&self, name: &CodeUnitName) -> bool {
        self.rules.iter().any(|rule| rule.applies_to(name.as_str()))
    }

    /// Decide whether `originator` may load `name`.
    ///
    /// Every rule covering the name must exempt the originator; the first
    /// rule that does not decides the denial.
    pub fn check_access(
        &self,
        name: &CodeUnitName,
        originator: Option<&CodeUnitName>,
    ) -> RestrictionDecision {
        for rule in self.rules.iter().filter(|r| r.applies_to(name.as_str())) {
            if !rule.permits(originator) {
                return RestrictionDecision::Denied {
                    name: name.clone(),
                    rule: rule.pattern().as_str().to_string(),
                };
            }
        }
        RestrictionDecision::Allowed
    }

    /// Restriction rules in declaration order
    pub fn rules(&self) -> &[RestrictionRule] {
        &self.rules
    }

    /// Known container names, sorted
    pub fn containers(&self) -> Vec<&CodeUnitName> {
        self.names_of(UnitKind::Container)
    }

    /// Known leaf names, sorted
    pub fn leaves(&self) -> Vec<&CodeUnitName> {
        self.names_of(UnitKind::Leaf)
    }

    /// Number of known units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn names_of(&self, kind: UnitKind) -> Vec<&CodeUnitName> {
        let mut names: Vec<&CodeUnitName> = self
            .units
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(n, _)| n)
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> CodeUnitName {
        CodeUnitName::parse(s).unwrap()
    }

    fn sample() -> Registry {
        let manifest = RegistryManifest::new()
            .with_container("pkg")
            .with_container("pkg.internal")
            .with_leaf("pkg.mod")
            .with_leaf("pkg.secret")
            .with_leaf("pkg.internal.db")
            .with_restricted("pkg.secret")
            .with_rule(RestrictionEntry::Rule {
                pattern: "pkg.internal.*".to_string(),
                allow_from: vec!["pkg.internal".to_string(), "pkg.internal.*".to_string()],
                reason: Some("package private".to_string()),
            });
        Registry::from_manifest(&manifest).unwrap()
    }

    #[test]
    fn test_is_known() {
        let registry = sample();
        assert_eq!(registry.is_known(&name("pkg")), Some(UnitKind::Container));
        assert_eq!(registry.is_known(&name("pkg.mod")), Some(UnitKind::Leaf));
        assert_eq!(registry.is_known(&name("os.path")), None);
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.containers(), vec![&name("pkg"), &name("pkg.internal")]);
    }

    #[test]
    fn test_is_restricted() {
        let registry = sample();
        assert!(registry.is_restricted(&name("pkg.secret")));
        assert!(registry.is_restricted(&name("pkg.internal.db")));
        assert!(!registry.is_restricted(&name("pkg.mod")));
        assert!(!registry.is_restricted(&name("pkg.internal")));
    }

    #[test]
    fn test_check_access_denies_everyone_without_exemptions() {
        let registry = sample();
        let secret = name("pkg.secret");

        for origin in [None, Some(name("pkg")), Some(name("pkg.mod"))] {
            let decision = registry.check_access(&secret, origin.as_ref());
            assert_eq!(
                decision,
                RestrictionDecision::Denied {
                    name: secret.clone(),
                    rule: "pkg.secret".to_string(),
                }
            );
        }
    }

    #[test]
    fn test_check_access_honours_exemptions() {
        let registry = sample();
        let db = name("pkg.internal.db");

        assert!(registry
            .check_access(&db, Some(&name("pkg.internal")))
            .is_allowed());
        assert!(!registry.check_access(&db, Some(&name("pkg.mod"))).is_allowed());
        assert!(!registry.check_access(&db, None).is_allowed());
    }

    #[test]
    fn test_from_manifest_rejects_conflicts() {
        let manifest = RegistryManifest::new().with_container("pkg").with_leaf("pkg");
        let err = Registry::from_manifest(&manifest).unwrap_err();
        assert!(matches!(err, DotloadError::InvalidRegistry { .. }));
        assert!(err.to_string().contains("both container and leaf"));
    }
}
