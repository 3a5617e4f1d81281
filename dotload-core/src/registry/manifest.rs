//! Registry manifest
//!
//! The declarative form of a [`Registry`](super::Registry): which dotted
//! names are containers, which are leaves, and which are restricted.
//!
//! ```json
//! {
//!   "containers": ["pkg"],
//!   "leaves": ["pkg.mod", "pkg.secret"],
//!   "restricted": [
//!     "pkg.secret",
//!     { "pattern": "pkg.internal.*", "allow_from": ["pkg.*"], "reason": "package private" }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DotloadError, Result};
use crate::name::CodeUnitName;

use super::pattern::NamePattern;

/// A restriction declaration, either a bare pattern or a rule with exemptions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RestrictionEntry {
    /// Bare name or pattern, denied to everyone
    Pattern(String),
    /// Pattern with originator exemptions
    Rule {
        pattern: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allow_from: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl RestrictionEntry {
    pub fn pattern(&self) -> &str {
        match self {
            RestrictionEntry::Pattern(p) => p,
            RestrictionEntry::Rule { pattern, .. } => pattern,
        }
    }

    pub fn allow_from(&self) -> &[String] {
        match self {
            RestrictionEntry::Pattern(_) => &[],
            RestrictionEntry::Rule { allow_from, .. } => allow_from,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RestrictionEntry::Pattern(_) => None,
            RestrictionEntry::Rule { reason, .. } => reason.as_deref(),
        }
    }
}

/// Declarative registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryManifest {
    /// Names of units that may hold nested units
    #[serde(default)]
    pub containers: Vec<String>,

    /// Names of units that cannot hold nested units
    #[serde(default)]
    pub leaves: Vec<String>,

    /// Restricted names and patterns
    #[serde(default)]
    pub restricted: Vec<RestrictionEntry>,
}

impl RegistryManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(mut self, name: impl Into<String>) -> Self {
        self.containers.push(name.into());
        self
    }

    pub fn with_leaf(mut self, name: impl Into<String>) -> Self {
        self.leaves.push(name.into());
        self
    }

    pub fn with_restricted(mut self, pattern: impl Into<String>) -> Self {
        self.restricted.push(RestrictionEntry::Pattern(pattern.into()));
        self
    }

    pub fn with_rule(mut self, entry: RestrictionEntry) -> Self {
        self.restricted.push(entry);
        self
    }

    /// Parse a manifest from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DotloadError::InvalidRegistry {
            reason: e.to_string(),
        })
    }

    /// Load a manifest from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DotloadError::ConfigLoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| DotloadError::ConfigLoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Check the manifest for consistency, reporting every problem found
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = vec![];

        let containers = parse_all("container", &self.containers, &mut errors);
        let leaves = parse_all("leaf", &self.leaves, &mut errors);

        // A name has exactly one kind
        let mut both: Vec<&CodeUnitName> = containers.intersection(&leaves).collect();
        both.sort();
        for name in both {
            errors.push(format!("'{}' is declared both container and leaf", name));
        }

        // Leaves cannot hold nested units
        let mut known: Vec<&CodeUnitName> = containers.union(&leaves).collect();
        known.sort();
        for name in &known {
            for ancestor in name.ancestors() {
                if leaves.contains(&ancestor) && !containers.contains(&ancestor) {
                    errors.push(format!("leaf '{}' cannot contain '{}'", ancestor, name));
                }
            }
        }

        for entry in &self.restricted {
            match NamePattern::compile(entry.pattern()) {
                Ok(NamePattern::Exact(name)) => {
                    if !containers.contains(&name) && !leaves.contains(&name) {
                        errors.push(format!("restricted name '{}' is not a known unit", name));
                    }
                }
                Ok(_) => {}
                Err(e) => errors.push(format!("restricted pattern: {}", e)),
            }

            for origin in entry.allow_from() {
                if let Err(e) = NamePattern::compile(origin) {
                    errors.push(format!(
                        "allow_from of '{}': {}",
                        entry.pattern(),
                        e
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_all(kind: &str, names: &[String], errors: &mut Vec<String>) -> HashSet<CodeUnitName> {
    let mut out = HashSet::new();
    for raw in names {
        match CodeUnitName::parse(raw) {
            Ok(name) => {
                out.insert(name);
            }
            Err(e) => errors.push(format!("{} {}", kind, e)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_deserialization() {
        let manifest: RegistryManifest = serde_json::from_value(json!({
            "containers": ["pkg"],
            "leaves": ["pkg.mod", "pkg.secret"],
            "restricted": [
                "pkg.secret",
                { "pattern": "pkg.*", "allow_from": ["pkg"], "reason": "private" }
            ]
        }))
        .unwrap();

        assert_eq!(manifest.containers, vec!["pkg"]);
        assert_eq!(manifest.restricted.len(), 2);
        assert_eq!(manifest.restricted[0].pattern(), "pkg.secret");
        assert_eq!(manifest.restricted[1].allow_from(), ["pkg".to_string()]);
        assert_eq!(manifest.restricted[1].reason(), Some("private"));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let manifest = RegistryManifest::from_json(r#"{ "leaves": ["solo"] }"#).unwrap();
        assert!(manifest.containers.is_empty());
        assert!(manifest.restricted.is_empty());
    }

    #[test]
    fn test_validate_rejects_kind_conflict() {
        let manifest = RegistryManifest::new()
            .with_container("pkg")
            .with_leaf("pkg");

        let errors = manifest.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("both container and leaf")));
    }

    #[test]
    fn test_validate_rejects_nested_leaf() {
        let manifest = RegistryManifest::new().with_leaf("a").with_leaf("a.b");

        let errors = manifest.validate().unwrap_err();
        assert_eq!(errors, vec!["leaf 'a' cannot contain 'a.b'".to_string()]);
    }

    #[test]
    fn test_validate_rejects_unknown_exact_restriction() {
        let manifest = RegistryManifest::new()
            .with_container("pkg")
            .with_restricted("pkg.ghost")
            .with_restricted("pkg.*");

        let errors = manifest.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("pkg.ghost"));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let manifest = RegistryManifest::new()
            .with_container("bad..name")
            .with_leaf("x")
            .with_container("x")
            .with_restricted("nope/*");

        let errors = manifest.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
