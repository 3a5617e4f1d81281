//! Dotted unit names and unit kinds
//!
//! A [`CodeUnitName`] is an opaque dotted identifier such as `pkg.sub.mod`.
//! Equality is exact string equality. Names are validated once on parse so
//! every other component can rely on non-empty, well-formed segments.
//!
//! Segments are restricted to ASCII letters, digits and `_`. A segment
//! becomes a path component under the layout root and a binding in unit
//! scripts, so `-`, whitespace, path separators and non-ASCII text are
//! rejected with [`DotloadError::InvalidName`] rather than passed through.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DotloadError, Result};

/// Kind of a resolvable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// May hold nested units
    Container,
    /// Cannot hold nested units
    Leaf,
}

impl UnitKind {
    pub fn is_container(&self) -> bool {
        matches!(self, UnitKind::Container)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Container => write!(f, "container"),
            UnitKind::Leaf => write!(f, "leaf"),
        }
    }
}

/// A validated dotted unit name.
///
/// Cloning is cheap; the string is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeUnitName(Arc<str>);

impl CodeUnitName {
    /// Parse and validate a dotted name.
    ///
    /// Segments must be non-empty and made of ASCII alphanumerics or `_`.
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(invalid(name, "name is empty"));
        }

        for segment in name.split('.') {
            if segment.is_empty() {
                return Err(invalid(name, "empty segment"));
            }
            if let Some(c) = segment
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
            {
                return Err(invalid(name, &format!("unexpected character '{}'", c)));
            }
        }

        Ok(Self(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dotted segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The last segment (`mod` for `pkg.sub.mod`)
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// The enclosing name (`pkg.sub` for `pkg.sub.mod`), `None` at top level
    pub fn parent(&self) -> Option<CodeUnitName> {
        self.0
            .rfind('.')
            .map(|idx| CodeUnitName(Arc::from(&self.0[..idx])))
    }

    /// All strict prefixes, outermost first (`pkg`, `pkg.sub` for `pkg.sub.mod`)
    pub fn ancestors(&self) -> Vec<CodeUnitName> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(name) = current {
            current = name.parent();
            out.push(name);
        }
        out.reverse();
        out
    }

    /// Append a segment
    pub fn child(&self, segment: &str) -> Result<CodeUnitName> {
        CodeUnitName::parse(&format!("{}.{}", self.0, segment))
    }

    /// True if `self` is a strict dotted prefix of `other`
    pub fn is_ancestor_of(&self, other: &CodeUnitName) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&*self.0)
            && other.0.as_bytes()[self.0.len()] == b'.'
    }
}

fn invalid(name: &str, reason: &str) -> DotloadError {
    DotloadError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for CodeUnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CodeUnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeUnitName({})", self.0)
    }
}

impl AsRef<str> for CodeUnitName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for CodeUnitName {
    type Err = DotloadError;

    fn from_str(s: &str) -> Result<Self> {
        CodeUnitName::parse(s)
    }
}

impl Serialize for CodeUnitName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CodeUnitName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CodeUnitName::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> CodeUnitName {
        CodeUnitName::parse(s).unwrap()
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        assert!(CodeUnitName::parse("").is_err());
        assert!(CodeUnitName::parse(".pkg").is_err());
        assert!(CodeUnitName::parse("pkg..mod").is_err());
        assert!(CodeUnitName::parse("pkg.").is_err());
        assert!(CodeUnitName::parse("pkg/mod").is_err());
        assert!(CodeUnitName::parse("pkg.sub_2.mod").is_ok());
    }

    #[test]
    fn test_parse_rejects_non_ascii_and_dashes() {
        for raw in ["my-pkg", "pkg.modülé", "pkg.a b", "пакет"] {
            let err = CodeUnitName::parse(raw).unwrap_err();
            assert!(matches!(err, DotloadError::InvalidName { .. }), "{raw}");
        }
    }

    #[test]
    fn test_parent_and_ancestors() {
        let n = name("a.b.c");
        assert_eq!(n.parent(), Some(name("a.b")));
        assert_eq!(n.ancestors(), vec![name("a"), name("a.b")]);
        assert_eq!(n.last_segment(), "c");
        assert_eq!(n.depth(), 3);
        assert!(name("a").parent().is_none());
        assert!(name("a").ancestors().is_empty());
    }

    #[test]
    fn test_is_ancestor_of() {
        assert!(name("a").is_ancestor_of(&name("a.b")));
        assert!(name("a").is_ancestor_of(&name("a.b.c")));
        assert!(!name("a").is_ancestor_of(&name("ab.c")));
        assert!(!name("a.b").is_ancestor_of(&name("a.b")));
    }

    #[test]
    fn test_serde_validates() {
        let parsed: CodeUnitName = serde_json::from_str("\"pkg.mod\"").unwrap();
        assert_eq!(parsed.as_str(), "pkg.mod");
        assert!(serde_json::from_str::<CodeUnitName>("\"pkg..mod\"").is_err());
    }
}
