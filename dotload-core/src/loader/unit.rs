//! Loaded units and their namespaces

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ResolutionOverride;
use crate::name::{CodeUnitName, UnitKind};

/// Attribute name every namespace binds to its owner's dotted name
pub const NAME_ATTRIBUTE: &str = "__name__";

/// A namespace binding
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    /// Another loaded unit
    Unit(Arc<LoadedUnit>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_unit(&self) -> Option<&Arc<LoadedUnit>> {
        match self {
            Value::Unit(unit) => Some(unit),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // units compare by identity, not by content
            (Value::Unit(a), Value::Unit(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Unit(unit) => write!(f, "<unit {}>", unit.identity()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A configurable binding (strings, integers and booleans only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(i) => Value::Int(i),
            Scalar::Str(s) => Value::Str(s),
        }
    }
}

/// A unit's private attribute table
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    owner: CodeUnitName,
    attrs: BTreeMap<String, Value>,
}

impl Namespace {
    /// Empty namespace seeded with `__name__`
    pub fn new(owner: CodeUnitName) -> Self {
        let mut attrs = BTreeMap::new();
        attrs.insert(NAME_ATTRIBUTE.to_string(), Value::Str(owner.to_string()));
        Self { owner, attrs }
    }

    pub fn owner(&self) -> &CodeUnitName {
        &self.owner
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// Bind `key`, returning the previous binding
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attrs.insert(key.into(), value.into())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// A materialised, executed unit.
///
/// All fields are set once at construction; a `LoadedUnit` is never
/// handed out before its top-level code has finished running.
#[derive(Debug)]
pub struct LoadedUnit {
    identity: CodeUnitName,
    kind: UnitKind,
    namespace: Namespace,
    resolution: ResolutionOverride,
    origin: Option<PathBuf>,
    search_path: Option<Vec<PathBuf>>,
    source_digest: Option<String>,
    loaded_at: DateTime<Utc>,
}

impl LoadedUnit {
    pub fn new(namespace: Namespace, kind: UnitKind, resolution: ResolutionOverride) -> Self {
        Self {
            identity: namespace.owner().clone(),
            kind,
            namespace,
            resolution,
            origin: None,
            search_path: None,
            source_digest: None,
            loaded_at: Utc::now(),
        }
    }

    /// Record the resource this unit was compiled from
    pub fn with_origin(mut self, origin: PathBuf, source_digest: String) -> Self {
        self.origin = Some(origin);
        self.source_digest = Some(source_digest);
        self
    }

    /// Search path handed to this unit's children (containers only)
    pub fn with_search_path(mut self, search_path: Vec<PathBuf>) -> Self {
        self.search_path = Some(search_path);
        self
    }

    pub fn identity(&self) -> &CodeUnitName {
        &self.identity
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Shorthand for `namespace().get(key)`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.namespace.get(key)
    }

    /// The override bound to this unit at materialisation
    pub fn resolution(&self) -> &ResolutionOverride {
        &self.resolution
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn search_path(&self) -> Option<&[PathBuf]> {
        self.search_path.as_deref()
    }

    /// SHA-256 hex digest of the compiled source, if any
    pub fn source_digest(&self) -> Option<&str> {
        self.source_digest.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> CodeUnitName {
        CodeUnitName::parse(s).unwrap()
    }

    #[test]
    fn test_namespace_seeded_with_name() {
        let ns = Namespace::new(name("pkg.mod"));
        assert_eq!(ns.get(NAME_ATTRIBUTE), Some(&Value::from("pkg.mod")));
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_namespace_set_replaces() {
        let mut ns = Namespace::new(name("pkg"));
        assert!(ns.set("x", 1i64).is_none());
        assert_eq!(ns.set("x", "two"), Some(Value::Int(1)));
        assert_eq!(ns.get("x").and_then(Value::as_str), Some("two"));
        assert_eq!(ns.keys().collect::<Vec<_>>(), vec!["__name__", "x"]);
    }

    #[test]
    fn test_scalar_deserialization() {
        let scalars: Vec<Scalar> = serde_json::from_str(r#"["a", 3, true]"#).unwrap();
        let values: Vec<Value> = scalars.into_iter().map(Value::from).collect();
        assert_eq!(
            values,
            vec![Value::from("a"), Value::from(3i64), Value::from(true)]
        );
    }
}
