//! Physical resource layout
//!
//! Deterministic mapping from dotted names to resource paths:
//!
//! ```text
//! container a.b.c  →  <root>/a/b/c/<index_resource>.<extension>
//! leaf      a.b.c  →  <root>/a/b/c.<extension>
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::name::{CodeUnitName, UnitKind};

/// Default file extension for unit resources
pub const DEFAULT_EXTENSION: &str = "unit";

/// Default stem of a container's index resource
pub const DEFAULT_INDEX_RESOURCE: &str = "__index__";

/// Layout configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Directory all unit paths are relative to
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Extension of unit resources, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// File stem of a container's index resource
    #[serde(default = "default_index_resource")]
    pub index_resource: String,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_index_resource() -> String {
    DEFAULT_INDEX_RESOURCE.to_string()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extension: default_extension(),
            index_resource: default_index_resource(),
        }
    }
}

impl LayoutConfig {
    /// Layout rooted at `root` with default naming
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_index_resource(mut self, index_resource: impl Into<String>) -> Self {
        self.index_resource = index_resource.into();
        self
    }

    /// File name of a container's index resource (`__index__.unit`)
    pub fn index_file_name(&self) -> String {
        format!("{}.{}", self.index_resource, self.extension)
    }

    /// Directory a name maps to (`<root>/a/b/c` for `a.b.c`)
    pub fn unit_dir(&self, name: &CodeUnitName) -> PathBuf {
        let mut path = self.root.clone();
        for segment in name.segments() {
            path.push(segment);
        }
        path
    }

    /// Resource path for a unit of the given kind
    pub fn locate(&self, name: &CodeUnitName, kind: UnitKind) -> PathBuf {
        match kind {
            UnitKind::Container => self.unit_dir(name).join(self.index_file_name()),
            UnitKind::Leaf => {
                let mut path = self.root.clone();
                if let Some(parent) = name.parent() {
                    for segment in parent.segments() {
                        path.push(segment);
                    }
                }
                path.push(format!("{}.{}", name.last_segment(), self.extension));
                path
            }
        }
    }

    /// Search path handed to children of a container
    pub fn search_path(&self, name: &CodeUnitName) -> Vec<PathBuf> {
        vec![self.unit_dir(name)]
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> CodeUnitName {
        CodeUnitName::parse(s).unwrap()
    }

    #[test]
    fn test_locate_container_and_leaf() {
        let layout = LayoutConfig::new("/units");

        assert_eq!(
            layout.locate(&name("a.b.c"), UnitKind::Container),
            PathBuf::from("/units/a/b/c/__index__.unit")
        );
        assert_eq!(
            layout.locate(&name("a.b.c"), UnitKind::Leaf),
            PathBuf::from("/units/a/b/c.unit")
        );
        assert_eq!(
            layout.locate(&name("top"), UnitKind::Leaf),
            PathBuf::from("/units/top.unit")
        );
    }

    #[test]
    fn test_custom_naming() {
        let layout = LayoutConfig::new("/src")
            .with_extension("py")
            .with_index_resource("__init__");

        assert_eq!(
            layout.locate(&name("pkg"), UnitKind::Container),
            PathBuf::from("/src/pkg/__init__.py")
        );
        assert_eq!(layout.search_path(&name("pkg.sub")), vec![PathBuf::from("/src/pkg/sub")]);
    }

    #[test]
    fn test_layout_deserializes_with_defaults() {
        let layout: LayoutConfig = serde_json::from_str(r#"{ "root": "/opt/units" }"#).unwrap();
        assert_eq!(layout.root, PathBuf::from("/opt/units"));
        assert_eq!(layout.extension, "unit");
        assert_eq!(layout.index_file_name(), "__index__.unit");
    }
}
