//! Registry discovery
//!
//! Builds a [`RegistryManifest`] by scanning a layout root: directories with
//! an index resource become containers, other unit resources become leaves.
//! Restrictions are never discovered; add them to the returned manifest.

use std::path::Path;

use crate::error::{DotloadError, Result};
use crate::loader::LayoutConfig;
use crate::name::CodeUnitName;

use super::manifest::RegistryManifest;

/// Scan `layout.root` for unit resources
pub fn discover_manifest(layout: &LayoutConfig) -> Result<RegistryManifest> {
    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(&layout.root.to_string_lossy()),
        layout.extension
    );

    let entries = glob::glob(&pattern).map_err(|e| DotloadError::ConfigLoadError {
        path: layout.root.display().to_string(),
        reason: e.to_string(),
    })?;

    let index_file = layout.index_file_name();
    let mut manifest = RegistryManifest::new();

    for entry in entries {
        let path = entry.map_err(|e| DotloadError::IoError {
            message: e.to_string(),
        })?;
        if !path.is_file() {
            continue;
        }

        let relative = match path.strip_prefix(&layout.root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };

        let is_index = relative
            .file_name()
            .map(|f| f.to_string_lossy() == index_file.as_str())
            .unwrap_or(false);

        let dotted = if is_index {
            match relative.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dotted_name(dir),
                // an index resource at the root itself names nothing
                _ => continue,
            }
        } else {
            dotted_name(&relative.with_extension(""))
        };

        match CodeUnitName::parse(&dotted) {
            Ok(name) if is_index => manifest.containers.push(name.to_string()),
            Ok(name) => manifest.leaves.push(name.to_string()),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unit resource"),
        }
    }

    manifest.containers.sort();
    manifest.containers.dedup();
    manifest.leaves.sort();
    manifest.leaves.dedup();

    // `a/__index__.unit` next to `a.unit`: the container wins
    let containers = manifest.containers.clone();
    manifest.leaves.retain(|leaf| {
        let shadowed = containers.binary_search(leaf).is_ok();
        if shadowed {
            tracing::warn!(unit = %leaf, "leaf resource shadowed by container");
        }
        !shadowed
    });

    // a resource below a directory with no index resource has no parent
    // container to be imported through; sorted order visits parents first
    let mut reachable: Vec<String> = Vec::with_capacity(manifest.containers.len());
    for container in &manifest.containers {
        if parent_is_reachable(container, &reachable) {
            reachable.push(container.clone());
        } else {
            tracing::warn!(unit = %container, "container has no enclosing index resource");
        }
    }
    manifest.containers = reachable;

    let containers = &manifest.containers;
    manifest.leaves.retain(|leaf| {
        let reachable = parent_is_reachable(leaf, containers);
        if !reachable {
            tracing::warn!(unit = %leaf, "leaf has no enclosing index resource");
        }
        reachable
    });

    Ok(manifest)
}

fn parent_is_reachable(name: &str, containers: &[String]) -> bool {
    match name.rsplit_once('.') {
        Some((parent, _)) => containers
            .binary_search_by(|c| c.as_str().cmp(parent))
            .is_ok(),
        None => true,
    }
}

fn dotted_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(".")
}
