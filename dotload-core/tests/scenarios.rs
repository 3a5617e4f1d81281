//! End-to-end resolution scenarios
//!
//! Each test builds a registry-backed import system over in-memory
//! resources and walks one request through the whole pipeline.

use std::sync::Arc;

use dotload_core::{
    BuiltinResolver, CodeUnitName, DotloadError, ImportSystem, InMemorySource, LayoutConfig,
    Outcome, Registry, RegistryLoader, RegistryManifest, RegistryResolver, Resolution,
    ResolveRequest, Resolver, Value,
};

fn name(s: &str) -> CodeUnitName {
    CodeUnitName::parse(s).unwrap()
}

fn registry_system(
    manifest: RegistryManifest,
    resources: &[(&str, &str)],
) -> (ImportSystem, Arc<InMemorySource>) {
    let source = Arc::new(InMemorySource::new());
    for (path, content) in resources {
        source.insert(format!("/units/{}", path), *content);
    }

    let registry = Arc::new(Registry::from_manifest(&manifest).unwrap());
    let loader = RegistryLoader::with_source(registry, LayoutConfig::new("/units"), source.clone());

    let system = ImportSystem::new();
    system.register_resolver(RegistryResolver::new(loader)).unwrap();
    (system, source)
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenario A: container then leaf, nested requests tagged with the leaf
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn scenario_a_loads_container_then_leaf() {
    let (system, _) = registry_system(
        RegistryManifest::new().with_container("pkg").with_leaf("pkg.mod"),
        &[
            ("pkg/__index__.unit", "let kind = \"container\""),
            ("pkg/mod.unit", "import helpers.text as text\nlet ready = true"),
        ],
    );
    system
        .append_resolver(BuiltinResolver::new("builtins").with_unit(name("helpers.text")))
        .unwrap();

    let module = system.import("pkg.mod").unwrap();
    assert_eq!(module.get("ready"), Some(&Value::Bool(true)));

    // pkg finished loading before pkg.mod was even claimed
    let events = system.events().events();
    let pkg_loaded = events
        .iter()
        .find(|e| e.requested_name == "pkg" && e.outcome == Outcome::Loaded)
        .unwrap();
    let mod_claimed = events
        .iter()
        .find(|e| e.requested_name == "pkg.mod" && e.outcome == Outcome::Claimed)
        .unwrap();
    assert!(pkg_loaded.sequence < mod_claimed.sequence);

    // both top-level loads had no originator
    assert_eq!(pkg_loaded.current_context, None);
    assert_eq!(mod_claimed.current_context, None);

    // pkg.mod's own nested resolutions ran with pkg.mod as context
    let nested: Vec<_> = events
        .iter()
        .filter(|e| e.requested_name.starts_with("helpers"))
        .collect();
    assert!(!nested.is_empty());
    assert!(nested
        .iter()
        .all(|e| e.current_context.as_deref() == Some("pkg.mod")));
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenario B: restricted leaf is discoverable but never loaded
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn scenario_b_restricted_leaf_is_denied_at_load() {
    let manifest = RegistryManifest::new()
        .with_container("pkg")
        .with_leaf("pkg.secret")
        .with_restricted("pkg.secret");
    let (system, source) = registry_system(
        manifest.clone(),
        &[
            ("pkg/__index__.unit", ""),
            // would fail to compile if it were ever parsed
            ("pkg/secret.unit", "this is not a unit body"),
        ],
    );

    // Discovery succeeds
    let registry = Arc::new(Registry::from_manifest(&manifest).unwrap());
    let resolver = RegistryResolver::new(RegistryLoader::new(registry, LayoutConfig::new("/units")));
    let secret = name("pkg.secret");
    let resolution = resolver.resolve(&ResolveRequest {
        name: &secret,
        search_hint: None,
        context: None,
    });
    assert!(matches!(resolution, Resolution::Found(_)));

    // Loading does not
    let err = system.import("pkg.secret").unwrap_err();
    match &err {
        DotloadError::AccessDenied {
            name,
            originator,
            rule,
        } => {
            assert_eq!(name, "pkg.secret");
            assert_eq!(originator, &None);
            assert_eq!(rule, "pkg.secret");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.error_code(), "ACCESS_DENIED");

    // only pkg's index was fetched; the secret was never read or compiled
    assert_eq!(source.fetch_count(), 1);

    let denied = system.events().last().unwrap();
    assert_eq!(denied.requested_name, "pkg.secret");
    assert!(matches!(denied.outcome, Outcome::Denied { originator: None, .. }));
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenario C: unknown name falls through to an external fallback resolver
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn scenario_c_unknown_name_falls_through_with_context() {
    let (system, _) = registry_system(
        RegistryManifest::new().with_container("pkg").with_leaf("pkg.mod"),
        &[
            ("pkg/__index__.unit", ""),
            ("pkg/mod.unit", "from os.path import sep"),
        ],
    );
    system
        .append_resolver(BuiltinResolver::new("fallback").with_attribute(name("os.path"), "sep", "/"))
        .unwrap();

    let module = system.import("pkg.mod").unwrap();
    assert_eq!(module.get("sep"), Some(&Value::from("/")));

    let attempts = system.events().events_for("os.path");
    let passed = attempts
        .iter()
        .find(|e| e.outcome == Outcome::NotMine)
        .unwrap();
    assert_eq!(passed.resolver.as_deref(), Some("registry"));
    assert_eq!(passed.current_context.as_deref(), Some("pkg.mod"));

    let claimed = attempts
        .iter()
        .find(|e| e.outcome == Outcome::Claimed)
        .unwrap();
    assert_eq!(claimed.resolver.as_deref(), Some("fallback"));
    assert_eq!(claimed.current_context.as_deref(), Some("pkg.mod"));
}

// ═══════════════════════════════════════════════════════════════════════════
// Resolver and loader properties
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn unknown_names_never_reach_the_loader() {
    let (system, source) = registry_system(
        RegistryManifest::new().with_container("pkg").with_leaf("pkg.mod"),
        &[("pkg/__index__.unit", ""), ("pkg/mod.unit", "")],
    );

    for unknown in ["os", "os.path", "pkgx", "pkg_mod"] {
        let err = system.import(unknown).unwrap_err();
        assert!(matches!(err, DotloadError::Unresolved { .. }), "{unknown}");
    }
    assert_eq!(source.fetch_count(), 0);
}

#[test]
fn every_restricted_name_is_denied() {
    let manifest = RegistryManifest::new()
        .with_container("pkg")
        .with_container("pkg.vault")
        .with_leaf("pkg.vault.keys")
        .with_leaf("pkg.vault.certs")
        .with_leaf("pkg.open")
        .with_restricted("pkg.vault.*");
    let (system, source) = registry_system(
        manifest.clone(),
        &[
            ("pkg/__index__.unit", ""),
            ("pkg/vault/__index__.unit", ""),
            ("pkg/open.unit", ""),
            ("pkg/vault/keys.unit", "raise \"executed\""),
            ("pkg/vault/certs.unit", "raise \"executed\""),
        ],
    );
    let registry = Registry::from_manifest(&manifest).unwrap();

    let restricted: Vec<CodeUnitName> = registry
        .leaves()
        .into_iter()
        .chain(registry.containers())
        .filter(|n| registry.is_restricted(n))
        .cloned()
        .collect();
    assert_eq!(restricted.len(), 2);

    for name in &restricted {
        let err = system.import(name.as_str()).unwrap_err();
        assert!(err.is_policy_denial(), "{name}: {err}");
    }

    // pkg and pkg.vault indexes only
    assert_eq!(source.fetch_count(), 2);
    assert!(system.import("pkg.open").is_ok());
}

#[test]
fn missing_resource_and_bad_content_abort_the_load() {
    let (system, _) = registry_system(
        RegistryManifest::new()
            .with_container("pkg")
            .with_leaf("pkg.gone")
            .with_leaf("pkg.broken")
            .with_leaf("pkg.angry"),
        &[
            ("pkg/__index__.unit", ""),
            ("pkg/broken.unit", "let ok = 1\nlet = nope"),
            ("pkg/angry.unit", "let partial = true\nraise \"refusing to load\""),
        ],
    );

    assert!(matches!(
        system.import("pkg.gone"),
        Err(DotloadError::ResourceNotFound { .. })
    ));
    assert!(matches!(
        system.import("pkg.broken"),
        Err(DotloadError::CompileFailure { line: 2, .. })
    ));
    assert!(matches!(
        system.import("pkg.angry"),
        Err(DotloadError::ExecutionFailure { .. })
    ));

    // no partially initialised unit is ever cached
    assert_eq!(system.loaded_names(), vec![name("pkg")]);
    assert_eq!(system.cache_stats().failures, 3);
}

#[test]
fn repeated_import_executes_once() {
    let (system, source) = registry_system(
        RegistryManifest::new().with_leaf("counter"),
        &[("counter.unit", "let n = 1")],
    );

    let first = system.import("counter").unwrap();
    for _ in 0..5 {
        let again = system.import("counter").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }
    assert_eq!(source.fetch_count(), 1);

    // explicit invalidation re-executes
    assert!(system.invalidate("counter"));
    let reloaded = system.import("counter").unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert_eq!(source.fetch_count(), 2);
}
