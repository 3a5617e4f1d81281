//! Concurrent resolution: per-thread context, single-flight loads and
//! cycles that span threads.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use dotload_core::{
    BuiltinResolver, CodeUnitName, DotloadError, ImportSystem, InMemorySource, LayoutConfig,
    LoadedUnit, Loader, LoaderHandle, Namespace, Registry, RegistryLoader, RegistryManifest,
    RegistryResolver, Resolution, ResolveRequest, ResourceSource, Resolver, Result, UnitKind,
};

fn name(s: &str) -> CodeUnitName {
    CodeUnitName::parse(s).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory source that takes a while to answer and counts per path
struct SlowSource {
    inner: InMemorySource,
    delay: Duration,
    fetches: Mutex<HashMap<PathBuf, usize>>,
}

impl SlowSource {
    fn new(inner: InMemorySource, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            fetches: Mutex::new(HashMap::new()),
        }
    }

    fn fetches_of(&self, path: &str) -> usize {
        self.fetches
            .lock()
            .get(Path::new(path))
            .copied()
            .unwrap_or(0)
    }
}

impl ResourceSource for SlowSource {
    fn fetch(&self, path: &Path) -> io::Result<Option<String>> {
        *self.fetches.lock().entry(path.to_path_buf()).or_default() += 1;
        thread::sleep(self.delay);
        self.inner.fetch(path)
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Passes on every name, remembering which thread asked with which context
#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<(ThreadId, Option<String>)>>>,
}

impl Resolver for Recorder {
    fn id(&self) -> &str {
        "recorder"
    }

    fn resolve(&self, request: &ResolveRequest<'_>) -> Resolution {
        self.seen.lock().push((
            thread::current().id(),
            request.context.map(|c| c.to_string()),
        ));
        Resolution::NotMine
    }
}

/// Loads a leaf whose body imports `next`, after a one-time rendezvous
struct Rendezvous {
    next: &'static str,
    barrier: Arc<Barrier>,
    armed: AtomicBool,
}

impl Loader for Rendezvous {
    fn load(&self, handle: &LoaderHandle, system: &ImportSystem) -> Result<LoadedUnit> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.barrier.wait();
        }

        let resolution = system.make_override(handle.name().clone());
        let mut namespace = Namespace::new(handle.name().clone());
        let next = resolution.import(self.next)?;
        namespace.set(self.next, dotload_core::Value::Unit(next));

        Ok(LoadedUnit::new(namespace, UnitKind::Leaf, resolution))
    }

    fn name(&self) -> &'static str {
        "rendezvous"
    }
}

struct RendezvousResolver {
    loaders: HashMap<&'static str, Arc<Rendezvous>>,
}

impl Resolver for RendezvousResolver {
    fn id(&self) -> &str {
        "rendezvous"
    }

    fn resolve(&self, request: &ResolveRequest<'_>) -> Resolution {
        match self.loaders.get(request.name.as_str()) {
            Some(loader) => Resolution::Found(LoaderHandle::new(
                request.name.clone(),
                UnitKind::Leaf,
                self.id(),
                loader.clone(),
            )),
            None => Resolution::NotMine,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn concurrent_imports_execute_the_body_once() {
    let resources = InMemorySource::new()
        .with_resource("/units/pkg/__index__.unit", "let kind = \"container\"")
        .with_resource("/units/pkg/mod.unit", "let value = 1");
    let source = Arc::new(SlowSource::new(resources, Duration::from_millis(20)));

    let manifest = RegistryManifest::new().with_container("pkg").with_leaf("pkg.mod");
    let registry = Arc::new(Registry::from_manifest(&manifest).unwrap());
    let loader = RegistryLoader::with_source(registry, LayoutConfig::new("/units"), source.clone());

    let system = ImportSystem::new();
    system.register_resolver(RegistryResolver::new(loader)).unwrap();

    let threads = 8;
    let barrier = Barrier::new(threads);
    let units: Vec<Arc<LoadedUnit>> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    system.import("pkg.mod").unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(units.iter().all(|u| Arc::ptr_eq(u, &units[0])));
    assert_eq!(source.fetches_of("/units/pkg/__index__.unit"), 1);
    assert_eq!(source.fetches_of("/units/pkg/mod.unit"), 1);

    let stats = system.cache_stats();
    assert_eq!(stats.loads, 2);
    assert_eq!(stats.in_flight, 0);
}

#[test]
fn threads_keep_their_own_originators() {
    let recorder = Recorder::default();
    let system = ImportSystem::new();
    system.register_resolver(recorder.clone()).unwrap();
    system
        .append_resolver(
            BuiltinResolver::new("builtins")
                .with_attribute(name("shared.config"), "mode", "test")
                .with_unit(name("shared.util")),
        )
        .unwrap();

    let owners = ["alpha", "beta", "gamma", "delta"];
    let barrier = Barrier::new(owners.len());

    let thread_ids: Vec<(ThreadId, &str)> = thread::scope(|s| {
        let handles: Vec<_> = owners
            .iter()
            .map(|owner| {
                let system = system.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    let resolution = system.make_override(name(owner));
                    barrier.wait();

                    for i in 0..50 {
                        let probe = format!("missing{}", i % 7);
                        assert!(matches!(
                            resolution.import(&probe),
                            Err(DotloadError::Unresolved { .. })
                        ));
                        let shared = if i % 2 == 0 { "shared.config" } else { "shared.util" };
                        resolution.import(shared).unwrap();
                        assert!(system.current_context().is_none());
                    }
                    (thread::current().id(), *owner)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let expected: HashMap<ThreadId, &str> = thread_ids.into_iter().collect();
    let seen = recorder.seen.lock();
    assert!(seen.len() >= owners.len() * 50);
    for (thread_id, context) in seen.iter() {
        assert_eq!(context.as_deref(), Some(expected[thread_id]));
    }
    assert!(system.current_context().is_none());
}

#[test]
fn cycle_across_threads_fails_instead_of_deadlocking() {
    let barrier = Arc::new(Barrier::new(2));
    let mut loaders = HashMap::new();
    loaders.insert(
        "left",
        Arc::new(Rendezvous {
            next: "right",
            barrier: barrier.clone(),
            armed: AtomicBool::new(true),
        }),
    );
    loaders.insert(
        "right",
        Arc::new(Rendezvous {
            next: "left",
            barrier,
            armed: AtomicBool::new(true),
        }),
    );

    let system = ImportSystem::new();
    system
        .register_resolver(RendezvousResolver { loaders })
        .unwrap();

    let results: Vec<Result<Arc<LoadedUnit>>> = thread::scope(|s| {
        let left = s.spawn(|| system.import("left"));
        let right = s.spawn(|| system.import("right"));
        vec![left.join().unwrap(), right.join().unwrap()]
    });

    for result in results {
        assert!(matches!(
            result,
            Err(DotloadError::CyclicResolution { .. })
        ));
    }
    assert!(system.loaded_names().is_empty());
    assert_eq!(system.cache_stats().in_flight, 0);
}
