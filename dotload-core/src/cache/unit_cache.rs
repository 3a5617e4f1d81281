//! Loaded unit cache
//!
//! Sits in front of the resolution chain. At most one load per name runs at
//! a time: the first requester claims the slot and runs the load, other
//! threads block until it finishes and then share the result.
//!
//! A thread never waits on itself. Requesting a name it is already loading
//! (directly or through nested imports) fails with `CyclicResolution`, as
//! does a wait that would close a cycle of threads waiting on each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::error::{DotloadError, Result};
use crate::loader::LoadedUnit;
use crate::name::CodeUnitName;

#[derive(Debug)]
enum Slot {
    /// A load is in flight on `owner`
    Loading { owner: ThreadId },
    Ready(Arc<LoadedUnit>),
}

#[derive(Debug, Default)]
struct CacheState {
    slots: HashMap<CodeUnitName, Slot>,
    /// Which name each blocked thread is waiting for
    waiting: HashMap<ThreadId, CodeUnitName>,
}

impl CacheState {
    /// Would `me` waiting on a load owned by `owner` close a wait-for cycle?
    fn closes_cycle(&self, me: ThreadId, owner: ThreadId) -> bool {
        let mut current = owner;
        // every hop follows a distinct waiting thread
        for _ in 0..=self.waiting.len() {
            if current == me {
                return true;
            }
            match self
                .waiting
                .get(&current)
                .and_then(|name| self.slots.get(name))
            {
                Some(Slot::Loading { owner }) => current = *owner,
                _ => return false,
            }
        }
        false
    }
}

/// How a unit came out of [`UnitCache::get_or_load`]
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// Already loaded (possibly after waiting for another thread)
    Cached(Arc<LoadedUnit>),
    /// Loaded by this call
    Loaded(Arc<LoadedUnit>),
}

impl CacheLookup {
    pub fn unit(&self) -> &Arc<LoadedUnit> {
        match self {
            CacheLookup::Cached(unit) | CacheLookup::Loaded(unit) => unit,
        }
    }

    pub fn into_unit(self) -> Arc<LoadedUnit> {
        match self {
            CacheLookup::Cached(unit) | CacheLookup::Loaded(unit) => unit,
        }
    }

    pub fn was_cached(&self) -> bool {
        matches!(self, CacheLookup::Cached(_))
    }
}

/// Single-flight cache of loaded units
#[derive(Debug, Default)]
pub struct UnitCache {
    state: Mutex<CacheState>,
    ready: Condvar,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
    waits: AtomicU64,
}

impl UnitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fully loaded unit, without waiting for in-flight loads
    pub fn get(&self, name: &CodeUnitName) -> Option<Arc<LoadedUnit>> {
        match self.state.lock().slots.get(name) {
            Some(Slot::Ready(unit)) => Some(Arc::clone(unit)),
            _ => None,
        }
    }

    /// Whether the current thread is in the middle of loading `name`
    pub fn is_loading_here(&self, name: &CodeUnitName) -> bool {
        let me = thread::current().id();
        matches!(
            self.state.lock().slots.get(name),
            Some(Slot::Loading { owner }) if *owner == me
        )
    }

    /// Return the cached unit for `name`, or run `load` to produce it.
    ///
    /// Errors from `load` are not cached; the slot is released so a later
    /// request starts over.
    pub fn get_or_load<F>(&self, name: &CodeUnitName, load: F) -> Result<CacheLookup>
    where
        F: FnOnce() -> Result<Arc<LoadedUnit>>,
    {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let mut waited = false;

        loop {
            let owner = match state.slots.get(name) {
                Some(Slot::Ready(unit)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(CacheLookup::Cached(Arc::clone(unit)));
                }
                Some(Slot::Loading { owner }) => *owner,
                None => break,
            };

            if owner == me || state.closes_cycle(me, owner) {
                return Err(DotloadError::CyclicResolution {
                    name: name.to_string(),
                });
            }

            if !waited {
                self.waits.fetch_add(1, Ordering::Relaxed);
                waited = true;
            }
            tracing::debug!(unit = %name, "waiting for in-flight load");

            state.waiting.insert(me, name.clone());
            self.ready.wait(&mut state);
            state.waiting.remove(&me);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        state
            .slots
            .insert(name.clone(), Slot::Loading { owner: me });
        drop(state);

        let claim = LoadClaim {
            cache: self,
            name,
            settled: false,
        };

        match load() {
            Ok(unit) => {
                claim.fulfil(Arc::clone(&unit));
                self.loads.fetch_add(1, Ordering::Relaxed);
                Ok(CacheLookup::Loaded(unit))
            }
            Err(e) => {
                // claim drops here and releases the slot
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Drop a loaded unit so the next request loads it again.
    ///
    /// In-flight loads are left alone. Returns whether a unit was removed.
    pub fn invalidate(&self, name: &CodeUnitName) -> bool {
        let mut state = self.state.lock();
        if matches!(state.slots.get(name), Some(Slot::Ready(_))) {
            state.slots.remove(name);
            true
        } else {
            false
        }
    }

    /// Drop every loaded unit
    pub fn clear(&self) {
        self.state
            .lock()
            .slots
            .retain(|_, slot| matches!(slot, Slot::Loading { .. }));
    }

    /// Names of fully loaded units, sorted
    pub fn loaded_names(&self) -> Vec<CodeUnitName> {
        let state = self.state.lock();
        let mut names: Vec<CodeUnitName> = state
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.loaded_names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let (mut entries, mut in_flight) = (0, 0);
        for slot in state.slots.values() {
            match slot {
                Slot::Ready(_) => entries += 1,
                Slot::Loading { .. } => in_flight += 1,
            }
        }

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        CacheStats {
            entries,
            in_flight,
            hits,
            misses,
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
            loads: self.loads.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
        }
    }
}

/// Ownership of a `Loading` slot; releases it on drop unless fulfilled
struct LoadClaim<'a> {
    cache: &'a UnitCache,
    name: &'a CodeUnitName,
    settled: bool,
}

impl LoadClaim<'_> {
    fn fulfil(mut self, unit: Arc<LoadedUnit>) {
        self.cache
            .state
            .lock()
            .slots
            .insert(self.name.clone(), Slot::Ready(unit));
        self.settled = true;
        self.cache.ready.notify_all();
    }
}

impl Drop for LoadClaim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.cache.state.lock().slots.remove(self.name);
            self.cache.ready.notify_all();
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Fully loaded units
    pub entries: usize,
    /// Loads currently running
    pub in_flight: usize,
    /// Requests served from the cache
    pub hits: u64,
    /// Requests that started a load
    pub misses: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
    /// Successful loads
    pub loads: u64,
    /// Failed loads
    pub failures: u64,
    /// Requests that blocked on another thread's load
    pub waits: u64,
}
