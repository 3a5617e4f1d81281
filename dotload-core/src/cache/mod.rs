//! Caching layer
//!
//! The [`UnitCache`] holds every successfully loaded unit for the lifetime
//! of its import system and guarantees single-flight loading per name.
//! Failed loads are never cached.

mod unit_cache;

pub use unit_cache::{CacheLookup, CacheStats, UnitCache};
