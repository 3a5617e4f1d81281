//! Resolution context
//!
//! - [`ContextTracker`]: who is the direct originator of the current request
//! - [`ResolutionOverride`]: the per-unit entry point that tags nested
//!   requests with the unit's identity

mod injector;
mod tracker;

pub use injector::ResolutionOverride;
pub use tracker::{ContextGuard, ContextTracker};
