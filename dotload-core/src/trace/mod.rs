//! Resolution audit trail
//!
//! Every resolution attempt is reported twice: as a `tracing` record for
//! whatever subscriber the host installs, and as a [`ResolutionEvent`] in
//! the system's [`EventLog`]. Neither is consulted by the pipeline itself.
//!
//! ```text
//! import("pkg.mod")
//!   ├─ cache_hit                       (cached: chain skipped)
//!   └─ not_mine → ... → claimed → loaded | denied | failed
//! ```

mod collector;
mod event;

pub use collector::{EventLog, EventLogConfig, DEFAULT_EVENT_CAPACITY};
pub use event::{Outcome, ResolutionEvent};
