//! Context Tracker
//!
//! Records which unit is the direct originator of the resolution request
//! currently in progress. The context is a logical stack per thread of
//! control: [`ContextTracker::enter`] pushes a name and returns a guard that
//! pops it again when dropped, on success, error or unwind alike.
//!
//! Stacks live in thread-local storage keyed by tracker id, so two import
//! systems in one process never see each other's context, and concurrent
//! chains on different threads never do either.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::name::CodeUnitName;

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static STACKS: RefCell<HashMap<u64, Vec<CodeUnitName>>> = RefCell::new(HashMap::new());
}

/// Per-thread resolution context store
#[derive(Debug)]
pub struct ContextTracker {
    id: u64,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self {
            id: NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The current originator, `None` at the top of a chain
    pub fn current(&self) -> Option<CodeUnitName> {
        STACKS
            .try_with(|stacks| {
                stacks
                    .borrow()
                    .get(&self.id)
                    .and_then(|stack| stack.last().cloned())
            })
            .ok()
            .flatten()
    }

    /// Number of nested contexts active on this thread
    pub fn depth(&self) -> usize {
        STACKS
            .try_with(|stacks| stacks.borrow().get(&self.id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// The whole stack on this thread, outermost first
    pub fn snapshot(&self) -> Vec<CodeUnitName> {
        STACKS
            .try_with(|stacks| stacks.borrow().get(&self.id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Make `name` the current context until the guard is dropped
    pub fn enter(&self, name: CodeUnitName) -> ContextGuard<'_> {
        let restore_to = STACKS.with(|stacks| {
            let mut stacks = stacks.borrow_mut();
            let stack = stacks.entry(self.id).or_default();
            let depth = stack.len();
            stack.push(name);
            depth
        });

        ContextGuard {
            tracker: self,
            restore_to,
            _not_send: PhantomData,
        }
    }

    /// Run `body` with `name` as the current context
    pub fn with_context<T, F>(&self, name: CodeUnitName, body: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _guard = self.enter(name);
        body()
    }

    fn restore(&self, depth: usize) {
        // try_with: the guard may be dropped during thread teardown
        let _ = STACKS.try_with(|stacks| {
            let mut stacks = stacks.borrow_mut();
            if let Some(stack) = stacks.get_mut(&self.id) {
                stack.truncate(depth);
                if stack.is_empty() {
                    stacks.remove(&self.id);
                }
            }
        });
    }
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ContextTracker {
    fn drop(&mut self) {
        let _ = STACKS.try_with(|stacks| stacks.borrow_mut().remove(&self.id));
    }
}

/// Scoped context entry; restores the previous context when dropped.
///
/// Not `Send`: a context belongs to the thread that entered it.
#[must_use = "the context is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard<'a> {
    tracker: &'a ContextTracker,
    restore_to: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.tracker.restore(self.restore_to);
    }
}
