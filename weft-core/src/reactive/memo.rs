//! Memo Implementation
//!
//! A Memo is a cached derived `Value` that re-evaluates only when something
//! it read has changed.
//!
//! # How Memos Work
//!
//! 1. On first access the memo runs its computation inside a tracking
//!    scope and caches the result.
//!
//! 2. While clean, further accesses return the cache.
//!
//! 3. When a dependency changes, the runtime marks the memo stale. Nothing
//!    recomputes yet; memos are lazy, so a memo nobody reads again costs
//!    nothing.
//!
//! 4. The next access clears the old edges, re-runs the computation, and
//!    re-tracks whatever it reads this time.

use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use super::context::TrackingScope;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use crate::graph::{NodeId, NodeKind};
use crate::store::Value;

/// Cache state of a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the last computation.
    Stale,
}

struct MemoInner {
    id: NodeId,
    compute: Box<dyn Fn() -> Value + Send + Sync>,
    value: RwLock<Option<Value>>,
    state: RwLock<MemoState>,
}

impl Reactive for MemoInner {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn mark_stale(&self) {
        *self.state.write().expect("memo state lock poisoned") = MemoState::Stale;
    }

    fn run(&self) {
        // Lazy: recomputation happens on the next `get`.
    }

    fn is_eager(&self) -> bool {
        false
    }
}

/// A cached derived value that recomputes only when its inputs change.
///
/// Clones share the cache, the graph node, and the registration.
#[derive(Clone)]
pub struct Memo {
    inner: Arc<MemoInner>,
    _registration: Arc<ReactiveHandle>,
}

impl Memo {
    /// Create a new memo. The computation does not run until first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let inner = Arc::new(MemoInner {
            id: NodeId::new(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: RwLock::new(MemoState::Stale),
        });
        let registration = Arc::new(Runtime::register(inner.clone(), NodeKind::Derived));
        Self {
            inner,
            _registration: registration,
        }
    }

    /// The memo's node in the dependency graph.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, recomputing if stale.
    ///
    /// Inside a tracking scope this also registers the memo as a
    /// dependency of the running computation, so changes propagate through
    /// it transitively.
    pub fn get(&self) -> Value {
        Runtime::track_read(self.inner.id);

        let state = *self.inner.state.read().expect("memo state lock poisoned");
        match state {
            MemoState::Clean => self
                .inner
                .value
                .read()
                .expect("memo value lock poisoned")
                .clone()
                .expect("clean memo should have a value"),
            MemoState::Stale => self.recompute(),
        }
    }

    /// Force the memo to recompute on next access.
    pub fn mark_stale(&self) {
        self.inner.mark_stale();
    }

    /// Current cache state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.read().expect("memo state lock poisoned")
    }

    /// Whether the memo has computed at least once.
    pub fn has_value(&self) -> bool {
        self.inner
            .value
            .read()
            .expect("memo value lock poisoned")
            .is_some()
    }

    fn recompute(&self) -> Value {
        // Edges from the previous run are stale; re-track from scratch.
        Runtime::clear_dependencies(self.inner.id);

        let new_value = {
            let _scope = TrackingScope::enter(self.inner.id);
            (self.inner.compute)()
        };

        *self.inner.value.write().expect("memo value lock poisoned") = Some(new_value.clone());
        *self.inner.state.write().expect("memo state lock poisoned") = MemoState::Clean;

        new_value
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id.raw())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .finish()
    }
}
