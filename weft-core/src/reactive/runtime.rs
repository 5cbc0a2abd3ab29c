//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects cells, memos, and
//! effects. It owns the dependency graph, attributes reads to the running
//! computation, and turns writes into notifications.
//!
//! # How It Works
//!
//! 1. Every primitive registers a graph node when created (cells as
//!    sources, memos as derived nodes, effects as leaves).
//!
//! 2. When a cell or memo is read inside a tracking scope, the runtime
//!    records an edge from the value to the reader.
//!
//! 3. When a cell's value changes, the runtime collects the downstream
//!    nodes in topological order, marks lazy nodes stale (memos recompute
//!    on next access), and runs eager nodes (effects): immediately, or
//!    once at the end of the enclosing batch.
//!
//! # Thread Safety
//!
//! The registry is a concurrent map of weak references, so the runtime
//! never keeps a computation alive. The graph sits behind a mutex that is
//! held only while edges are inspected or updated, never across user
//! code. Batch state is thread-local: writes on one thread do not coalesce
//! into a batch opened on another.

use std::cell::RefCell;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::context::TrackingScope;
use crate::graph::{DependencyGraph, Node, NodeId, NodeKind};

/// A computation the runtime can wake: a memo (lazy) or an effect (eager).
pub trait Reactive: Send + Sync {
    /// The graph node this computation owns.
    fn node_id(&self) -> NodeId;

    /// A dependency changed; cached state is no longer trustworthy.
    fn mark_stale(&self);

    /// Execute the computation (effects only; memos re-run on access).
    fn run(&self);

    /// Eager computations run on notification; lazy ones wait to be read.
    fn is_eager(&self) -> bool;
}

/// Handle to a registered computation.
///
/// Dropping the handle unregisters the computation and removes its node
/// from the graph.
pub struct ReactiveHandle {
    id: NodeId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

static REGISTRY: OnceLock<DashMap<NodeId, Weak<dyn Reactive>>> = OnceLock::new();
static GRAPH: OnceLock<Mutex<DependencyGraph>> = OnceLock::new();

thread_local! {
    static BATCH: RefCell<BatchState> = const {
        RefCell::new(BatchState { depth: 0, queued: Vec::new() })
    };
}

struct BatchState {
    depth: usize,
    /// Effects woken while the batch was open, deduplicated, in first-wake
    /// order.
    queued: Vec<NodeId>,
}

fn registry() -> &'static DashMap<NodeId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn graph() -> &'static Mutex<DependencyGraph> {
    GRAPH.get_or_init(|| Mutex::new(DependencyGraph::new()))
}

impl Runtime {
    /// Register a computation with the runtime.
    ///
    /// Returns a handle that unregisters it when dropped.
    pub fn register(reactive: Arc<dyn Reactive>, kind: NodeKind) -> ReactiveHandle {
        let id = reactive.node_id();
        graph().lock().add_node(Node::new(id, kind));
        registry().insert(id, Arc::downgrade(&reactive));
        ReactiveHandle { id }
    }

    /// Register a plain source (a cell). Sources have no computation to
    /// wake, so they live only in the graph.
    pub fn register_source(id: NodeId) {
        graph().lock().add_node(Node::new(id, NodeKind::Source));
    }

    /// Remove a source's node and edges. Called when the last clone of a
    /// cell is dropped.
    pub fn remove_source(id: NodeId) {
        graph().lock().remove_node(id);
    }

    fn unregister(id: NodeId) {
        registry().remove(&id);
        graph().lock().remove_node(id);
    }

    /// Attribute a read of `source` to the computation currently being
    /// tracked on this thread, if there is one.
    pub fn track_read(source: NodeId) {
        if !TrackingScope::active() {
            return;
        }
        if let Some(subscriber) = TrackingScope::current() {
            graph().lock().add_edge(source, subscriber);
        }
    }

    /// Drop all recorded dependencies of `subscriber`, ahead of a re-run.
    pub fn clear_dependencies(subscriber: NodeId) {
        graph().lock().clear_dependencies(subscriber);
    }

    /// Propagate a change of `source`.
    ///
    /// Downstream nodes are visited in topological order: memos are marked
    /// stale, effects are run (or queued until the current batch closes).
    /// The graph lock is released before any effect executes.
    pub fn notify(source: NodeId) {
        let affected = graph().lock().affected(source);
        if affected.is_empty() {
            return;
        }
        trace!(source = source.raw(), affected = affected.len(), "change propagation");

        let mut eager: SmallVec<[Arc<dyn Reactive>; 4]> = SmallVec::new();
        for id in affected {
            if let Some(reactive) = Self::lookup(id) {
                reactive.mark_stale();
                if reactive.is_eager() {
                    eager.push(reactive);
                }
            }
        }
        if eager.is_empty() {
            return;
        }

        let deferred = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            if batch.depth == 0 {
                return false;
            }
            for reactive in &eager {
                let id = reactive.node_id();
                if !batch.queued.contains(&id) {
                    batch.queued.push(id);
                }
            }
            true
        });

        if !deferred {
            for reactive in eager {
                reactive.run();
            }
        }
    }

    /// Run `f` with effect execution deferred.
    ///
    /// Writes inside the closure still update values and mark memos stale
    /// immediately; effects woken by those writes run exactly once, after
    /// the outermost batch on this thread closes.
    pub fn batch<F: FnOnce()>(f: F) {
        BATCH.with(|batch| batch.borrow_mut().depth += 1);
        f();
        let drained = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            batch.depth -= 1;
            if batch.depth == 0 {
                std::mem::take(&mut batch.queued)
            } else {
                Vec::new()
            }
        });
        for id in drained {
            if let Some(reactive) = Self::lookup(id) {
                reactive.run();
            }
        }
    }

    /// Whether a batch is open on this thread.
    pub fn is_batching() -> bool {
        BATCH.with(|batch| batch.borrow().depth > 0)
    }

    fn lookup(id: NodeId) -> Option<Arc<dyn Reactive>> {
        registry().get(&id).and_then(|entry| entry.value().upgrade())
    }
}
