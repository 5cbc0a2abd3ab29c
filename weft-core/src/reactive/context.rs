//! Tracking Scope
//!
//! The tracking scope records which computation is currently running, so a
//! cell read can be attributed to it. When a cell's `get` runs inside a
//! scope, the runtime adds an edge from the cell's node to the scope's
//! node; that edge is what later turns a `set` into a notification.
//!
//! A thread-local stack supports nesting (a memo read from inside an
//! effect runs in its own frame), and the RAII guard keeps the stack
//! balanced even if the computation panics.

use std::cell::RefCell;

use crate::graph::NodeId;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<NodeId>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one frame of the tracking stack. Dropping it pops the frame.
pub struct TrackingScope {
    id: NodeId,
}

impl TrackingScope {
    /// Enter a tracking frame for the computation that owns `id`.
    ///
    /// While the frame is on top of the stack, cell and memo reads on this
    /// thread register `id` as their dependent.
    pub fn enter(id: NodeId) -> Self {
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(id));
        Self { id }
    }

    /// Whether any computation is being tracked on this thread.
    pub fn active() -> bool {
        SCOPE_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost tracked computation, if any.
    pub fn current() -> Option<NodeId> {
        SCOPE_STACK.with(|stack| stack.borrow().last().copied())
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            // Catches mismatched enter/drop ordering.
            debug_assert_eq!(
                popped,
                Some(self.id),
                "tracking scope mismatch: expected {:?}, got {:?}",
                self.id,
                popped
            );
        });
    }
}
