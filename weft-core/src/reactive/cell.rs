//! Cell Implementation
//!
//! A Cell is the fundamental reactive primitive: one mutable `Value` and a
//! source node in the dependency graph.
//!
//! # How Cells Work
//!
//! 1. When a cell is read inside a tracking scope (a memo or effect body),
//!    the runtime records an edge from the cell to that computation.
//!
//! 2. When the cell's value changes, the runtime walks downstream: memos
//!    become stale, effects re-run.
//!
//! # Thread Safety
//!
//! The value sits behind an RwLock and clones share it, so a cell can be
//! captured by computations on any thread. The write lock is released
//! before notification, so an effect reading the cell back does not
//! deadlock against its own trigger.

use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use super::runtime::Runtime;
use crate::graph::NodeId;
use crate::store::Value;

struct CellInner {
    id: NodeId,
    value: RwLock<Value>,
}

impl Drop for CellInner {
    fn drop(&mut self) {
        Runtime::remove_source(self.id);
    }
}

/// A reactive container for a single `Value`.
///
/// # Example
///
/// ```rust,ignore
/// let count = Cell::new(Value::Int(0));
///
/// // Read the value (tracks a dependency inside a memo/effect)
/// let value = count.get();
///
/// // Update the value (notifies dependents)
/// count.set(Value::Int(5));
/// ```
#[derive(Clone)]
pub struct Cell {
    inner: Arc<CellInner>,
}

impl Cell {
    /// Create a new cell seeded with `value`.
    pub fn new(value: Value) -> Self {
        let id = NodeId::new();
        Runtime::register_source(id);
        Self {
            inner: Arc::new(CellInner {
                id,
                value: RwLock::new(value),
            }),
        }
    }

    /// The cell's node in the dependency graph.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a tracking scope, the running computation becomes
    /// a dependent of this cell.
    pub fn get(&self) -> Value {
        Runtime::track_read(self.inner.id);
        self.inner
            .value
            .read()
            .expect("cell value lock poisoned")
            .clone()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> Value {
        self.inner
            .value
            .read()
            .expect("cell value lock poisoned")
            .clone()
    }

    /// Set a new value and notify dependents.
    pub fn set(&self, value: Value) {
        {
            let mut guard = self.inner.value.write().expect("cell value lock poisoned");
            *guard = value;
        }
        Runtime::notify(self.inner.id);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let new_value = {
            let guard = self.inner.value.read().expect("cell value lock poisoned");
            f(&guard)
        };
        self.set(new_value);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id.raw())
            .field("value", &self.get_untracked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_get_and_set() {
        let cell = Cell::new(Value::Int(0));
        assert_eq!(cell.get(), Value::Int(0));

        cell.set(Value::Int(42));
        assert_eq!(cell.get(), Value::Int(42));
    }

    #[test]
    fn cell_update() {
        let cell = Cell::new(Value::Int(10));
        cell.update(|v| Value::Int(v.as_i64().unwrap() + 5));
        assert_eq!(cell.get(), Value::Int(15));
    }

    #[test]
    fn cell_clone_shares_state() {
        let cell1 = Cell::new(Value::Int(0));
        let cell2 = cell1.clone();

        cell1.set(Value::Int(42));
        assert_eq!(cell2.get(), Value::Int(42));

        cell2.set(Value::Int(100));
        assert_eq!(cell1.get(), Value::Int(100));
        assert_eq!(cell1.id(), cell2.id());
    }

    #[test]
    fn cell_ids_are_unique() {
        let c1 = Cell::new(Value::Null);
        let c2 = Cell::new(Value::Null);
        assert_ne!(c1.id(), c2.id());
    }

    #[test]
    fn cell_holds_reference_values_by_identity() {
        let shared = crate::store::Arr::from_vec(vec![Value::Int(1)]);
        let cell = Cell::new(Value::Array(shared.clone()));

        let read_back = cell.get().into_array().unwrap();
        assert!(read_back.ptr_eq(&shared));
    }
}
