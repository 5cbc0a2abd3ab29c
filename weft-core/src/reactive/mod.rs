//! Reactive Primitives
//!
//! This module implements the bundled reactive engine: cells, memos, and
//! effects over dynamic [`Value`](crate::store::Value)s, coordinated by a
//! global runtime and the dependency graph.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A Cell is a container for one mutable value. When a cell is read
//! within a tracking scope (a memo or effect body), the reader becomes a
//! dependent. When the cell's value changes, dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result and re-evaluates only
//! when one of its dependencies has changed: lazily, on the next read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever its
//! dependencies change. Inside a [`Runtime::batch`] the re-runs coalesce:
//! however many dependencies changed, the effect runs once when the batch
//! closes.
//!
//! # Implementation Notes
//!
//! Dependencies are detected automatically through a thread-local tracking
//! scope, the approach used by fine-grained-reactivity systems generally.
//! The store's materializer does not use this module directly; it goes
//! through the hook contract, and [`engine()`] is the adapter that wires
//! these primitives into it.

mod adapter;
mod cell;
mod context;
mod effect;
mod memo;
mod runtime;

pub use adapter::engine;
pub use cell::Cell;
pub use context::TrackingScope;
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
