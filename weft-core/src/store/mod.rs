//! Store Materialization
//!
//! This module implements the store side of the crate: a dynamic value
//! model, a shared-identity record type, the pluggable engine contract,
//! and the materializer that maps plain value graphs onto cell graphs.
//!
//! # Flow
//!
//! A caller hands a [`Value`] to [`Materializer::store`]. Records become
//! new, sealed store nodes whose fields read and write through engine
//! cells (or memos, for accessor fields); arrays are rebound in place;
//! scalars, functions, unrecognized handles, nominal records, and
//! existing stores pass through unchanged. Nesting is handled depth
//! first: every nested value is resolved before the engine sees it, so
//! the cell graph mirrors the plain graph's shape at the moment of
//! materialization.

mod engine;
mod materialize;
mod object;
mod value;

pub use engine::{
    BatchFn, ComputeFn, EffectFn, Engine, EngineHooks, GetFn, IsFn, MemoFn, ReadyHooks, SetFn,
    SignalFn, Subscription, TaskFn,
};
pub use materialize::{is_store, Materializer};
pub use object::{Getter, Obj, Setter};
pub use value::{Arr, CellHandle, Func, Value};
