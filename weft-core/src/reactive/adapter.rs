//! Engine Adapter
//!
//! Wires the bundled primitives into the store's engine contract. The
//! store side only ever sees opaque handles and the seven hooks; this is
//! the one place that knows those handles wrap [`Cell`]s and [`Memo`]s.

use std::sync::Arc;

use super::cell::Cell;
use super::effect::Effect;
use super::memo::Memo;
use super::runtime::Runtime;
use crate::store::{CellHandle, ComputeFn, Engine, Subscription, TaskFn, Value};

/// A fully-configured [`Engine`] backed by this crate's reactive runtime.
///
/// `get` understands both cell and memo handles. `set` writes cells and
/// drops writes aimed at memos or foreign handles. `is` recognizes cell
/// handles only, so a memo handle stored as a field value is treated as
/// opaque data rather than reused as a backing cell.
pub fn engine() -> Engine {
    let engine = Engine::new();
    engine.configure(|hooks| {
        hooks.signal = Some(Arc::new(|initial: Value| CellHandle::new(Cell::new(initial))));

        hooks.get = Some(Arc::new(|handle: &CellHandle| {
            if let Some(cell) = handle.downcast_ref::<Cell>() {
                cell.get()
            } else if let Some(memo) = handle.downcast_ref::<Memo>() {
                memo.get()
            } else {
                Value::Null
            }
        }));

        hooks.set = Some(Arc::new(|handle: &CellHandle, value: Value| {
            if let Some(cell) = handle.downcast_ref::<Cell>() {
                cell.set(value);
            }
        }));

        hooks.is = Some(Arc::new(|value: &Value| {
            matches!(value, Value::Cell(handle) if handle.downcast_ref::<Cell>().is_some())
        }));

        hooks.memo = Some(Arc::new(|compute: ComputeFn| {
            CellHandle::new(Memo::new(move || compute()))
        }));

        hooks.batch = Some(Arc::new(|f: &mut dyn FnMut()| Runtime::batch(|| f())));

        hooks.effect = Some(Arc::new(|task: TaskFn| {
            Subscription::new(Effect::new(move || task()))
        }));
    });
    engine
}
