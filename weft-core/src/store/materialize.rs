//! Store Materialization
//!
//! The materializer maps a plain value graph onto a cell graph, depth
//! first. For every field of every nested record it decides between four
//! outcomes: already reactive (reuse the cell), computed (bind the getter
//! through the engine's memo hook), plain nested record or array (recurse
//! first, then back with a fresh cell), or leaf (seed a fresh cell as-is).
//!
//! # Shape of a materialized record
//!
//! The input record is left untouched; a new record is produced with the
//! same prototype (or an explicitly supplied one), a cell-backed or
//! computed slot per field in declaration order, a hidden `$name` shadow
//! per backed field exposing the raw handle, the store marker, and a
//! sealed field set. Arrays are the exception: they are materialized in
//! place, element by element, keeping their identity so caller-held
//! references observe the mutation.
//!
//! # Idempotency and degradation
//!
//! Materializing a store node returns it unchanged unless an alternate
//! prototype is supplied (that path re-tags a derived record as its own
//! store). Until the engine's four required hooks are registered the
//! entry points are identity functions.

use std::sync::Arc;

use tracing::{debug, trace};

use super::engine::{ComputeFn, Engine, ReadyHooks};
use super::object::{Binding, BoundSetter, Getter, Obj, Setter, Slot};
use super::value::{Arr, CellHandle, Value};
use crate::error::StoreError;

/// Whether `value` is a materialized record (or derived from one).
pub fn is_store(value: &Value) -> bool {
    matches!(value, Value::Object(obj) if obj.is_store())
}

/// Entry point for turning plain values into reactive stores, bound to an
/// [`Engine`]. Cloning is cheap; clones share the engine registry.
#[derive(Clone)]
pub struct Materializer {
    engine: Engine,
}

impl Materializer {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Materialize `value`.
    ///
    /// Records become sealed store nodes, arrays are bound in place,
    /// everything else (scalars, functions, engine cells, nominal records,
    /// existing stores) comes back unchanged. With an unconfigured engine
    /// this is the identity function.
    ///
    /// Fails only if the value graph is cyclic.
    pub fn store(&self, value: Value) -> Result<Value, StoreError> {
        self.enter(value, None)
    }

    /// Materialize `value` into a store node with an explicit prototype.
    ///
    /// This bypasses the already-a-store check, which is how a record
    /// derived from an existing store is re-tagged as its own store
    /// without re-materializing its ancestor's fields.
    pub fn store_with_proto(&self, value: Value, proto: Obj) -> Result<Value, StoreError> {
        self.enter(value, Some(proto))
    }

    /// Resolve a single value the way field writes do: recurse into
    /// records and arrays, pass everything else through.
    pub fn resolve(&self, value: Value) -> Result<Value, StoreError> {
        match self.engine.ready() {
            Some(hooks) => resolve_with(&hooks, value, &mut Vec::new()),
            None => Ok(value),
        }
    }

    fn enter(&self, value: Value, proto: Option<Obj>) -> Result<Value, StoreError> {
        if proto.is_none() && is_store(&value) {
            return Ok(value);
        }
        let Some(hooks) = self.engine.ready() else {
            debug!(
                missing = ?self.engine.missing_hooks(),
                "engine incomplete; value passed through"
            );
            return Ok(value);
        };
        store_with(&hooks, value, proto, &mut Vec::new())
    }
}

/// Write `value` through an existing backing cell, resolving it first so
/// nested records and arrays are materialized before the engine sees them.
/// The cell itself is never replaced.
pub(crate) fn write_through(
    hooks: &ReadyHooks,
    cell: &CellHandle,
    value: Value,
) -> Result<(), StoreError> {
    let resolved = resolve_with(hooks, value, &mut Vec::new())?;
    (hooks.set)(cell, resolved);
    Ok(())
}

fn store_with(
    hooks: &ReadyHooks,
    value: Value,
    proto: Option<Obj>,
    stack: &mut Vec<*const ()>,
) -> Result<Value, StoreError> {
    match value {
        Value::Array(array) => {
            bind_array(hooks, &array, stack)?;
            Ok(Value::Array(array))
        }
        Value::Object(obj) => {
            if obj.is_store() && proto.is_none() {
                return Ok(Value::Object(obj));
            }
            if !obj.is_record() {
                trace!(class = ?obj.class(), "nominal record passed through");
                return Ok(Value::Object(obj));
            }
            let node = materialize_record(hooks, &obj, proto, stack)?;
            Ok(Value::Object(node))
        }
        other => Ok(other),
    }
}

/// The single recursion point: every nested value goes through here before
/// it is handed to the engine.
fn resolve_with(
    hooks: &ReadyHooks,
    value: Value,
    stack: &mut Vec<*const ()>,
) -> Result<Value, StoreError> {
    store_with(hooks, value, None, stack)
}

/// Materialize array elements in place. The array's identity never
/// changes; elements already tagged as stores are left untouched.
fn bind_array(hooks: &ReadyHooks, array: &Arr, stack: &mut Vec<*const ()>) -> Result<(), StoreError> {
    let marker = array.as_ptr();
    if stack.contains(&marker) {
        return Err(StoreError::CyclicValue);
    }
    stack.push(marker);
    let result: Result<(), StoreError> = (|| {
        for index in 0..array.len() {
            let Some(element) = array.get(index) else {
                break;
            };
            if is_store(&element) {
                continue;
            }
            let resolved = resolve_with(hooks, element, stack)?;
            array.set(index, resolved);
        }
        Ok(())
    })();
    stack.pop();
    result
}

fn materialize_record(
    hooks: &ReadyHooks,
    source: &Obj,
    proto: Option<Obj>,
    stack: &mut Vec<*const ()>,
) -> Result<Obj, StoreError> {
    let marker = source.as_ptr();
    if stack.contains(&marker) {
        return Err(StoreError::CyclicValue);
    }
    stack.push(marker);
    let result = build_node(hooks, source, proto, stack);
    stack.pop();
    result
}

fn build_node(
    hooks: &ReadyHooks,
    source: &Obj,
    proto: Option<Obj>,
    stack: &mut Vec<*const ()>,
) -> Result<Obj, StoreError> {
    let state = Obj::bare(proto.or_else(|| source.proto()));

    for (key, descriptor) in source.own_descriptors() {
        match descriptor {
            // Shadows belong to the node that minted them; fresh ones are
            // installed below for the new node's own fields.
            Slot::Shadow(_) => continue,
            Slot::RawAccessor { get, set } => {
                define_computed(hooks, &state, &key, get, set);
            }
            Slot::Computed {
                binding,
                set,
                hooks: source_hooks,
            } => {
                // Re-tagging a store node: read back through its existing
                // binding rather than re-deriving the computation.
                let reader: Getter = Arc::new(move |_receiver: &Obj| match &binding {
                    Binding::Memo(handle) => (source_hooks.get)(handle),
                    Binding::Snapshot(value) => value.clone(),
                });
                let setter: Option<Setter> = set.map(|bound| {
                    Arc::new(move |_receiver: &Obj, value: Value| bound(value)) as Setter
                });
                define_computed(hooks, &state, &key, reader, setter);
            }
            Slot::Raw(value) => define_data(hooks, &state, &key, value, stack)?,
            Slot::Data { cell, .. } => {
                define_data(hooks, &state, &key, Value::Cell(cell), stack)?;
            }
        }
    }

    state.mark_store();
    state.seal();
    trace!(fields = state.keys().len(), "record materialized");
    Ok(state)
}

/// Install a cell-backed field: reuse the value if the engine recognizes
/// it as one of its cells, otherwise seed a fresh cell with the resolved
/// value.
fn define_data(
    hooks: &ReadyHooks,
    state: &Obj,
    key: &str,
    value: Value,
    stack: &mut Vec<*const ()>,
) -> Result<(), StoreError> {
    let cell = match value {
        Value::Cell(handle) => {
            if (hooks.is)(&Value::Cell(handle.clone())) {
                trace!(field = key, "existing cell reused");
                handle
            } else {
                // A handle this engine does not recognize is opaque data.
                (hooks.signal)(Value::Cell(handle))
            }
        }
        other => (hooks.signal)(resolve_with(hooks, other, stack)?),
    };

    state.define_slot(
        key.to_string(),
        Slot::Data {
            cell: cell.clone(),
            hooks: hooks.clone(),
        },
    );
    define_shadow(state, key, cell);
    Ok(())
}

/// Install a computed field: the getter bound to the new node, wrapped in
/// the engine's memo hook when available, evaluated once otherwise.
fn define_computed(hooks: &ReadyHooks, state: &Obj, key: &str, get: Getter, set: Option<Setter>) {
    let bound_get: ComputeFn = {
        let receiver = state.downgrade();
        Box::new(move || match receiver.upgrade() {
            Some(node) => get(&node),
            None => Value::Null,
        })
    };

    let binding = match &hooks.memo {
        Some(memo) => Binding::Memo(memo(bound_get)),
        None => Binding::Snapshot(bound_get()),
    };

    let bound_set: Option<BoundSetter> = set.map(|set| {
        let receiver = state.downgrade();
        Arc::new(move |value: Value| {
            if let Some(node) = receiver.upgrade() {
                set(&node, value);
            }
        }) as BoundSetter
    });

    let shadow_handle = match &binding {
        Binding::Memo(handle) => Some(handle.clone()),
        Binding::Snapshot(_) => None,
    };

    state.define_slot(
        key.to_string(),
        Slot::Computed {
            binding,
            set: bound_set,
            hooks: hooks.clone(),
        },
    );
    if let Some(handle) = shadow_handle {
        define_shadow(state, key, handle);
    }
}

/// Install the hidden `$name` accessor for a backed field, unless the
/// field itself carries the marker prefix or the name is taken.
fn define_shadow(state: &Obj, key: &str, handle: CellHandle) {
    if key.starts_with('$') {
        return;
    }
    let shadow_key = format!("${key}");
    if state.has_own(&shadow_key) {
        return;
    }
    state.define_slot(shadow_key, Slot::Shadow(handle));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive;

    fn materializer() -> Materializer {
        Materializer::new(reactive::engine())
    }

    #[test]
    fn passes_values_through_while_unconfigured() {
        let mat = Materializer::new(Engine::new());

        let plain = Obj::new();
        plain.define("x", Value::Int(1));
        let out = mat.store(Value::Object(plain.clone())).unwrap();

        let back = out.as_object().unwrap();
        assert!(back.ptr_eq(&plain));
        assert!(!back.is_store());
        assert!(!back.is_sealed());
    }

    #[test]
    fn scalars_and_functions_are_identity() {
        let mat = materializer();
        assert_eq!(mat.store(Value::Int(7)).unwrap(), Value::Int(7));
        assert_eq!(mat.store(Value::Null).unwrap(), Value::Null);

        let func = crate::store::Func::new(|_| Value::Int(1));
        let out = mat.store(Value::Func(func.clone())).unwrap();
        assert!(out.as_func().unwrap().ptr_eq(&func));
    }

    #[test]
    fn materializes_a_record_into_a_sealed_store() {
        let mat = materializer();
        let plain = Obj::new();
        plain.define("x", Value::Int(1)).define("y", Value::from("two"));

        let store = mat.store(Value::Object(plain.clone())).unwrap().into_object().unwrap();

        assert!(store.is_store());
        assert!(store.is_sealed());
        assert!(!plain.ptr_eq(&store));
        assert!(!plain.is_store());
        assert_eq!(store.keys(), vec!["x", "y"]);
        assert_eq!(store.get("x"), Some(Value::Int(1)));
        assert_eq!(store.get("y"), Some(Value::from("two")));
    }

    #[test]
    fn materialization_is_idempotent() {
        let mat = materializer();
        let plain = Obj::new();
        plain.define("x", Value::Int(1));

        let once = mat.store(Value::Object(plain)).unwrap();
        let twice = mat.store(once.clone()).unwrap();

        assert!(once.as_object().unwrap().ptr_eq(twice.as_object().unwrap()));
    }

    #[test]
    fn engine_cells_are_reused_not_rewrapped() {
        let mat = materializer();
        let cell = mat.engine().signal(Value::Int(5)).unwrap();

        let plain = Obj::new();
        plain.define("n", Value::Cell(cell.clone()));
        let store = mat.store(Value::Object(plain)).unwrap().into_object().unwrap();

        assert_eq!(store.get("n"), Some(Value::Int(5)));
        let backing = store.get("$n").unwrap();
        assert!(backing.as_cell().unwrap().ptr_eq(&cell));
    }

    #[test]
    fn marker_prefixed_fields_get_no_shadow_of_their_own() {
        let mat = materializer();
        let plain = Obj::new();
        plain.define("$raw", Value::Int(1)).define("x", Value::Int(2));

        let store = mat.store(Value::Object(plain)).unwrap().into_object().unwrap();

        // `$raw` is a real, enumerable field; `$x` is a hidden shadow.
        assert_eq!(store.keys(), vec!["$raw", "x"]);
        assert!(!store.has_own("$$raw"));
        assert!(store.has_own("$x"));
        assert_eq!(store.get("$raw"), Some(Value::Int(1)));
    }

    #[test]
    fn a_real_field_wins_over_a_shadow_name() {
        let mat = materializer();
        let plain = Obj::new();
        plain.define("x", Value::Int(1)).define("$x", Value::Int(2));

        let store = mat.store(Value::Object(plain)).unwrap().into_object().unwrap();

        // The declared `$x` field is a store field, not the shadow of `x`.
        assert_eq!(store.keys(), vec!["x", "$x"]);
        assert_eq!(store.get("$x"), Some(Value::Int(2)));
    }

    #[test]
    fn nominal_records_pass_through() {
        let mat = materializer();
        let nominal = Obj::with_class("Complex");
        nominal.define("re", Value::Int(1));

        let plain = Obj::new();
        plain.define("z", Value::Object(nominal.clone()));
        let store = mat.store(Value::Object(plain)).unwrap().into_object().unwrap();

        let z = store.get("z").unwrap().into_object().unwrap();
        assert!(z.ptr_eq(&nominal));
        assert!(!z.is_store());
    }

    #[test]
    fn nested_records_and_arrays_materialize() {
        let mat = materializer();

        let inner = Obj::new();
        inner.define("r", Value::Int(2));

        let list = Arr::from_vec(vec![Value::Int(1), Value::Int(2)]);

        let plain = Obj::new();
        plain.define("z", Value::Object(inner));
        plain.define("w", Value::Array(list.clone()));

        let store = mat.store(Value::Object(plain)).unwrap().into_object().unwrap();

        let z = store.get("z").unwrap().into_object().unwrap();
        assert!(z.is_store());
        assert_eq!(z.get("r"), Some(Value::Int(2)));

        let w = store.get("w").unwrap().into_array().unwrap();
        assert!(w.ptr_eq(&list));
    }

    #[test]
    fn empty_array_binds_without_work() {
        let mat = materializer();
        let empty = Arr::new();
        let out = mat.store(Value::Array(empty.clone())).unwrap();
        assert!(out.as_array().unwrap().ptr_eq(&empty));
        assert!(out.as_array().unwrap().is_empty());
    }

    #[test]
    fn array_elements_that_are_stores_stay_untouched() {
        let mat = materializer();
        let element = Obj::new();
        element.define("x", Value::Int(1));
        let node = mat.store(Value::Object(element)).unwrap().into_object().unwrap();

        let list = Arr::from_vec(vec![Value::Object(node.clone())]);
        mat.store(Value::Array(list.clone())).unwrap();

        let back = list.get(0).unwrap().into_object().unwrap();
        assert!(back.ptr_eq(&node));
    }

    #[test]
    fn cyclic_records_are_rejected() {
        let mat = materializer();
        let plain = Obj::new();
        plain.define("myself", Value::Object(plain.clone()));

        assert_eq!(
            mat.store(Value::Object(plain)).unwrap_err(),
            StoreError::CyclicValue
        );
    }

    #[test]
    fn cyclic_arrays_are_rejected() {
        let mat = materializer();
        let list = Arr::new();
        list.push(Value::Array(list.clone()));

        assert_eq!(
            mat.store(Value::Array(list)).unwrap_err(),
            StoreError::CyclicValue
        );
    }

    #[test]
    fn acyclic_sharing_is_permitted() {
        let mat = materializer();
        let shared = Obj::new();
        shared.define("n", Value::Int(1));

        let plain = Obj::new();
        plain.define("a", Value::Object(shared.clone()));
        plain.define("b", Value::Object(shared));

        let store = mat.store(Value::Object(plain)).unwrap().into_object().unwrap();

        // Each occurrence materializes independently.
        let a = store.get("a").unwrap().into_object().unwrap();
        let b = store.get("b").unwrap().into_object().unwrap();
        assert!(a.is_store());
        assert!(b.is_store());
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn resolve_passes_leaves_and_materializes_records() {
        let mat = materializer();
        assert_eq!(mat.resolve(Value::Int(3)).unwrap(), Value::Int(3));

        let plain = Obj::new();
        plain.define("x", Value::Int(1));
        let resolved = mat.resolve(Value::Object(plain)).unwrap().into_object().unwrap();
        assert!(resolved.is_store());
        assert!(resolved.is_sealed());
    }
}
