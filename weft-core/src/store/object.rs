//! Records and Field Slots
//!
//! `Obj` is the shared-identity record type the materializer consumes and
//! produces. A plain record holds raw values and raw accessor pairs; a
//! materialized record (a store node) holds cell-backed and computed
//! slots installed by the materializer, plus hidden `$`-prefixed shadow
//! slots exposing the raw backing handles.
//!
//! Three per-record flags sit outside the field table, invisible to
//! enumeration:
//!
//! - the **store marker**, set once by the materializer (and inherited by
//!   records created with [`Obj::derive`]), which is what makes repeated
//!   materialization a no-op;
//! - the **seal**, fixing the field set of every store node;
//! - an optional **class name**, making a record nominal: nominal records
//!   are opaque to the materializer and pass through like scalars.
//!
//! Field lookup and assignment walk the prototype link, so a derived
//! record reads and writes through its ancestor's accessors.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;
use tracing::trace;

use super::engine::ReadyHooks;
use super::materialize;
use super::value::{CellHandle, Value};
use crate::error::StoreError;

/// An accessor body: receives the record the access went through.
pub type Getter = Arc<dyn Fn(&Obj) -> Value + Send + Sync>;
/// An accessor write body: receiver plus incoming value.
pub type Setter = Arc<dyn Fn(&Obj, Value) + Send + Sync>;
/// A setter already bound to its store node.
pub(crate) type BoundSetter = Arc<dyn Fn(Value) + Send + Sync>;

/// How a computed field obtains its value.
#[derive(Clone)]
pub(crate) enum Binding {
    /// Engine memo handle; reads go through the engine's `get`.
    Memo(CellHandle),
    /// No `memo` hook was available: the getter ran once at
    /// materialization and this is all that remains.
    Snapshot(Value),
}

/// One field of a record.
#[derive(Clone)]
pub(crate) enum Slot {
    /// Plain stored value (unmaterialized records only).
    Raw(Value),
    /// Plain accessor pair (unmaterialized records only).
    RawAccessor {
        get: Getter,
        set: Option<Setter>,
    },
    /// Cell-backed store field: reads and writes go through the engine.
    Data {
        cell: CellHandle,
        hooks: ReadyHooks,
    },
    /// Computed store field.
    Computed {
        binding: Binding,
        set: Option<BoundSetter>,
        hooks: ReadyHooks,
    },
    /// Hidden `$name` accessor returning the raw backing handle.
    Shadow(CellHandle),
}

impl Slot {
    pub(crate) fn enumerable(&self) -> bool {
        !matches!(self, Slot::Shadow(_))
    }

    /// Evaluate the slot for a read through `receiver`.
    pub(crate) fn read(&self, receiver: &Obj) -> Value {
        match self {
            Slot::Raw(value) => value.clone(),
            Slot::RawAccessor { get, .. } => get(receiver),
            Slot::Data { cell, hooks } => (hooks.get)(cell),
            Slot::Computed {
                binding: Binding::Memo(handle),
                hooks,
                ..
            } => (hooks.get)(handle),
            Slot::Computed {
                binding: Binding::Snapshot(value),
                ..
            } => value.clone(),
            Slot::Shadow(handle) => Value::Cell(handle.clone()),
        }
    }
}

struct ObjInner {
    proto: Option<Obj>,
    class: Option<String>,
    store: AtomicBool,
    sealed: AtomicBool,
    slots: RwLock<IndexMap<String, Slot>>,
}

/// A shared-identity record. Clones alias the same fields.
#[derive(Clone)]
pub struct Obj {
    inner: Arc<ObjInner>,
}

impl Obj {
    fn from_parts(proto: Option<Obj>, class: Option<String>, store: bool) -> Self {
        Self {
            inner: Arc::new(ObjInner {
                proto,
                class,
                store: AtomicBool::new(store),
                sealed: AtomicBool::new(false),
                slots: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// A new plain record, eligible for materialization.
    pub fn new() -> Self {
        Self::from_parts(None, None, false)
    }

    /// A new nominal record. The materializer passes these through
    /// untouched, the way it passes through scalars.
    pub fn with_class(class: impl Into<String>) -> Self {
        Self::from_parts(None, Some(class.into()), false)
    }

    /// A descendant of `self`: empty field table, prototype link back to
    /// `self`, class and store marker inherited.
    pub fn derive(&self) -> Obj {
        Self::from_parts(Some(self.clone()), self.class(), self.is_store())
    }

    /// Bare node for the materializer: same shape as [`Obj::new`] but with
    /// an explicit prototype.
    pub(crate) fn bare(proto: Option<Obj>) -> Self {
        Self::from_parts(proto, None, false)
    }

    pub fn proto(&self) -> Option<Obj> {
        self.inner.proto.clone()
    }

    pub fn class(&self) -> Option<String> {
        self.inner.class.clone()
    }

    /// Whether this record is a plain (non-nominal) record.
    pub fn is_record(&self) -> bool {
        self.inner.class.is_none()
    }

    /// Whether this record has been materialized (or derived from a
    /// materialized record).
    pub fn is_store(&self) -> bool {
        self.inner.store.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_store(&self) {
        self.inner.store.store(true, Ordering::SeqCst);
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.load(Ordering::SeqCst)
    }

    /// Fix the field set: no additions or removals from here on. Values of
    /// existing fields stay writable.
    pub fn seal(&self) {
        self.inner.sealed.store(true, Ordering::SeqCst);
    }

    /// Define (or replace) a plain data field. Dropped on sealed records.
    pub fn define(&self, key: impl Into<String>, value: Value) -> &Self {
        let key = key.into();
        if self.is_sealed() {
            trace!(field = %key, "define on sealed record dropped");
            return self;
        }
        self.define_slot(key, Slot::Raw(value));
        self
    }

    /// Define a read-only accessor field.
    pub fn define_getter<G>(&self, key: impl Into<String>, get: G) -> &Self
    where
        G: Fn(&Obj) -> Value + Send + Sync + 'static,
    {
        self.define_accessor_slots(key.into(), Arc::new(get), None)
    }

    /// Define an accessor field with both a getter and a setter.
    pub fn define_accessor<G, S>(&self, key: impl Into<String>, get: G, set: S) -> &Self
    where
        G: Fn(&Obj) -> Value + Send + Sync + 'static,
        S: Fn(&Obj, Value) + Send + Sync + 'static,
    {
        self.define_accessor_slots(key.into(), Arc::new(get), Some(Arc::new(set)))
    }

    fn define_accessor_slots(&self, key: String, get: Getter, set: Option<Setter>) -> &Self {
        if self.is_sealed() {
            trace!(field = %key, "define on sealed record dropped");
            return self;
        }
        self.define_slot(key, Slot::RawAccessor { get, set });
        self
    }

    pub(crate) fn define_slot(&self, key: String, slot: Slot) {
        self.inner
            .slots
            .write()
            .expect("record field lock poisoned")
            .insert(key, slot);
    }

    pub(crate) fn own_slot(&self, key: &str) -> Option<Slot> {
        self.inner
            .slots
            .read()
            .expect("record field lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.inner
            .slots
            .read()
            .expect("record field lock poisoned")
            .contains_key(key)
    }

    /// Snapshot of every own slot in declaration order, shadows included.
    pub(crate) fn own_descriptors(&self) -> Vec<(String, Slot)> {
        self.inner
            .slots
            .read()
            .expect("record field lock poisoned")
            .iter()
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect()
    }

    /// Own enumerable field names, in declaration order.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .slots
            .read()
            .expect("record field lock poisoned")
            .iter()
            .filter(|(_, slot)| slot.enumerable())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Read a field, searching the prototype chain. Accessors run with
    /// `self` as the receiver.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(slot) = self.own_slot(key) {
            return Some(slot.read(self));
        }
        let mut cursor = self.proto();
        while let Some(owner) = cursor {
            if let Some(slot) = owner.own_slot(key) {
                return Some(slot.read(self));
            }
            cursor = owner.proto();
        }
        None
    }

    /// Write a field, searching the prototype chain.
    ///
    /// Cell-backed fields resolve the incoming value (materializing nested
    /// records and arrays) and write it through the existing cell; the
    /// cell itself is never replaced. Writes to read-only computed fields,
    /// shadows, and unknown fields of sealed records are dropped. The only
    /// failure is a cyclic incoming value.
    pub fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        if let Some(slot) = self.own_slot(key) {
            return self.apply_set(key, slot, true, value);
        }
        let mut cursor = self.proto();
        while let Some(owner) = cursor {
            if let Some(slot) = owner.own_slot(key) {
                return self.apply_set(key, slot, false, value);
            }
            cursor = owner.proto();
        }
        if self.is_sealed() {
            trace!(field = key, "write to unknown field of sealed record dropped");
        } else {
            self.define_slot(key.to_string(), Slot::Raw(value));
        }
        Ok(())
    }

    fn apply_set(&self, key: &str, slot: Slot, own: bool, value: Value) -> Result<(), StoreError> {
        match slot {
            Slot::Data { cell, hooks } => materialize::write_through(&hooks, &cell, value),
            Slot::Computed { set: Some(set), .. } => {
                set(value);
                Ok(())
            }
            Slot::Computed { set: None, .. } => {
                trace!(field = key, "write to read-only computed field dropped");
                Ok(())
            }
            Slot::RawAccessor { set: Some(set), .. } => {
                set(self, value);
                Ok(())
            }
            Slot::RawAccessor { set: None, .. } => Ok(()),
            Slot::Raw(_) => {
                // Own plain fields are replaced in place; an inherited one
                // is shadowed by an own field, seal permitting.
                if own || !self.is_sealed() {
                    self.define_slot(key.to_string(), Slot::Raw(value));
                }
                Ok(())
            }
            Slot::Shadow(_) => Ok(()),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Arc::as_ptr(&self.inner) as *const ()
    }

    pub(crate) fn downgrade(&self) -> WeakObj {
        WeakObj {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for Obj {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.is_store() { "Store" } else { "Obj" };
        let mut dbg = f.debug_struct(name);
        if let Some(class) = self.class() {
            dbg.field("class", &class);
        }
        dbg.field("fields", &self.keys()).finish()
    }
}

/// Non-owning reference to a record, used by bound accessors so a store
/// node does not keep itself alive through its own field closures.
#[derive(Clone)]
pub(crate) struct WeakObj {
    inner: Weak<ObjInner>,
}

impl WeakObj {
    pub(crate) fn upgrade(&self) -> Option<Obj> {
        self.inner.upgrade().map(|inner| Obj { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get() {
        let obj = Obj::new();
        obj.define("x", Value::Int(1)).define("y", Value::Int(2));

        assert_eq!(obj.get("x"), Some(Value::Int(1)));
        assert_eq!(obj.get("y"), Some(Value::Int(2)));
        assert_eq!(obj.get("z"), None);
        assert_eq!(obj.keys(), vec!["x", "y"]);
    }

    #[test]
    fn set_replaces_and_adds_plain_fields() {
        let obj = Obj::new();
        obj.define("x", Value::Int(1));

        obj.set("x", Value::Int(5)).unwrap();
        assert_eq!(obj.get("x"), Some(Value::Int(5)));

        obj.set("fresh", Value::Int(9)).unwrap();
        assert_eq!(obj.get("fresh"), Some(Value::Int(9)));
    }

    #[test]
    fn accessors_receive_the_receiver() {
        let obj = Obj::new();
        obj.define("x", Value::Int(3));
        obj.define_getter("doubled", |this| {
            Value::Int(this.get("x").unwrap().as_i64().unwrap() * 2)
        });

        assert_eq!(obj.get("doubled"), Some(Value::Int(6)));

        obj.set("x", Value::Int(10)).unwrap();
        assert_eq!(obj.get("doubled"), Some(Value::Int(20)));
    }

    #[test]
    fn accessor_setter_fans_out() {
        let obj = Obj::new();
        obj.define("x", Value::Int(0));
        obj.define("y", Value::Int(0));
        obj.define_accessor(
            "xy",
            |this| {
                let x = this.get("x").unwrap().as_i64().unwrap();
                let y = this.get("y").unwrap().as_i64().unwrap();
                Value::Int(x + y)
            },
            |this, value| {
                let pair = value.as_array().cloned().unwrap_or_default();
                this.set("x", pair.get(0).unwrap_or(Value::Null)).unwrap();
                this.set("y", pair.get(1).unwrap_or(Value::Null)).unwrap();
            },
        );

        obj.set("xy", Value::from(vec![Value::Int(4), Value::Int(2)]))
            .unwrap();
        assert_eq!(obj.get("x"), Some(Value::Int(4)));
        assert_eq!(obj.get("y"), Some(Value::Int(2)));
        assert_eq!(obj.get("xy"), Some(Value::Int(6)));
    }

    #[test]
    fn sealed_records_keep_their_field_set() {
        let obj = Obj::new();
        obj.define("x", Value::Int(1));
        obj.seal();

        obj.define("y", Value::Int(2));
        assert_eq!(obj.get("y"), None);

        obj.set("z", Value::Int(3)).unwrap();
        assert_eq!(obj.get("z"), None);

        // Existing field values stay writable.
        obj.set("x", Value::Int(7)).unwrap();
        assert_eq!(obj.get("x"), Some(Value::Int(7)));
    }

    #[test]
    fn derived_records_read_through_the_chain() {
        let base = Obj::new();
        base.define("x", Value::Int(1));
        base.define_getter("tag", |this| {
            this.get("name").unwrap_or(Value::from("anonymous"))
        });

        let child = base.derive();
        child.define("name", Value::from("leaf"));

        assert_eq!(child.get("x"), Some(Value::Int(1)));
        // The inherited accessor sees the child as receiver.
        assert_eq!(child.get("tag"), Some(Value::from("leaf")));
        assert_eq!(base.get("tag"), Some(Value::from("anonymous")));
    }

    #[test]
    fn writing_an_inherited_plain_field_shadows_it() {
        let base = Obj::new();
        base.define("x", Value::Int(1));

        let child = base.derive();
        child.set("x", Value::Int(2)).unwrap();

        assert_eq!(child.get("x"), Some(Value::Int(2)));
        assert_eq!(base.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn derive_inherits_marker_and_class() {
        let base = Obj::new();
        base.mark_store();
        let child = base.derive();
        assert!(child.is_store());
        assert!(!child.is_sealed());

        let nominal = Obj::with_class("Complex");
        assert!(!nominal.is_record());
        assert_eq!(nominal.derive().class().as_deref(), Some("Complex"));
    }

    #[test]
    fn shadow_slots_are_hidden_from_enumeration() {
        let obj = Obj::new();
        obj.define("x", Value::Int(1));
        obj.define_slot("$x".to_string(), Slot::Shadow(CellHandle::new(7_u8)));

        assert_eq!(obj.keys(), vec!["x"]);
        // ...but remain readable, yielding the raw handle.
        let raw = obj.get("$x").unwrap();
        assert!(raw.as_cell().is_some());
        // and writes aimed at them are dropped.
        obj.set("$x", Value::Int(2)).unwrap();
        assert!(obj.get("$x").unwrap().as_cell().is_some());
    }

    #[test]
    fn identity_is_shared_by_clones() {
        let obj = Obj::new();
        let alias = obj.clone();
        alias.define("x", Value::Int(1));
        assert_eq!(obj.get("x"), Some(Value::Int(1)));
        assert!(obj.ptr_eq(&alias));
        assert!(!obj.ptr_eq(&Obj::new()));
    }
}
