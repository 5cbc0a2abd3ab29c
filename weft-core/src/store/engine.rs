//! Engine Contract
//!
//! The materializer does not implement reactivity. It delegates cell
//! creation, reads, writes, and cell recognition to whichever engine is
//! plugged in through the hook set below: the bundled `reactive` module,
//! or anything else that can mint opaque handles.
//!
//! # Registration and degradation
//!
//! Hooks are registered piecemeal via [`Engine::configure`], so the crate
//! can be linked and stores declared before an engine is chosen. Until
//! `signal`, `get`, `set`, and `is` are all present, materialization
//! degrades to a pass-through: values come back exactly as given, and
//! nothing is wrapped. `memo`, `batch`, and `effect` are optional
//! capabilities; without `memo`, accessor fields collapse to one eager
//! snapshot.
//!
//! Callers who prefer a loud failure over silent pass-through can gate on
//! [`Engine::require`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::value::{CellHandle, Value};
use crate::error::StoreError;

/// Creates a new cell seeded with the given value.
pub type SignalFn = Arc<dyn Fn(Value) -> CellHandle + Send + Sync>;
/// Reads a cell, registering a dependency inside a tracking context.
pub type GetFn = Arc<dyn Fn(&CellHandle) -> Value + Send + Sync>;
/// Writes a cell, scheduling dependent recomputation per engine policy.
pub type SetFn = Arc<dyn Fn(&CellHandle, Value) + Send + Sync>;
/// True iff the value is a cell produced by this engine.
pub type IsFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
/// A computation handed to the `memo` hook.
pub type ComputeFn = Box<dyn Fn() -> Value + Send + Sync>;
/// Creates a cached, dependency-tracked derived computation.
pub type MemoFn = Arc<dyn Fn(ComputeFn) -> CellHandle + Send + Sync>;
/// Groups multiple writes into one notification pass.
pub type BatchFn = Arc<dyn Fn(&mut dyn FnMut()) + Send + Sync>;
/// A body handed to the `effect` hook.
pub type TaskFn = Box<dyn Fn() + Send + Sync>;
/// Re-runs the task whenever its dependencies change.
pub type EffectFn = Arc<dyn Fn(TaskFn) -> Subscription + Send + Sync>;

/// The pluggable hook set. `signal`, `get`, `set`, and `is` are required
/// for materialization; the rest are optional capabilities.
#[derive(Default, Clone)]
pub struct EngineHooks {
    pub signal: Option<SignalFn>,
    pub get: Option<GetFn>,
    pub set: Option<SetFn>,
    pub is: Option<IsFn>,
    pub memo: Option<MemoFn>,
    pub batch: Option<BatchFn>,
    pub effect: Option<EffectFn>,
}

impl EngineHooks {
    /// Whether all four required hooks are present.
    pub fn is_complete(&self) -> bool {
        self.signal.is_some() && self.get.is_some() && self.set.is_some() && self.is.is_some()
    }

    /// Names of the required hooks still missing.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.signal.is_none() {
            missing.push("signal");
        }
        if self.get.is_none() {
            missing.push("get");
        }
        if self.set.is_none() {
            missing.push("set");
        }
        if self.is.is_none() {
            missing.push("is");
        }
        missing
    }
}

/// A snapshot of a fully-configured hook set.
///
/// Materialization captures one of these per pass (and per materialized
/// field), so a store keeps working against the hooks it was built with
/// even if the registry is reconfigured afterwards.
#[derive(Clone)]
pub struct ReadyHooks {
    pub signal: SignalFn,
    pub get: GetFn,
    pub set: SetFn,
    pub is: IsFn,
    pub memo: Option<MemoFn>,
    pub batch: Option<BatchFn>,
    pub effect: Option<EffectFn>,
}

impl std::fmt::Debug for ReadyHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyHooks")
            .field("memo", &self.memo.is_some())
            .field("batch", &self.batch.is_some())
            .field("effect", &self.effect.is_some())
            .finish_non_exhaustive()
    }
}

/// The hook registry handed to a [`Materializer`](super::Materializer).
///
/// Cloning is cheap and clones share the registry, so hooks registered
/// through any clone are visible to all of them.
#[derive(Clone, Default)]
pub struct Engine {
    hooks: Arc<RwLock<EngineHooks>>,
}

impl Engine {
    /// A registry with no hooks. Materialization through it passes values
    /// through until the required hooks arrive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace hooks.
    pub fn configure<F>(&self, f: F)
    where
        F: FnOnce(&mut EngineHooks),
    {
        f(&mut self.hooks.write());
    }

    /// Snapshot the hooks if the four required ones are present.
    pub fn ready(&self) -> Option<ReadyHooks> {
        let hooks = self.hooks.read();
        Some(ReadyHooks {
            signal: hooks.signal.clone()?,
            get: hooks.get.clone()?,
            set: hooks.set.clone()?,
            is: hooks.is.clone()?,
            memo: hooks.memo.clone(),
            batch: hooks.batch.clone(),
            effect: hooks.effect.clone(),
        })
    }

    /// Strict variant of [`ready`](Self::ready): names the first missing
    /// required hook instead of degrading.
    pub fn require(&self) -> Result<ReadyHooks, StoreError> {
        match self.ready() {
            Some(hooks) => Ok(hooks),
            None => {
                let missing = self
                    .missing_hooks()
                    .first()
                    .copied()
                    .unwrap_or("signal");
                Err(StoreError::MissingHook(missing))
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.hooks.read().is_complete()
    }

    pub fn missing_hooks(&self) -> Vec<&'static str> {
        self.hooks.read().missing()
    }

    // Convenience pass-throughs. All of them stay inert when the relevant
    // hook is absent.

    /// Create a cell through the `signal` hook.
    pub fn signal(&self, initial: Value) -> Option<CellHandle> {
        let hook = self.hooks.read().signal.clone()?;
        Some(hook(initial))
    }

    /// Read a handle through the `get` hook.
    pub fn get(&self, cell: &CellHandle) -> Option<Value> {
        let hook = self.hooks.read().get.clone()?;
        Some(hook(cell))
    }

    /// Write a handle through the `set` hook. Returns false if no hook is
    /// registered.
    pub fn set(&self, cell: &CellHandle, value: Value) -> bool {
        match self.hooks.read().set.clone() {
            Some(hook) => {
                hook(cell, value);
                true
            }
            None => false,
        }
    }

    /// Ask the engine whether it recognizes `value` as one of its cells.
    pub fn is(&self, value: &Value) -> bool {
        match self.hooks.read().is.clone() {
            Some(hook) => hook(value),
            None => false,
        }
    }

    /// Create a derived computation through the `memo` hook.
    pub fn memo(&self, compute: ComputeFn) -> Option<CellHandle> {
        let hook = self.hooks.read().memo.clone()?;
        Some(hook(compute))
    }

    /// Run `f` inside the engine's `batch` hook, or directly if there is
    /// none.
    pub fn batch<F: FnOnce()>(&self, f: F) {
        let hook = self.hooks.read().batch.clone();
        match hook {
            Some(hook) => {
                let mut f = Some(f);
                let mut call = || {
                    if let Some(f) = f.take() {
                        f();
                    }
                };
                hook(&mut call);
            }
            None => f(),
        }
    }

    /// Install a re-running task through the `effect` hook.
    pub fn effect(&self, task: TaskFn) -> Option<Subscription> {
        let hook = self.hooks.read().effect.clone()?;
        Some(hook(task))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("missing", &self.missing_hooks())
            .finish()
    }
}

/// Keep-alive token for an engine-managed effect.
///
/// Dropping the subscription releases the effect; any further cleanup is
/// the engine's business.
pub struct Subscription {
    _keepalive: Arc<dyn Any + Send + Sync>,
}

impl Subscription {
    pub fn new<T: Any + Send + Sync>(keepalive: T) -> Self {
        Self {
            _keepalive: Arc::new(keepalive),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Subscription")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_engine_reports_all_required_hooks_missing() {
        let engine = Engine::new();
        assert!(!engine.is_complete());
        assert!(engine.ready().is_none());
        assert_eq!(engine.missing_hooks(), vec!["signal", "get", "set", "is"]);
    }

    #[test]
    fn require_names_the_first_missing_hook() {
        let engine = Engine::new();
        engine.configure(|hooks| {
            hooks.signal = Some(Arc::new(|v: Value| CellHandle::new(v)));
        });
        assert_eq!(engine.require().unwrap_err(), StoreError::MissingHook("get"));
    }

    #[test]
    fn piecemeal_registration_completes() {
        let engine = Engine::new();
        engine.configure(|hooks| {
            hooks.signal = Some(Arc::new(|v: Value| CellHandle::new(v)));
            hooks.get = Some(Arc::new(|_: &CellHandle| Value::Null));
        });
        assert!(!engine.is_complete());

        engine.configure(|hooks| {
            hooks.set = Some(Arc::new(|_: &CellHandle, _: Value| {}));
            hooks.is = Some(Arc::new(|_: &Value| false));
        });
        assert!(engine.is_complete());
        assert!(engine.ready().is_some());
        assert!(engine.ready().unwrap().memo.is_none());
    }

    #[test]
    fn clones_share_the_registry() {
        let engine = Engine::new();
        let alias = engine.clone();
        alias.configure(|hooks| {
            hooks.signal = Some(Arc::new(|v: Value| CellHandle::new(v)));
            hooks.get = Some(Arc::new(|_: &CellHandle| Value::Null));
            hooks.set = Some(Arc::new(|_: &CellHandle, _: Value| {}));
            hooks.is = Some(Arc::new(|_: &Value| false));
        });
        assert!(engine.is_complete());
    }

    #[test]
    fn convenience_calls_are_inert_without_hooks() {
        let engine = Engine::new();
        let handle = CellHandle::new(0_u8);

        assert!(engine.signal(Value::Int(1)).is_none());
        assert!(engine.get(&handle).is_none());
        assert!(!engine.set(&handle, Value::Int(1)));
        assert!(!engine.is(&Value::Int(1)));
        assert!(engine.memo(Box::new(|| Value::Null)).is_none());
        assert!(engine.effect(Box::new(|| {})).is_none());

        // batch without a hook still runs the closure
        let mut ran = false;
        engine.batch(|| ran = true);
        assert!(ran);
    }
}
