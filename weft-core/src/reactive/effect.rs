//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a cell
//! or memo it read has changed.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs immediately to establish its initial
//!    dependencies.
//!
//! 2. When any dependency changes, the runtime runs the effect again:
//!    immediately, or once at the close of the surrounding batch.
//!
//! 3. Each run clears the previous edges and tracks fresh ones, so an
//!    effect whose body branches only depends on what it actually read.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run on change).
//!
//! An effect stops for good once `dispose` is called or every clone of it
//! has been dropped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::context::TrackingScope;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use crate::graph::{NodeId, NodeKind};

struct EffectInner {
    id: NodeId,
    body: Box<dyn Fn() + Send + Sync>,
    disposed: AtomicBool,
    runs: AtomicUsize,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        Runtime::clear_dependencies(self.id);

        {
            let _scope = TrackingScope::enter(self.id);
            (self.body)();
        }

        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

impl Reactive for EffectInner {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn mark_stale(&self) {}

    fn run(&self) {
        self.execute();
    }

    fn is_eager(&self) -> bool {
        true
    }
}

/// A side-effecting computation that runs when its dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Cell::new(Value::Int(0));
///
/// let effect = Effect::new(move || {
///     println!("count is {:?}", count.get());
/// });
///
/// count.set(Value::Int(5)); // prints: count is 5
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
    _registration: Arc<ReactiveHandle>,
}

impl Effect {
    /// Create an effect and run it once to establish dependencies.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(body);
        effect.inner.execute();
        effect
    }

    /// Create an effect without running it. It first runs when a
    /// dependency established by a manual `execute` changes, or when
    /// `execute` is called.
    pub fn new_lazy<F>(body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            id: NodeId::new(),
            body: Box::new(body),
            disposed: AtomicBool::new(false),
            runs: AtomicUsize::new(0),
        });
        let registration = Arc::new(Runtime::register(inner.clone(), NodeKind::Effect));
        Self {
            inner,
            _registration: registration,
        }
    }

    /// The effect's node in the dependency graph.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Run the effect body now, re-tracking dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Permanently stop the effect.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// How many times the body has run.
    pub fn run_count(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id.raw())
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Cell, Memo};
    use crate::store::Value;
    use std::sync::atomic::AtomicI32;
    use std::sync::Mutex;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new_lazy(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_cell_changes() {
        let cell = Cell::new(Value::Int(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let cell_clone = cell.clone();
        let seen_clone = seen.clone();
        let effect = Effect::new(move || {
            seen_clone.lock().unwrap().push(cell_clone.get());
        });

        cell.set(Value::Int(1));
        cell.set(Value::Int(2));

        assert_eq!(effect.run_count(), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Value::Int(0), Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn effect_reruns_through_a_memo() {
        let cell = Cell::new(Value::Int(2));

        let cell_clone = cell.clone();
        let memo = Memo::new(move || Value::Int(cell_clone.get().as_i64().unwrap() * 10));

        let observed = Arc::new(AtomicI32::new(0));
        let memo_clone = memo.clone();
        let observed_clone = observed.clone();
        let _effect = Effect::new(move || {
            observed_clone.store(memo_clone.get().as_i64().unwrap() as i32, Ordering::SeqCst);
        });

        assert_eq!(observed.load(Ordering::SeqCst), 20);

        cell.set(Value::Int(7));
        assert_eq!(observed.load(Ordering::SeqCst), 70);
    }

    #[test]
    fn disposed_effect_does_not_run() {
        let cell = Cell::new(Value::Int(0));
        let run_count = Arc::new(AtomicI32::new(0));

        let cell_clone = cell.clone();
        let run_count_clone = run_count.clone();
        let effect = Effect::new(move || {
            cell_clone.get();
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        effect.dispose();
        assert!(effect.is_disposed());

        cell.set(Value::Int(1));
        effect.execute();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_effect_stops_running() {
        let cell = Cell::new(Value::Int(0));
        let run_count = Arc::new(AtomicI32::new(0));

        let cell_clone = cell.clone();
        let run_count_clone = run_count.clone();
        let effect = Effect::new(move || {
            cell_clone.get();
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        drop(effect);
        cell.set(Value::Int(1));
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_only_tracks_what_it_reads() {
        let gate = Cell::new(Value::Bool(true));
        let a = Cell::new(Value::Int(1));
        let b = Cell::new(Value::Int(2));

        let (gate_c, a_c, b_c) = (gate.clone(), a.clone(), b.clone());
        let effect = Effect::new(move || {
            if gate_c.get().as_bool().unwrap() {
                a_c.get();
            } else {
                b_c.get();
            }
        });

        assert_eq!(effect.run_count(), 1);

        // Tracked branch reads `a`; `b` is not a dependency yet.
        b.set(Value::Int(20));
        assert_eq!(effect.run_count(), 1);

        gate.set(Value::Bool(false));
        assert_eq!(effect.run_count(), 2);

        // After re-tracking, the roles flip.
        a.set(Value::Int(10));
        assert_eq!(effect.run_count(), 2);
        b.set(Value::Int(30));
        assert_eq!(effect.run_count(), 3);
    }
}
