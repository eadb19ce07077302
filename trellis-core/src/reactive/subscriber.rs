//! Subscriber Implementation
//!
//! A Subscriber wraps a read function and a change callback. It runs the
//! read function inside a reactive context, learns which registries were
//! touched, and re-runs whenever one of them notifies.
//!
//! # How Subscribers Work
//!
//! 1. When created, the subscriber evaluates once to establish its initial
//!    value and dependencies.
//!
//! 2. During evaluation every registry that is read calls `add_dep`. New
//!    registries go into the pending set; registries not seen in the
//!    previous cycle are subscribed to.
//!
//! 3. After evaluation, registries from the previous cycle that were not
//!    read again are unsubscribed from, and pending becomes current.
//!
//! 4. On update, if the new value is not identical to the previous one,
//!    the callback receives `(new, old)`.
//!
//! Step 3 is what makes conditional reads work: a subscriber computing
//! `if c { a } else { b }` stops hearing about `a` once `c` flips.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::dep::{Dep, DepId, WeakDep};
use crate::error::Result;
use crate::graph::Value;

/// Unique identifier for a subscriber.
///
/// Registries key their subscriber sets by this ID, so a subscriber is
/// registered at most once per registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type ReadFn = dyn Fn() -> Result<Value> + Send + Sync;
type ChangeFn = dyn Fn(&Value, &Value) + Send + Sync;

/// The shared body of a subscriber.
///
/// Registries hold it weakly; `Subscriber` handles hold it strongly.
pub(crate) struct Watcher {
    id: SubscriberId,
    read: Box<ReadFn>,
    callback: Box<ChangeFn>,
    state: Mutex<WatcherState>,
    active: AtomicBool,
    run_count: AtomicUsize,
}

struct WatcherState {
    /// Result of the last successful evaluation.
    value: Value,
    /// Registries read during the last evaluation.
    deps: IndexMap<DepId, WeakDep>,
    /// Registries read during the evaluation in progress.
    new_deps: IndexMap<DepId, WeakDep>,
}

impl Watcher {
    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    /// Run the read function with this watcher as the active subscriber,
    /// then reconcile the dependency sets.
    ///
    /// Reconciliation also runs when the read fails, against whatever was
    /// read before the failure.
    fn get(self: &Arc<Self>) -> Result<Value> {
        let result = {
            let _ctx = ReactiveContext::enter(Arc::clone(self));
            (self.read)()
        };

        self.cleanup_deps();
        self.run_count.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Record that `dep` was read during the current evaluation.
    pub(crate) fn add_dep(self: &Arc<Self>, dep: &Dep) {
        let id = dep.id();
        let is_new = {
            let mut state = self.state.lock();
            if state.new_deps.contains_key(&id) {
                false
            } else {
                state.new_deps.insert(id, dep.downgrade());
                !state.deps.contains_key(&id)
            }
        };

        if is_new {
            tracing::trace!(subscriber = ?self.id, dep = ?id, "subscribe");
            dep.subscribe(self);
        }
    }

    fn cleanup_deps(&self) {
        let stale: SmallVec<[(DepId, WeakDep); 4]> = {
            let mut state = self.state.lock();
            let pending = std::mem::take(&mut state.new_deps);
            let previous = std::mem::replace(&mut state.deps, pending);
            previous
                .into_iter()
                .filter(|(id, _)| !state.deps.contains_key(id))
                .collect()
        };

        for (id, dep) in stale {
            tracing::trace!(subscriber = ?self.id, dep = ?id, "unsubscribe");
            if let Some(dep) = dep.upgrade() {
                dep.unsubscribe(self.id);
            }
        }
    }

    /// Re-evaluate and fire the callback if the value changed.
    pub(crate) fn update(self: &Arc<Self>) -> Result<()> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }

        let value = self.get()?;

        let old = {
            let mut state = self.state.lock();
            if value.is_same(&state.value) {
                return Ok(());
            }
            std::mem::replace(&mut state.value, value.clone())
        };

        tracing::debug!(subscriber = ?self.id, "value changed");
        (self.callback)(&value, &old);
        Ok(())
    }

    fn teardown(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        let deps = {
            let mut state = self.state.lock();
            state.new_deps.clear();
            std::mem::take(&mut state.deps)
        };

        tracing::debug!(subscriber = ?self.id, deps = deps.len(), "teardown");
        for dep in deps.into_values() {
            if let Some(dep) = dep.upgrade() {
                dep.unsubscribe(self.id);
            }
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// A tracked computation.
///
/// # Example
///
/// ```rust
/// use trellis_core::{observe, Subscriber, Value};
///
/// let state = Value::object([("a", 1), ("b", 2)]);
/// observe(&state);
///
/// let reader = state.clone();
/// let sub = Subscriber::new(move || reader.get("a"), |new, old| {
///     println!("a changed: {old} -> {new}");
/// })
/// .unwrap();
///
/// state.set("a", 2).unwrap(); // prints "a changed: 1 -> 2"
/// assert_eq!(sub.value(), Value::from(2));
/// ```
///
/// Cloning yields another handle to the same subscriber. Registries only
/// hold it weakly: once the last handle is dropped the subscriber
/// unsubscribes everywhere and is never run again.
#[must_use = "a subscriber stops reacting once its last handle is dropped"]
#[derive(Clone)]
pub struct Subscriber {
    watcher: Arc<Watcher>,
}

impl Subscriber {
    /// Create a subscriber and evaluate it once.
    ///
    /// An error from the first evaluation is returned and the subscriber is
    /// discarded.
    pub fn new<R, V, C>(read: R, callback: C) -> Result<Self>
    where
        R: Fn() -> Result<V> + Send + Sync + 'static,
        V: Into<Value>,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let watcher = Arc::new(Watcher {
            id: SubscriberId::new(),
            read: Box::new(move || read().map(Into::into)),
            callback: Box::new(callback),
            state: Mutex::new(WatcherState {
                value: Value::Null,
                deps: IndexMap::new(),
                new_deps: IndexMap::new(),
            }),
            active: AtomicBool::new(true),
            run_count: AtomicUsize::new(0),
        });

        let value = watcher.get()?;
        watcher.state.lock().value = value;

        Ok(Self { watcher })
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.watcher.id
    }

    /// Re-evaluate now, firing the callback if the value changed.
    ///
    /// Does nothing after `teardown`.
    pub fn update(&self) -> Result<()> {
        self.watcher.update()
    }

    /// The value produced by the last successful evaluation.
    pub fn value(&self) -> Value {
        self.watcher.state.lock().value.clone()
    }

    /// Get the number of registries read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.watcher.state.lock().deps.len()
    }

    /// Check whether the subscriber is registered with `dep`.
    pub fn depends_on(&self, dep: &Dep) -> bool {
        self.watcher.state.lock().deps.contains_key(&dep.id())
    }

    /// Get the number of times the read function has run.
    pub fn run_count(&self) -> usize {
        self.watcher.run_count.load(Ordering::Relaxed)
    }

    /// Unsubscribe from every registry and stop reacting.
    pub fn teardown(&self) {
        self.watcher.teardown();
    }

    /// Check whether the subscriber still reacts to changes.
    pub fn is_active(&self) -> bool {
        self.watcher.active.load(Ordering::SeqCst)
    }

    pub(crate) fn watcher(&self) -> &Arc<Watcher> {
        &self.watcher
    }
}

impl Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}
