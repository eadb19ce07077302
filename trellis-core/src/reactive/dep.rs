//! Dependency Registry
//!
//! A `Dep` is the set of subscribers interested in one observable location:
//! a field of an instrumented object, or an instrumented array as a whole.
//!
//! The registry never decides on its own who depends on it. `depend()` hands
//! itself to the evaluating subscriber, and the subscriber calls back into
//! `subscribe` only when the relation is new. Keeping the subscriber in
//! charge is what lets it drop registries it no longer reads.
//!
//! Both directions are weak: a registry does not keep its subscribers
//! alive, and a subscriber does not keep its registries alive.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId, Watcher};
use crate::error::Result;

/// Unique identifier for a dependency registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    /// Generate a new unique registry ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for DepId {
    fn default() -> Self {
        Self::new()
    }
}

/// The subscribers of one observable location.
///
/// Cloning a `Dep` yields another handle to the same registry.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

pub(crate) struct DepInner {
    id: DepId,
    /// Insertion-ordered so notification order is stable.
    subs: Mutex<IndexMap<SubscriberId, Weak<Watcher>>>,
}

/// Non-owning handle held by subscribers.
#[derive(Clone)]
pub(crate) struct WeakDep(Weak<DepInner>);

impl WeakDep {
    pub(crate) fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(|inner| Dep { inner })
    }
}

impl Dep {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DepInner {
                id: DepId::new(),
                subs: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Get the registry's unique ID.
    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Add a subscriber. Adding one that is already present does nothing.
    ///
    /// This is one half of the two-way binding only; the subscriber will not
    /// know about this registry. Prefer letting `depend()` do it.
    pub fn add_sub(&self, subscriber: &Subscriber) {
        self.subscribe(subscriber.watcher());
    }

    /// Remove a subscriber. Removing one that is absent does nothing.
    pub fn remove_sub(&self, subscriber: &Subscriber) {
        self.unsubscribe(subscriber.id());
    }

    pub(crate) fn subscribe(&self, watcher: &Arc<Watcher>) {
        self.inner
            .subs
            .lock()
            .entry(watcher.id())
            .or_insert_with(|| Arc::downgrade(watcher));
    }

    pub(crate) fn unsubscribe(&self, id: SubscriberId) {
        self.inner.subs.lock().shift_remove(&id);
    }

    /// Record that the evaluating subscriber, if any, read this location.
    pub fn depend(&self) {
        if let Some(watcher) = ReactiveContext::current_watcher() {
            watcher.add_dep(self);
        }
    }

    /// Re-run every registered subscriber.
    ///
    /// Works on a snapshot taken before the first update, so subscribers
    /// that rewire their dependencies while being notified do not disturb
    /// this pass. Stops at the first failing evaluation and returns its
    /// error.
    pub fn notify(&self) -> Result<()> {
        let subs: SmallVec<[Arc<Watcher>; 4]> = self
            .inner
            .subs
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect();

        tracing::trace!(dep = ?self.id(), subscribers = subs.len(), "notify");

        for watcher in subs {
            watcher.update()?;
        }

        Ok(())
    }

    /// Check whether a subscriber is registered here.
    pub fn has_sub(&self, id: SubscriberId) -> bool {
        self.inner.subs.lock().contains_key(&id)
    }

    /// Get the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subs.lock().len()
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep(Arc::downgrade(&self.inner))
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
