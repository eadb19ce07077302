//! Reactive Context
//!
//! The reactive context tracks which subscriber is currently evaluating.
//! This enables automatic dependency tracking: when an intercepted field is
//! read, its registry asks the context who is reading and records the
//! relation with that subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack of evaluation entries. Entering a context
//! pushes an entry and returns a guard; dropping the guard pops it. Because
//! the pop lives in `Drop`, the entry is released on every exit path: normal
//! return, early return through `?`, and unwinding.
//!
//! Only the top of the stack is ever consulted, so there is exactly one
//! active evaluator at a time. Nested evaluations (a subscriber created or
//! updated from inside another subscriber's read function) push on top and
//! restore the outer evaluator when they finish.

use std::cell::RefCell;
use std::sync::Arc;

use super::subscriber::{SubscriberId, Watcher};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The evaluating subscriber, or `None` for an untracked scope.
    watcher: Option<Arc<Watcher>>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter an evaluation for the given subscriber.
    ///
    /// While the returned guard is alive, every registry that is read
    /// records the relation with `watcher`.
    pub(crate) fn enter(watcher: Arc<Watcher>) -> Self {
        let subscriber_id = Some(watcher.id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                watcher: Some(watcher),
            });
        });

        Self { subscriber_id }
    }

    fn enter_untracked() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry { watcher: None });
        });

        Self {
            subscriber_id: None,
        }
    }

    /// Run `f` with no active subscriber.
    ///
    /// Reads performed inside `f` are not recorded, even when called from
    /// a subscriber's read function.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _ctx = Self::enter_untracked();
        f()
    }

    /// Check if a subscriber is currently evaluating.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the evaluating subscriber's ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.watcher.as_ref().map(|w| w.id()))
        })
    }

    /// The evaluating subscriber itself.
    ///
    /// The handle is cloned out so the stack is not borrowed while the
    /// caller records a dependency.
    pub(crate) fn current_watcher() -> Option<Arc<Watcher>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.watcher.clone())
        })
    }

    /// Number of evaluations (tracked or untracked) currently on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = popped {
            let popped_id = entry.watcher.as_ref().map(|w| w.id());
            debug_assert_eq!(
                popped_id, self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id, popped_id
            );
        }
    }
}
