//! Reactive Primitives
//!
//! This module implements dependency tracking: registries, subscribers, and
//! the context that connects a read to whoever is reading.
//!
//! # Concepts
//!
//! ## Dependency Registries
//!
//! A `Dep` belongs to one observable location and holds the subscribers
//! that read it during their last evaluation. Writing to the location
//! notifies them.
//!
//! ## Subscribers
//!
//! A `Subscriber` is a read function plus a change callback. Each evaluation
//! rebuilds its dependency set from scratch, so dependencies may change over
//! time (conditional reads). The callback fires only when the produced value
//! is not identical to the previous one.
//!
//! ## Reactive Context
//!
//! A thread-local stack recording which subscriber is evaluating right now.
//! Registries consult it at read time.
//!
//! # Implementation Notes
//!
//! Everything is synchronous. `notify()` runs every affected subscriber to
//! completion before returning, and no lock is held while user code runs, so
//! callbacks may write back into the graph.

mod context;
mod dep;
mod subscriber;

pub use context::ReactiveContext;
pub use dep::{Dep, DepId};
pub use subscriber::{Subscriber, SubscriberId};
