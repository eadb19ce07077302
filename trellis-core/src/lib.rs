//! Trellis Core
//!
//! This crate provides fine-grained dependency tracking over a mutable data
//! graph of nested objects and arrays. It implements:
//!
//! - Instrumentation of a plain value graph into observable fields
//! - Per-location dependency registries
//! - Subscribers that discover their own dependencies on every evaluation
//! - Interception of in-place array mutation
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: values, objects, arrays, and the instrumentation pass
//! - `reactive`: registries, subscribers, and the evaluation context
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{observe, Subscriber, Value};
//! use serde_json::json;
//!
//! let state = Value::from(json!({ "flag": true, "num1": 1, "num2": 10 }));
//! observe(&state);
//!
//! let reader = state.clone();
//! let sub = Subscriber::new(
//!     move || {
//!         if reader.get("flag")?.as_bool() == Some(true) {
//!             reader.get("num1")
//!         } else {
//!             reader.get("num2")
//!         }
//!     },
//!     |new, old| println!("updated: {old} -> {new}"),
//! )
//! .unwrap();
//!
//! state.set("num1", 2).unwrap(); // prints "updated: 1 -> 2"
//! state.set("flag", false).unwrap(); // prints "updated: 2 -> 10"
//! state.set("num1", 3).unwrap(); // no longer read, nothing printed
//! assert_eq!(sub.value(), Value::from(10));
//! ```

pub mod graph;
pub mod reactive;

mod error;

pub use error::{ObserveError, Result};
pub use graph::{observe, Array, ArrayMethod, ContainerKind, ContainerRecord, Object, Value};
pub use reactive::{Dep, DepId, ReactiveContext, Subscriber, SubscriberId};
