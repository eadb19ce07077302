//! Value Graph
//!
//! This module holds the mutable data graph that subscribers read from:
//! dynamic values, objects with interceptable fields, arrays with an
//! interceptable mutation surface, and the instrumentation pass that turns a
//! plain graph into an observable one.
//!
//! # Overview
//!
//! A graph is built plain, from `Value::object`, `Value::array` or JSON.
//! Nothing is tracked until `observe` is called on it. From then on:
//!
//! - every field that existed at instrumentation time is an observable
//!   location with its own `Dep`;
//! - every instrumented array is an observable location as a whole, changed
//!   only through its seven mutating operations;
//! - anything assigned or inserted later is instrumented on the way in.
//!
//! # Design Decisions
//!
//! 1. Containers are shared handles (`Arc`) so identity is pointer identity,
//!    which is what the "did the value change" check relies on.
//!
//! 2. The "already instrumented" marker is a write-once slot on the
//!    container itself rather than a hidden field, so instrumentation never
//!    changes what a caller sees when iterating fields.
//!
//! 3. Array interception lives on the `Array` type. There is no swapped
//!    method table; a plain array simply has no record to notify.

mod array;
mod json;
mod object;
mod observer;
mod value;

pub use array::{Array, ArrayMethod};
pub use object::Object;
pub use observer::{observe, ContainerKind, ContainerRecord};
pub use value::Value;
