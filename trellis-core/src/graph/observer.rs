//! Instrumentation
//!
//! `observe` turns a plain container into an observable one. Each
//! container carries a write-once record slot; filling it is the marker
//! that the container has been processed, and it is filled *before* any
//! recursion so shared and cyclic substructure is visited once.
//!
//! - Objects: every field present at this point gets its own `Dep` and
//!   becomes an intercepted field. Field values are instrumented lazily,
//!   when they are read or assigned.
//! - Arrays: the record owns a container-level `Dep`, which switches on the
//!   mutation shim in [`Array`]. Current elements are instrumented eagerly.

use smallvec::SmallVec;

use super::array::Array;
use super::value::Value;
use crate::reactive::Dep;

/// What kind of container a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Object,
    Array,
}

/// Bookkeeping attached to an instrumented container.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    kind: ContainerKind,
    /// Structural-change registry; arrays only.
    dep: Option<Dep>,
}

impl ContainerRecord {
    pub(crate) fn object() -> Self {
        Self {
            kind: ContainerKind::Object,
            dep: None,
        }
    }

    pub(crate) fn array() -> Self {
        Self {
            kind: ContainerKind::Array,
            dep: Some(Dep::new()),
        }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// The container-level registry, present for arrays.
    pub fn dep(&self) -> Option<&Dep> {
        self.dep.as_ref()
    }
}

/// Make a value graph observable.
///
/// Returns `None` for anything that is not an object or array. Calling it
/// again on an instrumented container returns the existing record and does
/// nothing else.
pub fn observe(value: &Value) -> Option<ContainerRecord> {
    match value {
        Value::Object(object) => Some(object.instrument()),
        Value::Array(array) => Some(array.instrument()),
        _ => None,
    }
}

/// Register the active subscriber with every array reachable from `array`.
///
/// Indices are not intercepted, so this is how a subscriber that read an
/// array field hears about structural changes to arrays nested inside it.
pub(crate) fn depend_array(array: &Array) {
    let mut visited: SmallVec<[usize; 8]> = SmallVec::new();
    depend_array_inner(array, &mut visited);
}

fn depend_array_inner(array: &Array, visited: &mut SmallVec<[usize; 8]>) {
    if visited.contains(&array.addr()) {
        return;
    }
    visited.push(array.addr());

    for item in array.to_vec() {
        if let Some(dep) = item.record().as_ref().and_then(ContainerRecord::dep) {
            dep.depend();
        }
        if let Value::Array(nested) = &item {
            depend_array_inner(nested, visited);
        }
    }
}
