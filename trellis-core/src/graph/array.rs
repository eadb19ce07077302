//! Arrays and the Mutation Shim
//!
//! `Array` wraps a plain `Vec<Value>` behind a shared handle. Its seven
//! in-place mutating operations are the only way a structural change can be
//! observed: each one runs the native `Vec` behavior, then (if the array is
//! instrumented) instruments the inserted elements and notifies the array's
//! container registry.
//!
//! Index access through `get`/`set` is deliberately not intercepted.

use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::observer::{self, ContainerRecord};
use super::value::{self, Value};
use crate::error::{ObserveError, Result};

/// The in-place mutating operations intercepted on instrumented arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMethod {
    Push,
    Unshift,
    Pop,
    Shift,
    Splice,
    Sort,
    Reverse,
}

impl ArrayMethod {
    pub const ALL: [ArrayMethod; 7] = [
        ArrayMethod::Push,
        ArrayMethod::Unshift,
        ArrayMethod::Pop,
        ArrayMethod::Shift,
        ArrayMethod::Splice,
        ArrayMethod::Sort,
        ArrayMethod::Reverse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ArrayMethod::Push => "push",
            ArrayMethod::Unshift => "unshift",
            ArrayMethod::Pop => "pop",
            ArrayMethod::Shift => "shift",
            ArrayMethod::Splice => "splice",
            ArrayMethod::Sort => "sort",
            ArrayMethod::Reverse => "reverse",
        }
    }

    /// Whether the operation can insert new elements.
    pub fn inserts(&self) -> bool {
        matches!(
            self,
            ArrayMethod::Push | ArrayMethod::Unshift | ArrayMethod::Splice
        )
    }
}

type Inserted = SmallVec<[Value; 4]>;

/// A shared, mutable sequence of values.
#[derive(Clone, Default)]
pub struct Array {
    inner: Arc<ArrayInner>,
}

#[derive(Default)]
struct ArrayInner {
    items: RwLock<Vec<Value>>,
    record: OnceLock<ContainerRecord>,
}

impl Array {
    /// Create an empty, plain array.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an element. Not tracked.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.read().get(index).cloned()
    }

    /// Overwrite an element. Not intercepted: nobody is notified and the
    /// value is not instrumented.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let mut items = self.inner.items.write();
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or(ObserveError::IndexOutOfBounds { index, len })?;
        *slot = value.into();
        Ok(())
    }

    /// Snapshot of the elements. Not tracked.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// Append elements, returning the new length.
    pub fn push<I, V>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let inserted: Inserted = items.into_iter().map(Into::into).collect();
        self.intercept(ArrayMethod::Push, &inserted, |vec| {
            vec.extend(inserted.iter().cloned());
            vec.len()
        })
    }

    /// Prepend elements, keeping their order, returning the new length.
    pub fn unshift<I, V>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let inserted: Inserted = items.into_iter().map(Into::into).collect();
        self.intercept(ArrayMethod::Unshift, &inserted, |vec| {
            let tail = std::mem::take(vec);
            vec.extend(inserted.iter().cloned());
            vec.extend(tail);
            vec.len()
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.intercept(ArrayMethod::Pop, &[], Vec::pop)
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Result<Option<Value>> {
        self.intercept(ArrayMethod::Shift, &[], |vec| {
            if vec.is_empty() {
                None
            } else {
                Some(vec.remove(0))
            }
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` there,
    /// returning the removed elements.
    ///
    /// A `start` past the end appends; a `delete_count` past the end
    /// removes everything from `start` on.
    pub fn splice<I, V>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let inserted: Inserted = items.into_iter().map(Into::into).collect();
        self.intercept(ArrayMethod::Splice, &inserted, |vec| {
            let start = start.min(vec.len());
            let end = start.saturating_add(delete_count).min(vec.len());
            vec.splice(start..end, inserted.iter().cloned()).collect()
        })
    }

    /// Sort by each element's string form, stable.
    ///
    /// Keys are computed from a snapshot before the array is locked, since
    /// an element's string form may read this array.
    pub fn sort(&self) -> Result<()> {
        let mut keyed: Vec<(String, Value)> = self
            .to_vec()
            .into_iter()
            .map(|item| (item.to_string(), item))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        self.intercept(ArrayMethod::Sort, &[], |vec| {
            *vec = keyed.into_iter().map(|(_, item)| item).collect();
        })
    }

    /// Sort with a comparator, stable.
    ///
    /// The comparator runs while the array is locked and must not touch
    /// this array.
    pub fn sort_by<F>(&self, compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.intercept(ArrayMethod::Sort, &[], |vec| vec.sort_by(compare))
    }

    /// Reverse in place.
    pub fn reverse(&self) -> Result<()> {
        self.intercept(ArrayMethod::Reverse, &[], |vec| vec.reverse())
    }

    fn intercept<R>(
        &self,
        method: ArrayMethod,
        inserted: &[Value],
        native: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Result<R> {
        let result = native(&mut self.inner.items.write());

        let Some(record) = self.inner.record.get() else {
            return Ok(result);
        };

        for item in inserted {
            observer::observe(item);
        }

        tracing::trace!(method = method.name(), inserted = inserted.len(), "array mutation");
        if let Some(dep) = record.dep() {
            dep.notify()?;
        }

        Ok(result)
    }

    /// Check whether two handles refer to the same array.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// The container record, if instrumented.
    pub fn record(&self) -> Option<ContainerRecord> {
        self.inner.record.get().cloned()
    }

    pub(crate) fn instrument(&self) -> ContainerRecord {
        if let Some(record) = self.inner.record.get() {
            return record.clone();
        }
        if self.inner.record.set(ContainerRecord::array()).is_err() {
            return self.record().unwrap_or_else(ContainerRecord::array);
        }

        let items = self.to_vec();
        tracing::trace!(elements = items.len(), "instrument array");
        for item in &items {
            observer::observe(item);
        }

        self.record().unwrap_or_else(ContainerRecord::array)
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                items: RwLock::new(items),
                record: OnceLock::new(),
            }),
        }
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from(iter.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

impl Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        value::debug_container(self.addr(), f, "[...]", |f| {
            f.debug_list().entries(self.to_vec()).finish()
        })
    }
}
