//! Objects and Intercepted Fields
//!
//! An `Object` is an ordered map of fields behind a shared handle. Until it
//! is instrumented its fields are plain. Instrumentation gives every field
//! that exists at that moment a `Dep`, after which:
//!
//! - reads register the active subscriber with the field (and with the
//!   value's own container registry, and with every array nested inside
//!   an array value);
//! - writes of a value that is not identical to the stored one instrument
//!   the new value and notify the field's subscribers.
//!
//! Fields added later stay plain. Reassigning a field does not detach
//! subscribers from the old value's nested registries; those are shed when
//! each subscriber next re-evaluates and no longer reads them.

use std::fmt::{self, Debug};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::observer::{self, ContainerRecord};
use super::value::{self, Value};
use crate::error::{ObserveError, Result};
use crate::reactive::Dep;

/// A shared, mutable map of fields.
#[derive(Clone, Default)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

#[derive(Default)]
struct ObjectInner {
    fields: RwLock<IndexMap<String, Field>>,
    record: OnceLock<ContainerRecord>,
}

struct Field {
    value: Value,
    /// Present once the field is intercepted.
    dep: Option<Dep>,
}

impl Object {
    /// Create an empty, plain object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a field.
    ///
    /// On an intercepted field this instruments the value and records the
    /// read with the active subscriber, if any.
    pub fn get(&self, key: &str) -> Result<Value> {
        let (value, dep) = {
            let fields = self.inner.fields.read();
            let field = fields
                .get(key)
                .ok_or_else(|| ObserveError::missing_field(key))?;
            (field.value.clone(), field.dep.clone())
        };

        if let Some(dep) = dep {
            let record = observer::observe(&value);
            dep.depend();
            if let Some(container_dep) = record.as_ref().and_then(ContainerRecord::dep) {
                container_dep.depend();
            }
            if let Value::Array(array) = &value {
                observer::depend_array(array);
            }
        }

        Ok(value)
    }

    /// Write a field.
    ///
    /// Writing an identical value does nothing. Writing a missing key adds a
    /// plain field.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let dep = {
            let mut fields = self.inner.fields.write();
            match fields.get_mut(key) {
                Some(field) => {
                    if field.value.is_same(&value) {
                        return Ok(());
                    }
                    field.value = value.clone();
                    field.dep.clone()
                }
                None => {
                    fields.insert(key.to_string(), Field { value, dep: None });
                    return Ok(());
                }
            }
        };

        if let Some(dep) = dep {
            observer::observe(&value);
            tracing::trace!(key, dep = ?dep.id(), "field write");
            dep.notify()?;
        }

        Ok(())
    }

    /// Read a field without instrumenting or tracking it.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.inner
            .fields
            .read()
            .get(key)
            .map(|field| field.value.clone())
    }

    /// The registry of an intercepted field.
    pub fn dep(&self, key: &str) -> Option<Dep> {
        self.inner
            .fields
            .read()
            .get(key)
            .and_then(|field| field.dep.clone())
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.read().keys().cloned().collect()
    }

    /// Snapshot of every field, untracked.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .fields
            .read()
            .iter()
            .map(|(key, field)| (key.clone(), field.value.clone()))
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The container record, if instrumented.
    pub fn record(&self) -> Option<ContainerRecord> {
        self.inner.record.get().cloned()
    }

    pub(crate) fn instrument(&self) -> ContainerRecord {
        if let Some(record) = self.inner.record.get() {
            return record.clone();
        }
        if self.inner.record.set(ContainerRecord::object()).is_err() {
            // Lost a race with another instrumentation; it did the walk.
            return self.record().unwrap_or_else(ContainerRecord::object);
        }

        let mut fields = self.inner.fields.write();
        tracing::trace!(fields = fields.len(), "instrument object");
        for field in fields.values_mut() {
            field.dep.get_or_insert_with(Dep::new);
        }

        self.record().unwrap_or_else(ContainerRecord::object)
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields = iter
            .into_iter()
            .map(|(key, value)| {
                (
                    key.into(),
                    Field {
                        value: value.into(),
                        dep: None,
                    },
                )
            })
            .collect();

        Self {
            inner: Arc::new(ObjectInner {
                fields: RwLock::new(fields),
                record: OnceLock::new(),
            }),
        }
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = Arc::as_ptr(&self.inner) as usize;
        value::debug_container(addr, f, "{...}", |f| {
            f.debug_map().entries(self.entries()).finish()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Subscriber;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn plain_object_reads_and_writes() {
        let object: Object = [("a", 1)].into_iter().collect();

        assert_eq!(object.get("a").unwrap(), Value::from(1));
        object.set("a", 2).unwrap();
        assert_eq!(object.peek("a"), Some(Value::from(2)));
        assert!(object.record().is_none());
    }

    #[test]
    fn missing_field_is_an_error() {
        let object = Object::new();
        let err = object.get("nope").unwrap_err();
        assert!(matches!(err, ObserveError::MissingField { ref key } if key == "nope"));
    }

    #[test]
    fn set_on_missing_key_adds_plain_field() {
        let value = Value::object([("a", 1)]);
        observer::observe(&value);
        let object = value.as_object().unwrap();

        object.set("late", 5).unwrap();

        assert_eq!(object.keys(), vec!["a".to_string(), "late".to_string()]);
        assert!(object.dep("late").is_none());
    }

    #[test]
    fn fields_added_after_instrumentation_are_not_tracked() {
        let value = Value::object([("a", 1)]);
        observer::observe(&value);
        value.set("late", 1).unwrap();

        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let reader = value.clone();
        let sub = Subscriber::new(
            move || reader.get("late"),
            move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

        value.set("late", 2).unwrap();

        assert_eq!(sub.dependency_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn read_tracks_field_registry() {
        let value = Value::object([("a", 1), ("b", 2)]);
        observer::observe(&value);
        let object = value.as_object().unwrap().clone();

        let reader = object.clone();
        let sub = Subscriber::new(move || reader.get("a"), |_, _| {}).unwrap();

        assert!(sub.depends_on(&object.dep("a").unwrap()));
        assert!(!sub.depends_on(&object.dep("b").unwrap()));
    }

    #[test]
    fn read_of_array_field_tracks_container_registries() {
        let nested = Value::array([1]);
        let list = Value::array([nested.clone()]);
        let value = Value::object([("list", list.clone())]);
        observer::observe(&value);

        let reader = value.clone();
        let sub = Subscriber::new(move || reader.get("list"), |_, _| {}).unwrap();

        let list_dep = list.record().unwrap().dep().cloned().unwrap();
        let nested_dep = nested.record().unwrap().dep().cloned().unwrap();
        assert!(sub.depends_on(&list_dep));
        assert!(sub.depends_on(&nested_dep));
        assert_eq!(sub.dependency_count(), 3);
    }

    #[test]
    fn write_instruments_new_value() {
        let value = Value::object([("child", Value::Null)]);
        observer::observe(&value);

        let child = Value::object([("x", 1)]);
        value.set("child", child.clone()).unwrap();

        assert!(child.record().is_some());
    }

    #[test]
    fn structurally_equal_value_still_notifies() {
        let value = Value::object([("child", Value::object([("x", 1)]))]);
        observer::observe(&value);

        let seen = Arc::new(Mutex::new(0));
        let seen_clone = seen.clone();
        let reader = value.clone();
        let _sub = Subscriber::new(
            move || reader.get("child"),
            move |_, _| *seen_clone.lock() += 1,
        )
        .unwrap();

        value.set("child", Value::object([("x", 1)])).unwrap();
        assert_eq!(*seen.lock(), 1);
    }
}
