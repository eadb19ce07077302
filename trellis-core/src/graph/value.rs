//! Graph Values
//!
//! `Value` is the dynamic type stored in object fields and array slots.
//! Containers are shared handles, so cloning a `Value::Object` or
//! `Value::Array` gives another reference to the same container.

use std::cell::RefCell;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use smallvec::SmallVec;

use super::array::Array;
use super::object::Object;
use super::observer::ContainerRecord;
use crate::error::{ObserveError, Result};

/// A node of a value graph.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(Object),
    Array(Array),
}

impl Value {
    /// Build an object value from key/value pairs.
    pub fn object<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(fields.into_iter().collect())
    }

    /// Build an array value from elements.
    pub fn array<V>(items: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Value>,
    {
        Value::Array(items.into_iter().collect())
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
        }
    }

    /// Identity comparison: same container, or same primitive.
    ///
    /// Numbers use same-value semantics: every NaN is the same as every
    /// other NaN, while `0.0` and `-0.0` are different.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as an integer, if it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Read a field through this value, which must be an object.
    ///
    /// Tracked exactly like `Object::get`.
    pub fn get(&self, key: &str) -> Result<Value> {
        self.expect_object()?.get(key)
    }

    /// Write a field through this value, which must be an object.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.expect_object()?.set(key, value)
    }

    /// This value as an array, or `NotAnArray`.
    pub fn expect_array(&self) -> Result<&Array> {
        self.as_array().ok_or(ObserveError::NotAnArray {
            found: self.type_name(),
        })
    }

    /// This value as an object, or `NotAnObject`.
    pub fn expect_object(&self) -> Result<&Object> {
        self.as_object().ok_or(ObserveError::NotAnObject {
            found: self.type_name(),
        })
    }

    /// The container record, if this is an instrumented container.
    pub fn record(&self) -> Option<ContainerRecord> {
        match self {
            Value::Object(o) => o.record(),
            Value::Array(a) => a.record(),
            _ => None,
        }
    }
}

/// Identity equality, see [`Value::is_same`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Array::from(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{}", n as i128)
    } else {
        write!(f, "{n}")
    }
}

/// The string form of a value: numbers without a trailing `.0`, arrays as
/// their elements joined by commas with nulls left empty, objects as
/// `[object Object]`. This is the key used by `Array::sort`.
impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::String(s) => f.write_str(s),
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Array(a) => fmt_joined(a, f, &mut SmallVec::new()),
        }
    }
}

/// Join an array's elements with commas. An array already being joined
/// further up the stack prints as empty, so cycles terminate.
fn fmt_joined(
    array: &Array,
    f: &mut fmt::Formatter<'_>,
    joining: &mut SmallVec<[usize; 8]>,
) -> fmt::Result {
    if joining.contains(&array.addr()) {
        return Ok(());
    }
    joining.push(array.addr());

    for (i, item) in array.to_vec().iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        match item {
            Value::Null => {}
            Value::Array(nested) => fmt_joined(nested, f, joining)?,
            other => Display::fmt(other, f)?,
        }
    }

    joining.pop();
    Ok(())
}

thread_local! {
    static DEBUG_STACK: RefCell<SmallVec<[usize; 8]>> = RefCell::new(SmallVec::new());
}

struct DebugGuard;

impl Drop for DebugGuard {
    fn drop(&mut self) {
        DEBUG_STACK.with(|stack| stack.borrow_mut().pop());
    }
}

/// Debug-format a container, writing `repeated` instead when the same
/// container is already being formatted on this thread.
pub(super) fn debug_container(
    addr: usize,
    f: &mut fmt::Formatter<'_>,
    repeated: &str,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    let entered = DEBUG_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.contains(&addr) {
            false
        } else {
            stack.push(addr);
            true
        }
    });
    if !entered {
        return f.write_str(repeated);
    }

    let _guard = DebugGuard;
    body(f)
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(o) => Debug::fmt(o, f),
            Value::Array(a) => Debug::fmt(a, f),
        }
    }
}
