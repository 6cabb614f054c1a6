//! Dynamic value model.
//!
//! [`Value`] is what scripts manipulate; [`HostValue`] is what statically
//! typed host code receives after conversion.

mod array;
mod host;
mod object;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

pub use array::{ArrayKey, PhpArray};
pub use host::{HostArray, HostClass, HostDelegate, HostObject, HostValue};
pub use object::{ObjectRef, PhpObject};

use crate::convert::number::double_to_string;

/// Local variable scope handed to eval'd code.
pub type Locals = IndexMap<String, Value>;

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(PhpBytes),
    Array(PhpArray),
    Object(ObjectRef),
    Reference(PhpReference),
    Host(Box<HostValue>),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn host(value: HostValue) -> Self {
        Value::Host(Box::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Follows references until a non-reference value is reached.
    pub fn unwrap_reference(&self) -> Value {
        match self {
            Value::Reference(reference) => reference.get().unwrap_reference(),
            other => other.clone(),
        }
    }

    /// Views the value as text when it is one of the string representations.
    pub fn as_php_string(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Bytes(bytes) => Some(bytes.to_string_lossy()),
            _ => None,
        }
    }

    /// Values implemented by the runtime's own variable types rather than
    /// plain scalars or host values.
    pub fn is_php_variable(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Reference(_) | Value::Bytes(_)
        )
    }

    /// Boolean interpretation of the value.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Long(l) => *l != 0,
            Value::Double(d) => *d != 0.0,
            Value::String(s) => string_to_boolean(s),
            Value::Bytes(bytes) => bytes.is_truthy(),
            Value::Array(array) => !array.is_empty(),
            Value::Object(_) => true,
            Value::Reference(reference) => reference.get().is_truthy(),
            Value::Host(host) => !matches!(**host, HostValue::Null),
        }
    }

    pub fn type_name(&self) -> Cow<'static, str> {
        match self {
            Value::Null => Cow::Borrowed("NULL"),
            Value::Bool(_) => Cow::Borrowed("boolean"),
            Value::Int(_) | Value::Long(_) => Cow::Borrowed("integer"),
            Value::Double(_) => Cow::Borrowed("double"),
            Value::String(_) | Value::Bytes(_) => Cow::Borrowed("string"),
            Value::Array(_) => Cow::Borrowed("array"),
            Value::Object(object) => Cow::Owned(object.class().name().to_string()),
            Value::Reference(reference) => reference.get().type_name(),
            Value::Host(host) => Cow::Owned(host.type_name()),
        }
    }
}

/// `""` and `"0"` are false, everything else is true.
pub fn string_to_boolean(s: &str) -> bool {
    !(s.is_empty() || s == "0")
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Reference(a), Value::Reference(b)) => a.ptr_eq(b),
            (Value::Host(a), Value::Host(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(true) => f.write_str("1"),
            Value::Bool(false) => Ok(()),
            Value::Int(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}"),
            Value::Double(d) => f.write_str(&double_to_string(*d)),
            Value::String(s) => f.write_str(s),
            Value::Bytes(bytes) => f.write_str(&bytes.to_string_lossy()),
            Value::Array(_) => f.write_str("Array"),
            Value::Object(object) => write!(f, "Object({})", object.class().name()),
            Value::Reference(reference) => write!(f, "{}", reference.get()),
            Value::Host(host) => write!(f, "{host:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<PhpArray> for Value {
    fn from(value: PhpArray) -> Self {
        Value::Array(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

/// Binary string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PhpBytes(Vec<u8>);

impl PhpBytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        PhpBytes(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn is_truthy(&self) -> bool {
        !(self.0.is_empty() || self.0 == b"0")
    }
}

/// Shared mutable slot; assigning through one handle is visible through all clones.
#[derive(Clone)]
pub struct PhpReference(Arc<RwLock<Value>>);

impl PhpReference {
    pub fn new(value: Value) -> Self {
        PhpReference(Arc::new(RwLock::new(value)))
    }

    pub fn get(&self) -> Value {
        self.0.read().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.write() = value;
    }

    pub fn ptr_eq(&self, other: &PhpReference) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PhpReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PhpReference").field(&*self.0.read()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_string_rules() {
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from("0").is_truthy());
        assert!(Value::from("0.0").is_truthy());
        assert!(Value::from(" ").is_truthy());
        assert!(!Value::Bytes(PhpBytes::new(b"0".to_vec())).is_truthy());
        assert!(!Value::Array(PhpArray::new()).is_truthy());
        assert!(!Value::Double(0.0).is_truthy());
    }

    #[test]
    fn references_unwrap_transparently() {
        let inner = PhpReference::new(Value::Int(3));
        let outer = PhpReference::new(Value::Reference(inner.clone()));
        assert_eq!(Value::Reference(outer).unwrap_reference(), Value::Int(3));

        inner.set(Value::from("changed"));
        assert_eq!(Value::Reference(inner).unwrap_reference(), Value::from("changed"));
    }

    #[test]
    fn stringy_values_expose_text() {
        assert_eq!(Value::from("abc").as_php_string().as_deref(), Some("abc"));
        assert_eq!(
            Value::Bytes(PhpBytes::new(b"xyz".to_vec())).as_php_string().as_deref(),
            Some("xyz")
        );
        assert!(Value::Int(1).as_php_string().is_none());
    }
}
