use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::{ObjectRef, Value};
use crate::convert::{DelegateSignature, HostType};
use crate::error::RuntimeResult;
use crate::registry::NativeCallback;

/// Statically typed representation produced by conversions, or carried
/// inside [`Value::Host`] when host code hands a value back to scripts.
#[derive(Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Char(char),
    String(String),
    DateTime(NaiveDateTime),
    DbNull,
    Array(HostArray),
    Object(HostObject),
    Delegate(HostDelegate),
    /// A runtime value accepted as-is by a class target (objects and arrays).
    Dynamic(Value),
}

impl HostValue {
    pub fn type_name(&self) -> String {
        match self {
            HostValue::Null => "null".to_string(),
            HostValue::Bool(_) => "Boolean".to_string(),
            HostValue::I8(_) => "SByte".to_string(),
            HostValue::I16(_) => "Int16".to_string(),
            HostValue::I32(_) => "Int32".to_string(),
            HostValue::I64(_) => "Int64".to_string(),
            HostValue::U8(_) => "Byte".to_string(),
            HostValue::U16(_) => "UInt16".to_string(),
            HostValue::U32(_) => "UInt32".to_string(),
            HostValue::U64(_) => "UInt64".to_string(),
            HostValue::F32(_) => "Single".to_string(),
            HostValue::F64(_) => "Double".to_string(),
            HostValue::Decimal(_) => "Decimal".to_string(),
            HostValue::Char(_) => "Char".to_string(),
            HostValue::String(_) => "String".to_string(),
            HostValue::DateTime(_) => "DateTime".to_string(),
            HostValue::DbNull => "DBNull".to_string(),
            HostValue::Array(array) => format!("{}[]", array.element),
            HostValue::Object(object) => object.class.name().to_string(),
            HostValue::Delegate(delegate) => delegate.signature.name.clone(),
            HostValue::Dynamic(value) => value.type_name().into_owned(),
        }
    }

    /// Whether the value is an instance of `target` without any conversion.
    pub fn is_instance_of(&self, target: &HostType) -> bool {
        match (self, target) {
            (HostValue::Bool(_), HostType::Boolean)
            | (HostValue::I8(_), HostType::Int8)
            | (HostValue::I16(_), HostType::Int16)
            | (HostValue::I32(_), HostType::Int32)
            | (HostValue::I64(_), HostType::Int64)
            | (HostValue::U8(_), HostType::UInt8)
            | (HostValue::U16(_), HostType::UInt16)
            | (HostValue::U32(_), HostType::UInt32)
            | (HostValue::U64(_), HostType::UInt64)
            | (HostValue::F32(_), HostType::Single)
            | (HostValue::F64(_), HostType::Double)
            | (HostValue::Decimal(_), HostType::Decimal)
            | (HostValue::Char(_), HostType::Char)
            | (HostValue::String(_), HostType::String)
            | (HostValue::DateTime(_), HostType::DateTime)
            | (HostValue::DbNull, HostType::DbNull) => true,
            (HostValue::Array(array), HostType::Array(element)) => array.element == **element,
            (HostValue::Object(object), HostType::Struct(name)) => {
                object.class.is_value_type() && object.class.name() == name
            }
            (HostValue::Object(object), HostType::Class(name)) => {
                !object.class.is_value_type() && object.class.name() == name
            }
            (HostValue::Delegate(delegate), HostType::Delegate(signature)) => {
                delegate.signature == *signature
            }
            _ => false,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) | (HostValue::DbNull, HostValue::DbNull) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::I8(a), HostValue::I8(b)) => a == b,
            (HostValue::I16(a), HostValue::I16(b)) => a == b,
            (HostValue::I32(a), HostValue::I32(b)) => a == b,
            (HostValue::I64(a), HostValue::I64(b)) => a == b,
            (HostValue::U8(a), HostValue::U8(b)) => a == b,
            (HostValue::U16(a), HostValue::U16(b)) => a == b,
            (HostValue::U32(a), HostValue::U32(b)) => a == b,
            (HostValue::U64(a), HostValue::U64(b)) => a == b,
            (HostValue::F32(a), HostValue::F32(b)) => a == b,
            (HostValue::F64(a), HostValue::F64(b)) => a == b,
            (HostValue::Decimal(a), HostValue::Decimal(b)) => a == b,
            (HostValue::Char(a), HostValue::Char(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::DateTime(a), HostValue::DateTime(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => a.ptr_eq(b),
            (HostValue::Delegate(a), HostValue::Delegate(b)) => a.same_binding(b),
            (HostValue::Dynamic(a), HostValue::Dynamic(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("Null"),
            HostValue::Bool(v) => write!(f, "Bool({v})"),
            HostValue::I8(v) => write!(f, "I8({v})"),
            HostValue::I16(v) => write!(f, "I16({v})"),
            HostValue::I32(v) => write!(f, "I32({v})"),
            HostValue::I64(v) => write!(f, "I64({v})"),
            HostValue::U8(v) => write!(f, "U8({v})"),
            HostValue::U16(v) => write!(f, "U16({v})"),
            HostValue::U32(v) => write!(f, "U32({v})"),
            HostValue::U64(v) => write!(f, "U64({v})"),
            HostValue::F32(v) => write!(f, "F32({v})"),
            HostValue::F64(v) => write!(f, "F64({v})"),
            HostValue::Decimal(v) => write!(f, "Decimal({v})"),
            HostValue::Char(v) => write!(f, "Char({v:?})"),
            HostValue::String(v) => write!(f, "String({v:?})"),
            HostValue::DateTime(v) => write!(f, "DateTime({v})"),
            HostValue::DbNull => f.write_str("DbNull"),
            HostValue::Array(array) => f.debug_tuple("Array").field(array).finish(),
            HostValue::Object(object) => f.debug_tuple("Object").field(object).finish(),
            HostValue::Delegate(delegate) => f.debug_tuple("Delegate").field(delegate).finish(),
            HostValue::Dynamic(value) => f.debug_tuple("Dynamic").field(value).finish(),
        }
    }
}

/// Fixed-size host array with a declared element type.
#[derive(Clone, Debug, PartialEq)]
pub struct HostArray {
    pub element: HostType,
    pub items: Vec<HostValue>,
}

impl HostArray {
    pub fn new(element: HostType, items: Vec<HostValue>) -> Self {
        Self { element, items }
    }
}

/// Shape of a host class or struct as far as assignability is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostClass {
    name: String,
    value_type: bool,
    bases: Vec<String>,
}

impl HostClass {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: false,
            bases: Vec::new(),
        }
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: true,
            bases: Vec::new(),
        }
    }

    /// Adds a base class or implemented interface.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_value_type(&self) -> bool {
        self.value_type
    }

    pub fn is_assignable_to(&self, target: &str) -> bool {
        target == "object" || self.name == target || self.bases.iter().any(|base| base == target)
    }
}

/// Opaque host object. Equality is identity.
#[derive(Clone)]
pub struct HostObject {
    class: Arc<HostClass>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(class: Arc<HostClass>, payload: T) -> Self {
        Self {
            class,
            payload: Arc::new(payload),
        }
    }

    pub fn class(&self) -> &Arc<HostClass> {
        &self.class
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("class", &self.class.name)
            .finish()
    }
}

/// Callable adapter produced when a script callback is converted to a
/// host delegate type.
#[derive(Clone)]
pub struct HostDelegate {
    signature: DelegateSignature,
    target: Option<ObjectRef>,
    routine: Option<String>,
    callback: NativeCallback,
}

impl HostDelegate {
    pub fn new(
        signature: DelegateSignature,
        target: Option<ObjectRef>,
        routine: Option<String>,
        callback: NativeCallback,
    ) -> Self {
        Self {
            signature,
            target,
            routine,
            callback,
        }
    }

    pub fn signature(&self) -> &DelegateSignature {
        &self.signature
    }

    pub fn target(&self) -> Option<&ObjectRef> {
        self.target.as_ref()
    }

    /// Name of the bound routine, when it was bound by name.
    pub fn routine(&self) -> Option<&str> {
        self.routine.as_deref()
    }

    pub fn invoke(&self, args: &[Value]) -> RuntimeResult<Value> {
        (self.callback)(self.target.as_ref(), args)
    }

    fn same_binding(&self, other: &HostDelegate) -> bool {
        self.signature == other.signature
            && Arc::ptr_eq(&self.callback, &other.callback)
            && match (&self.target, &other.target) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Debug for HostDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostDelegate")
            .field("signature", &self.signature)
            .field("routine", &self.routine)
            .field("bound", &self.target.is_some())
            .finish()
    }
}
