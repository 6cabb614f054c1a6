use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::value::{HostArray, HostValue};

/// Shape of a host delegate type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DelegateSignature {
    pub name: String,
    pub arity: usize,
}

impl DelegateSignature {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

/// A statically typed conversion target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
    Decimal,
    Char,
    String,
    DateTime,
    DbNull,
    /// A value type, identified by name.
    Struct(String),
    Array(Box<HostType>),
    Delegate(DelegateSignature),
    /// A reference type, identified by name. `object` accepts any value.
    Class(String),
}

impl HostType {
    pub fn array_of(element: HostType) -> HostType {
        HostType::Array(Box::new(element))
    }

    pub fn class(name: impl Into<String>) -> HostType {
        HostType::Class(name.into())
    }

    pub fn structure(name: impl Into<String>) -> HostType {
        HostType::Struct(name.into())
    }

    /// Value handed back together with a `Failed` strictness when nothing
    /// better is available.
    pub fn default_value(&self) -> HostValue {
        match self {
            HostType::Boolean => HostValue::Bool(false),
            HostType::Int8 => HostValue::I8(0),
            HostType::Int16 => HostValue::I16(0),
            HostType::Int32 => HostValue::I32(0),
            HostType::Int64 => HostValue::I64(0),
            HostType::UInt8 => HostValue::U8(0),
            HostType::UInt16 => HostValue::U16(0),
            HostType::UInt32 => HostValue::U32(0),
            HostType::UInt64 => HostValue::U64(0),
            HostType::Single => HostValue::F32(0.0),
            HostType::Double => HostValue::F64(0.0),
            HostType::Decimal => HostValue::Decimal(Decimal::ZERO),
            HostType::Char => HostValue::Char('\0'),
            HostType::DateTime => HostValue::DateTime(NaiveDateTime::default()),
            HostType::DbNull => HostValue::DbNull,
            HostType::String
            | HostType::Struct(_)
            | HostType::Array(_)
            | HostType::Delegate(_)
            | HostType::Class(_) => HostValue::Null,
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Boolean => f.write_str("Boolean"),
            HostType::Int8 => f.write_str("SByte"),
            HostType::Int16 => f.write_str("Int16"),
            HostType::Int32 => f.write_str("Int32"),
            HostType::Int64 => f.write_str("Int64"),
            HostType::UInt8 => f.write_str("Byte"),
            HostType::UInt16 => f.write_str("UInt16"),
            HostType::UInt32 => f.write_str("UInt32"),
            HostType::UInt64 => f.write_str("UInt64"),
            HostType::Single => f.write_str("Single"),
            HostType::Double => f.write_str("Double"),
            HostType::Decimal => f.write_str("Decimal"),
            HostType::Char => f.write_str("Char"),
            HostType::String => f.write_str("String"),
            HostType::DateTime => f.write_str("DateTime"),
            HostType::DbNull => f.write_str("DBNull"),
            HostType::Struct(name) | HostType::Class(name) => f.write_str(name),
            HostType::Array(element) => write!(f, "{element}[]"),
            HostType::Delegate(signature) => f.write_str(&signature.name),
        }
    }
}

/// Rust types that can be requested from the conversion engine.
pub trait HostRepr: Sized {
    fn host_type() -> HostType;

    /// Extracts the Rust value; anything of the wrong shape yields the
    /// type's zero value.
    fn from_host(value: HostValue) -> Self;
}

macro_rules! host_repr {
    ($ty:ty, $target:ident, $variant:ident, $zero:expr) => {
        impl HostRepr for $ty {
            fn host_type() -> HostType {
                HostType::$target
            }

            fn from_host(value: HostValue) -> Self {
                match value {
                    HostValue::$variant(v) => v,
                    _ => $zero,
                }
            }
        }
    };
}

host_repr!(bool, Boolean, Bool, false);
host_repr!(i8, Int8, I8, 0);
host_repr!(i16, Int16, I16, 0);
host_repr!(i32, Int32, I32, 0);
host_repr!(i64, Int64, I64, 0);
host_repr!(u8, UInt8, U8, 0);
host_repr!(u16, UInt16, U16, 0);
host_repr!(u32, UInt32, U32, 0);
host_repr!(u64, UInt64, U64, 0);
host_repr!(f32, Single, F32, 0.0);
host_repr!(f64, Double, F64, 0.0);
host_repr!(Decimal, Decimal, Decimal, Decimal::ZERO);
host_repr!(char, Char, Char, '\0');
host_repr!(String, String, String, String::new());
host_repr!(NaiveDateTime, DateTime, DateTime, NaiveDateTime::default());

impl<T: HostRepr> HostRepr for Vec<T> {
    fn host_type() -> HostType {
        HostType::array_of(T::host_type())
    }

    fn from_host(value: HostValue) -> Self {
        match value {
            HostValue::Array(HostArray { items, .. }) => {
                items.into_iter().map(T::from_host).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// `None` stands for a null host reference.
impl<T: HostRepr> HostRepr for Option<T> {
    fn host_type() -> HostType {
        T::host_type()
    }

    fn from_host(value: HostValue) -> Self {
        match value {
            HostValue::Null => None,
            other => Some(T::from_host(other)),
        }
    }
}
