//==================================================
// File: convert/engine.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Convert runtime values to targets known only at run time
// Objective: Classify each target once and memoize the strategy for the engine lifetime
//==================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::trace;

use super::target::{DelegateSignature, HostRepr, HostType};
use super::to_host;
use super::{ConversionStrictness, Converted};
use crate::error::{RuntimeError, RuntimeResult};
use crate::registry::NativeCallback;
use crate::value::{HostArray, HostDelegate, HostValue, ObjectRef, Value};

/// Class target accepting every non-null value.
pub const OBJECT_CLASS: &str = "object";
/// Host-side names of the runtime's own variable types.
pub const ARRAY_CLASS: &str = "PhpArray";
pub const OBJECT_WRAPPER_CLASS: &str = "PhpObject";
pub const VARIABLE_INTERFACE: &str = "PhpVariable";

static GLOBAL: Lazy<ConversionEngine> = Lazy::new(ConversionEngine::new);

//==================================================
// Section 1.0 - Callback Binding
//==================================================
/// A callable resolved from a script-side designator.
#[derive(Clone)]
pub struct BoundCallback {
    pub target: Option<ObjectRef>,
    /// Routine name when the binding depends on the caller's scope.
    pub routine: Option<String>,
    pub callback: NativeCallback,
}

/// Turns callable designators (`"func"`, `[$obj, "method"]`, ...) into
/// invocable callbacks. Conversions to delegate targets go through it.
pub trait CallbackBinder {
    fn bind(&self, designator: &Value) -> Option<BoundCallback>;
}

/// Binder for contexts that have nothing to bind against.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBinder;

impl CallbackBinder for NoBinder {
    fn bind(&self, _designator: &Value) -> Option<BoundCallback> {
        None
    }
}

//==================================================
// Section 2.0 - Conversion Strategies
//==================================================
/// Closed set of conversion strategies a target classifies into.
#[derive(Debug)]
enum ConversionKind {
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
    Struct(String),
    Array(HostType),
    Delegate(DelegateSignature),
    Class(String),
}

impl ConversionKind {
    fn classify(target: &HostType) -> ConversionKind {
        match target {
            HostType::Boolean => ConversionKind::Boolean,
            HostType::Int8 => ConversionKind::Int8,
            HostType::Int16 => ConversionKind::Int16,
            HostType::Int32 => ConversionKind::Int32,
            HostType::Int64 => ConversionKind::Int64,
            HostType::UInt8 => ConversionKind::UInt8,
            HostType::UInt16 => ConversionKind::UInt16,
            HostType::UInt32 => ConversionKind::UInt32,
            HostType::UInt64 => ConversionKind::UInt64,
            HostType::Single => ConversionKind::Single,
            HostType::Double => ConversionKind::Double,
            HostType::Decimal => ConversionKind::Decimal,
            HostType::Char => ConversionKind::Char,
            HostType::String => ConversionKind::String,
            HostType::DateTime => ConversionKind::DateTime,
            HostType::DbNull => ConversionKind::DbNull,
            HostType::Struct(name) => ConversionKind::Struct(name.clone()),
            HostType::Array(element) => ConversionKind::Array((**element).clone()),
            HostType::Delegate(signature) => ConversionKind::Delegate(signature.clone()),
            HostType::Class(name) => ConversionKind::Class(name.clone()),
        }
    }

    fn convert(
        &self,
        engine: &ConversionEngine,
        value: &Value,
        binder: &dyn CallbackBinder,
    ) -> Converted<HostValue> {
        match self {
            ConversionKind::Boolean => to_host::try_to_boolean(value).map(HostValue::Bool),
            ConversionKind::Int8 => to_host::try_to_int8(value).map(HostValue::I8),
            ConversionKind::Int16 => to_host::try_to_int16(value).map(HostValue::I16),
            ConversionKind::Int32 => to_host::try_to_int32(value).map(HostValue::I32),
            ConversionKind::Int64 => to_host::try_to_int64(value).map(HostValue::I64),
            ConversionKind::UInt8 => to_host::try_to_uint8(value).map(HostValue::U8),
            ConversionKind::UInt16 => to_host::try_to_uint16(value).map(HostValue::U16),
            ConversionKind::UInt32 => to_host::try_to_uint32(value).map(HostValue::U32),
            ConversionKind::UInt64 => to_host::try_to_uint64(value).map(HostValue::U64),
            ConversionKind::Single => to_host::try_to_single(value).map(HostValue::F32),
            ConversionKind::Double => to_host::try_to_double(value).map(HostValue::F64),
            ConversionKind::Decimal => to_host::try_to_decimal(value).map(HostValue::Decimal),
            ConversionKind::Char => to_host::try_to_char(value).map(HostValue::Char),
            ConversionKind::String => to_host::try_to_string(value)
                .map(|s| s.map_or(HostValue::Null, HostValue::String)),
            ConversionKind::DateTime => to_host::try_to_date_time(value).map(HostValue::DateTime),
            ConversionKind::DbNull => to_host::try_to_db_null(value),
            ConversionKind::Struct(name) => to_struct(value, name),
            ConversionKind::Array(element) => engine.to_array(value, element, binder),
            ConversionKind::Delegate(signature) => to_delegate(value, signature, binder),
            ConversionKind::Class(name) => to_class(value, name),
        }
    }
}

//==================================================
// Section 3.0 - Conversion Engine
//==================================================
/// Converts values to targets known only at run time.
///
/// Each target is classified once; the resulting strategy is kept for the
/// lifetime of the engine.
pub struct ConversionEngine {
    routines: Mutex<HashMap<HostType, Arc<ConversionKind>>>,
    classifications: AtomicUsize,
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionEngine {
    pub fn new() -> Self {
        Self {
            routines: Mutex::new(HashMap::new()),
            classifications: AtomicUsize::new(0),
        }
    }

    /// Process-wide engine.
    pub fn global() -> &'static ConversionEngine {
        &GLOBAL
    }

    /// Number of targets classified so far.
    pub fn classification_count(&self) -> usize {
        self.classifications.load(Ordering::Relaxed)
    }

    fn routine(&self, target: &HostType) -> Arc<ConversionKind> {
        let mut routines = self.routines.lock();
        if let Some(kind) = routines.get(target) {
            return Arc::clone(kind);
        }
        let kind = Arc::new(ConversionKind::classify(target));
        self.classifications.fetch_add(1, Ordering::Relaxed);
        trace!(%target, kind = ?kind, "classified conversion target");
        routines.insert(target.clone(), Arc::clone(&kind));
        kind
    }

    pub fn try_convert(
        &self,
        value: &Value,
        target: &HostType,
        binder: &dyn CallbackBinder,
    ) -> Converted<HostValue> {
        self.routine(target).convert(self, value, binder)
    }

    /// Typed front end for callers that know the target statically.
    pub fn try_convert_to<T: HostRepr>(&self, value: &Value) -> Converted<T> {
        self.try_convert(value, &T::host_type(), &NoBinder)
            .map(T::from_host)
    }

    /// Converts without reporting strictness. A host value that already has
    /// the target type passes through; a non-null value that converts to a
    /// null host value is an error.
    pub fn object_to_type(
        &self,
        value: &Value,
        target: &HostType,
        binder: &dyn CallbackBinder,
    ) -> RuntimeResult<HostValue> {
        if let Value::Host(host) = value {
            if host.is_instance_of(target) {
                return Ok(host.as_ref().clone());
            }
        }
        let converted = self.try_convert(value, target, binder);
        if !value.is_null() && matches!(converted.value, HostValue::Null) {
            return Err(RuntimeError::ConversionOutOfRange {
                target: target.to_string(),
                value_type: value.type_name().into_owned(),
            });
        }
        Ok(converted.value)
    }

    /// Dense arrays convert element by element; the result is as strict as
    /// the worst element and the first failing element fails the whole array.
    fn to_array(
        &self,
        value: &Value,
        element: &HostType,
        binder: &dyn CallbackBinder,
    ) -> Converted<HostValue> {
        let bare = value.unwrap_reference();
        let array = match &bare {
            Value::Host(host) => {
                return match host.as_ref() {
                    HostValue::Array(array) if array.element == *element => {
                        Converted::exact(HostValue::Array(array.clone()))
                    }
                    _ => Converted::failed(HostValue::Null),
                };
            }
            Value::Array(array) if array.string_count() == 0 => array,
            _ => return Converted::failed(HostValue::Null),
        };

        let length = match array.max_int_key().checked_add(1) {
            Some(length) if (0..=i64::from(i32::MAX)).contains(&length) => length,
            _ => return Converted::failed(HostValue::Null),
        };

        let routine = self.routine(element);
        let mut strictness = ConversionStrictness::ExactMatch;
        let mut items = Vec::with_capacity(array.len());
        for index in 0..length {
            match array.get_int(index) {
                Some(item) => {
                    let converted = routine.convert(self, item, binder);
                    strictness = strictness.worst(converted.strictness);
                    if strictness.is_failed() {
                        return Converted::failed(HostValue::Null);
                    }
                    items.push(converted.value);
                }
                None => items.push(element.default_value()),
            }
        }
        Converted::new(
            HostValue::Array(HostArray::new(element.clone(), items)),
            strictness,
        )
    }
}

//==================================================
// Section 4.0 - Struct, Delegate & Class Targets
//==================================================
fn to_struct(value: &Value, name: &str) -> Converted<HostValue> {
    if let Value::Host(host) = value.unwrap_reference() {
        if let HostValue::Object(object) = *host {
            if object.class().is_value_type() && object.class().name() == name {
                return Converted::exact(HostValue::Object(object));
            }
        }
    }
    Converted::failed(HostValue::Null)
}

fn to_delegate(
    value: &Value,
    signature: &DelegateSignature,
    binder: &dyn CallbackBinder,
) -> Converted<HostValue> {
    match value.unwrap_reference() {
        Value::Null => return Converted::exact(HostValue::Null),
        Value::Host(host) => {
            if let HostValue::Delegate(delegate) = host.as_ref() {
                if delegate.signature() == signature {
                    return Converted::exact(HostValue::Delegate(delegate.clone()));
                }
            }
        }
        _ => {}
    }

    match binder.bind(value) {
        Some(bound) => Converted::exact(HostValue::Delegate(HostDelegate::new(
            signature.clone(),
            bound.target,
            bound.routine,
            bound.callback,
        ))),
        None => Converted::failed(HostValue::Null),
    }
}

/// Runtime variables other than arrays and objects never pass as a class
/// instance, even when the class name would match.
fn to_class(value: &Value, name: &str) -> Converted<HostValue> {
    if value.is_null() {
        return Converted::new(HostValue::Null, ConversionStrictness::DomainChange);
    }
    let bare = value.unwrap_reference();
    let accepted = match &bare {
        Value::Null | Value::Bytes(_) | Value::Reference(_) => None,
        Value::Host(host) => match host.as_ref() {
            HostValue::Null => None,
            HostValue::Object(object) => object
                .class()
                .is_assignable_to(name)
                .then(|| HostValue::Object(object.clone())),
            other => (name == OBJECT_CLASS || other.type_name() == name).then(|| other.clone()),
        },
        Value::Array(_) => matches!(name, OBJECT_CLASS | ARRAY_CLASS | VARIABLE_INTERFACE)
            .then(|| HostValue::Dynamic(bare.clone())),
        Value::Object(object) => {
            (matches!(name, OBJECT_CLASS | OBJECT_WRAPPER_CLASS | VARIABLE_INTERFACE)
                || object.class().is_subclass_of_name(name))
            .then(|| HostValue::Dynamic(bare.clone()))
        }
        Value::Bool(_) | Value::Int(_) | Value::Long(_) | Value::Double(_) | Value::String(_) => {
            (name == OBJECT_CLASS).then(|| HostValue::Dynamic(bare.clone()))
        }
    };
    match accepted {
        Some(host) => Converted::exact(host),
        None => Converted::failed(HostValue::Null),
    }
}
