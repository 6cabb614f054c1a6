//! Entries every registry starts with.

use std::sync::Arc;

use super::{
    ConstantDesc, MemberAttributes, NativeCallback, TypeDesc, TypeKind, TypeRegistry,
    native_callback,
};
use crate::value::Value;

/// Module name recorded on built-in declarations.
pub const CORE_MODULE: &str = "core";

/// Scalar pseudo-types, registered under `@`-prefixed keys so that they
/// cannot collide with user classes such as `Array`.
pub const PRIMITIVE_TYPES: [&str; 8] = [
    "int", "bool", "int64", "double", "string", "resource", "array", "object",
];

const FINAL_METHOD: MemberAttributes = MemberAttributes::PUBLIC.union(MemberAttributes::FINAL);

pub fn primitive_key(name: &str) -> String {
    format!("@{name}")
}

pub(super) fn populate(registry: &TypeRegistry) {
    for primitive in PRIMITIVE_TYPES {
        let ty = TypeDesc::builder(primitive)
            .kind(TypeKind::Primitive)
            .module(CORE_MODULE)
            .build();
        registry.declare_type_as(&primitive_key(primitive), ty);
    }

    let mut catalog = Catalog { registry };

    catalog.class("stdClass", None, &[]);
    catalog.class("__PHP_Incomplete_Class", None, &[]);
    catalog.class("Closure", None, &[]);

    let array_access = catalog.interface("ArrayAccess", &[]);
    let serializable = catalog.interface("Serializable", &[]);
    let countable = catalog.interface("Countable", &[]);
    let reflector = catalog.interface("Reflector", &[]);
    catalog.interface("SplObserver", &[]);
    catalog.interface("SplSubject", &[]);

    let traversable = catalog.interface("Traversable", &[]);
    let iterator = catalog.interface("Iterator", &[traversable.clone()]);
    catalog.interface("IteratorAggregate", &[traversable]);
    let seekable = catalog.interface("SeekableIterator", &[iterator.clone()]);
    let outer = catalog.interface("OuterIterator", &[iterator.clone()]);
    let recursive = catalog.interface("RecursiveIterator", &[iterator.clone()]);

    let array_iterator = catalog.class(
        "ArrayIterator",
        None,
        &[seekable, array_access.clone(), countable.clone()],
    );
    catalog.class("RecursiveArrayIterator", Some(array_iterator), &[recursive]);
    catalog.class("EmptyIterator", None, &[iterator.clone()]);
    let iterator_iterator = catalog.class("IteratorIterator", None, &[outer.clone()]);
    catalog.class("AppendIterator", Some(iterator_iterator.clone()), &[]);
    catalog.abstract_class("FilterIterator", Some(iterator_iterator));
    catalog.class("RecursiveIteratorIterator", None, &[outer]);
    catalog.class(
        "SplFixedArray",
        None,
        &[iterator.clone(), array_access.clone(), countable.clone()],
    );
    catalog.class(
        "SplObjectStorage",
        None,
        &[countable, iterator, serializable, array_access],
    );

    let exception = catalog.exception_root();
    let runtime = catalog.class("RuntimeException", Some(exception.clone()), &[]);
    let logic = catalog.class("LogicException", Some(exception.clone()), &[]);
    catalog.class("ErrorException", Some(exception.clone()), &[]);
    catalog.class("InvalidArgumentException", Some(logic.clone()), &[]);
    let bad_function = catalog.class("BadFunctionCallException", Some(logic.clone()), &[]);
    catalog.class("BadMethodCallException", Some(bad_function), &[]);
    catalog.class("LengthException", Some(logic.clone()), &[]);
    catalog.class("DomainException", Some(logic), &[]);
    catalog.class("RangeException", Some(runtime.clone()), &[]);
    catalog.class("OverflowException", Some(runtime.clone()), &[]);
    catalog.class("UnderflowException", Some(runtime), &[]);

    catalog.class("ReflectionException", Some(exception), &[]);
    for name in [
        "ReflectionClass",
        "ReflectionFunction",
        "ReflectionMethod",
        "ReflectionProperty",
    ] {
        catalog.class(name, None, &[reflector.clone()]);
    }

    let core = |name: &str, value: Value, case_sensitive: bool| {
        ConstantDesc::new(name, value, case_sensitive).in_module(CORE_MODULE)
    };
    registry.declare_constant(core("TRUE", Value::Bool(true), false));
    registry.declare_constant(core("FALSE", Value::Bool(false), false));
    registry.declare_constant(core("NULL", Value::Null, false));
    // integers are 32-bit on every platform
    registry.declare_constant(core("PHP_INT_SIZE", Value::Int(4), true));
    registry.declare_constant(core("PHP_INT_MAX", Value::Int(i32::MAX), true));
}

struct Catalog<'a> {
    registry: &'a TypeRegistry,
}

impl Catalog<'_> {
    fn class(
        &mut self,
        name: &str,
        base: Option<Arc<TypeDesc>>,
        interfaces: &[Arc<TypeDesc>],
    ) -> Arc<TypeDesc> {
        self.declare(name, TypeKind::Class, base, interfaces)
    }

    fn abstract_class(&mut self, name: &str, base: Option<Arc<TypeDesc>>) -> Arc<TypeDesc> {
        self.declare(name, TypeKind::AbstractClass, base, &[])
    }

    fn interface(&mut self, name: &str, parents: &[Arc<TypeDesc>]) -> Arc<TypeDesc> {
        self.declare(name, TypeKind::Interface, None, parents)
    }

    fn exception_root(&mut self) -> Arc<TypeDesc> {
        let ty = TypeDesc::builder("Exception")
            .module(CORE_MODULE)
            .field("message", MemberAttributes::PROTECTED, Value::from(""))
            .field("code", MemberAttributes::PROTECTED, Value::Int(0))
            .field("file", MemberAttributes::PROTECTED, Value::from(""))
            .field("line", MemberAttributes::PROTECTED, Value::Int(0))
            .method("getMessage", FINAL_METHOD, field_getter("message"))
            .method("getCode", FINAL_METHOD, field_getter("code"))
            .method("getFile", FINAL_METHOD, field_getter("file"))
            .method("getLine", FINAL_METHOD, field_getter("line"))
            .build();
        self.registry.declare_type(ty.clone());
        ty
    }

    fn declare(
        &mut self,
        name: &str,
        kind: TypeKind,
        base: Option<Arc<TypeDesc>>,
        interfaces: &[Arc<TypeDesc>],
    ) -> Arc<TypeDesc> {
        let mut builder = TypeDesc::builder(name).kind(kind).module(CORE_MODULE);
        if let Some(base) = base {
            builder = builder.base(base);
        }
        for interface in interfaces {
            builder = builder.implements(interface.clone());
        }
        let ty = builder.build();
        self.registry.declare_type(ty.clone());
        ty
    }
}

fn field_getter(field: &'static str) -> NativeCallback {
    native_callback(move |this, _| {
        Ok(this
            .and_then(|object| object.field(field))
            .unwrap_or(Value::Null))
    })
}
