//! Type, function and constant descriptors.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use bitflags::bitflags;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{RuntimeError, RuntimeResult};
use crate::name::{Name, fold_case};
use crate::value::{ObjectRef, PhpObject, Value};

/// Native implementation of a function or method. The first argument is
/// the bound instance for instance methods.
pub type NativeCallback =
    Arc<dyn Fn(Option<&ObjectRef>, &[Value]) -> RuntimeResult<Value> + Send + Sync>;

/// Wraps a closure as a [`NativeCallback`].
pub fn native_callback<F>(f: F) -> NativeCallback
where
    F: Fn(Option<&ObjectRef>, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemberAttributes: u16 {
        const PUBLIC = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE = 1 << 2;
        const STATIC = 1 << 3;
        const ABSTRACT = 1 << 4;
        const FINAL = 1 << 5;
        const CONSTRUCTOR = 1 << 6;
    }
}

impl Default for MemberAttributes {
    fn default() -> Self {
        MemberAttributes::PUBLIC
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Scalar pseudo-type such as `@integer`.
    Primitive,
    Class,
    AbstractClass,
    Interface,
}

static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
pub struct MethodDesc {
    pub name: Name,
    pub attributes: MemberAttributes,
    pub callback: NativeCallback,
}

impl fmt::Debug for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDesc")
            .field("name", &self.name.as_str())
            .field("attributes", &self.attributes)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassConstantDesc {
    pub name: String,
    pub attributes: MemberAttributes,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    pub name: String,
    pub attributes: MemberAttributes,
    pub default: Value,
}

/// Members declared directly on one type. Methods are keyed by folded name,
/// constants and fields by exact name.
#[derive(Debug, Clone, Default)]
pub struct MemberTable {
    methods: IndexMap<String, MethodDesc>,
    constants: IndexMap<String, ClassConstantDesc>,
    fields: IndexMap<String, FieldDesc>,
}

impl MemberTable {
    pub fn method(&self, name: &str) -> Option<&MethodDesc> {
        self.methods.get(fold_case(name).as_ref())
    }

    pub fn constant(&self, name: &str) -> Option<&ClassConstantDesc> {
        self.constants.get(name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDesc> {
        self.fields.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDesc> {
        self.methods.values()
    }

    pub fn constants(&self) -> impl Iterator<Item = &ClassConstantDesc> {
        self.constants.values()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDesc> {
        self.fields.values()
    }

    fn add_method(&mut self, method: MethodDesc) {
        self.methods.insert(method.name.key(), method);
    }

    fn add_constant(&mut self, constant: ClassConstantDesc) {
        self.constants.insert(constant.name.clone(), constant);
    }

    fn add_field(&mut self, field: FieldDesc) {
        self.fields.insert(field.name.clone(), field);
    }
}

/// A declared type. Identity is the `Arc` allocation; two descriptors with
/// the same name are different types.
pub struct TypeDesc {
    id: u64,
    name: Name,
    kind: TypeKind,
    module: Option<String>,
    base: Option<Arc<TypeDesc>>,
    interfaces: Vec<Arc<TypeDesc>>,
    members: ArcSwap<MemberTable>,
    inject_lock: Mutex<()>,
}

impl TypeDesc {
    pub fn builder(name: impl Into<Name>) -> TypeBuilder {
        TypeBuilder::new(name.into())
    }

    /// Unique per descriptor instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Name of the module that declared the type.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn base(&self) -> Option<&Arc<TypeDesc>> {
        self.base.as_ref()
    }

    pub fn interfaces(&self) -> &[Arc<TypeDesc>] {
        &self.interfaces
    }

    /// Snapshot of the type's own member table.
    pub fn members(&self) -> Arc<MemberTable> {
        self.members.load_full()
    }

    pub fn same_type(&self, other: &TypeDesc) -> bool {
        std::ptr::eq(self, other)
    }

    /// Looks a method up on this type, then along the base chain.
    pub fn find_method(&self, name: &str) -> Option<MethodDesc> {
        let mut current = Some(self);
        while let Some(ty) = current {
            if let Some(method) = ty.members.load().method(name) {
                return Some(method.clone());
            }
            current = ty.base.as_deref();
        }
        None
    }

    /// Looks a class constant up on this type, its bases and interfaces.
    pub fn find_constant(&self, name: &str) -> Option<ClassConstantDesc> {
        if let Some(constant) = self.members.load().constant(name) {
            return Some(constant.clone());
        }
        self.base
            .iter()
            .chain(self.interfaces.iter())
            .find_map(|parent| parent.find_constant(name))
    }

    /// True when `self` is `other` or derives from / implements it.
    pub fn is_subclass_of(&self, other: &TypeDesc) -> bool {
        if self.same_type(other) {
            return true;
        }
        self.base
            .iter()
            .chain(self.interfaces.iter())
            .any(|parent| parent.is_subclass_of(other))
    }

    /// Name-based variant of [`TypeDesc::is_subclass_of`].
    pub fn is_subclass_of_name(&self, name: &str) -> bool {
        if self.name == name {
            return true;
        }
        self.base
            .iter()
            .chain(self.interfaces.iter())
            .any(|parent| parent.is_subclass_of_name(name))
    }

    /// Creates an instance with every declared field at its default value.
    pub fn instantiate(self: &Arc<Self>) -> RuntimeResult<ObjectRef> {
        if self.kind != TypeKind::Class {
            return Err(RuntimeError::CannotInstantiate(self.name.to_string()));
        }
        let mut chain = Vec::new();
        let mut current = Some(self.as_ref());
        while let Some(ty) = current {
            chain.push(ty.members());
            current = ty.base.as_deref();
        }
        let mut fields = IndexMap::new();
        for table in chain.iter().rev() {
            for field in table.fields() {
                if !field.attributes.contains(MemberAttributes::STATIC) {
                    fields.insert(field.name.clone(), field.default.clone());
                }
            }
        }
        Ok(PhpObject::new(Arc::clone(self), fields))
    }

    /// Adds a method unless one with the same name is already declared on
    /// this type. Returns whether the method was added.
    pub(crate) fn inject_method(&self, method: MethodDesc) -> bool {
        let _guard = self.inject_lock.lock();
        let current = self.members.load_full();
        if current.method(&method.name).is_some() {
            return false;
        }
        let mut next = (*current).clone();
        next.add_method(method);
        self.members.store(Arc::new(next));
        true
    }

    pub(crate) fn inject_constant(&self, constant: ClassConstantDesc) -> bool {
        let _guard = self.inject_lock.lock();
        let current = self.members.load_full();
        if current.constant(&constant.name).is_some() {
            return false;
        }
        let mut next = (*current).clone();
        next.add_constant(constant);
        self.members.store(Arc::new(next));
        true
    }
}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDesc")
            .field("id", &self.id)
            .field("name", &self.name.as_str())
            .field("kind", &self.kind)
            .field("module", &self.module)
            .finish()
    }
}

/// Builder for [`TypeDesc`].
pub struct TypeBuilder {
    name: Name,
    kind: TypeKind,
    module: Option<String>,
    base: Option<Arc<TypeDesc>>,
    interfaces: Vec<Arc<TypeDesc>>,
    members: MemberTable,
}

impl TypeBuilder {
    fn new(name: Name) -> Self {
        Self {
            name,
            kind: TypeKind::Class,
            module: None,
            base: None,
            interfaces: Vec::new(),
            members: MemberTable::default(),
        }
    }

    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn base(mut self, base: Arc<TypeDesc>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn implements(mut self, interface: Arc<TypeDesc>) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn method(
        mut self,
        name: impl Into<Name>,
        attributes: MemberAttributes,
        callback: NativeCallback,
    ) -> Self {
        self.members.add_method(MethodDesc {
            name: name.into(),
            attributes,
            callback,
        });
        self
    }

    pub fn constant(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.add_constant(ClassConstantDesc {
            name: name.into(),
            attributes: MemberAttributes::PUBLIC,
            value,
        });
        self
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        attributes: MemberAttributes,
        default: Value,
    ) -> Self {
        self.members.add_field(FieldDesc {
            name: name.into(),
            attributes,
            default,
        });
        self
    }

    pub fn build(self) -> Arc<TypeDesc> {
        Arc::new(TypeDesc {
            id: NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            kind: self.kind,
            module: self.module,
            base: self.base,
            interfaces: self.interfaces,
            members: ArcSwap::from_pointee(self.members),
            inject_lock: Mutex::new(()),
        })
    }
}

/// A declared global function.
pub struct FunctionDesc {
    name: Name,
    module: Option<String>,
    attributes: MemberAttributes,
    callback: NativeCallback,
}

impl FunctionDesc {
    pub fn new(name: impl Into<Name>, callback: NativeCallback) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            module: None,
            attributes: MemberAttributes::PUBLIC | MemberAttributes::STATIC,
            callback,
        })
    }

    pub fn with_module(
        name: impl Into<Name>,
        module: impl Into<String>,
        attributes: MemberAttributes,
        callback: NativeCallback,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            module: Some(module.into()),
            attributes,
            callback,
        })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn attributes(&self) -> MemberAttributes {
        self.attributes
    }

    pub fn callback(&self) -> &NativeCallback {
        &self.callback
    }

    pub fn invoke(&self, args: &[Value]) -> RuntimeResult<Value> {
        (self.callback)(None, args)
    }
}

impl fmt::Debug for FunctionDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDesc")
            .field("name", &self.name.as_str())
            .field("module", &self.module)
            .finish()
    }
}

/// A declared global constant.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDesc {
    pub name: String,
    pub module: Option<String>,
    pub value: Value,
    pub case_sensitive: bool,
}

impl ConstantDesc {
    pub fn new(name: impl Into<String>, value: Value, case_sensitive: bool) -> Self {
        Self {
            name: name.into(),
            module: None,
            value,
            case_sensitive,
        }
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn noop() -> NativeCallback {
        native_callback(|_, _| Ok(Value::Null))
    }

    #[test]
    fn methods_resolve_through_base_chain() {
        let base = TypeDesc::builder("Base")
            .method(
                "Greet",
                MemberAttributes::PUBLIC,
                native_callback(|_, _| Ok(Value::from("hi"))),
            )
            .constant("LIMIT", Value::Int(3))
            .build();
        let derived = TypeDesc::builder("Derived").base(base.clone()).build();

        let method = derived.find_method("greet").expect("inherited method");
        assert_eq!((method.callback)(None, &[]).expect("call"), Value::from("hi"));
        assert_eq!(derived.find_constant("LIMIT").map(|c| c.value), Some(Value::Int(3)));
        assert!(derived.find_constant("limit").is_none());
        assert!(derived.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&derived));
    }

    #[test]
    fn instantiate_collects_fields_and_rejects_interfaces() {
        let base = TypeDesc::builder("Shape")
            .field("sides", MemberAttributes::PUBLIC, Value::Int(0))
            .build();
        let square = TypeDesc::builder("Square")
            .base(base)
            .field("sides", MemberAttributes::PUBLIC, Value::Int(4))
            .field("count", MemberAttributes::STATIC, Value::Int(0))
            .build();
        let object = square.instantiate().expect("instance");
        assert_eq!(object.field("sides"), Some(Value::Int(4)));
        assert_eq!(object.field("count"), None);

        let iface = TypeDesc::builder("Countable").kind(TypeKind::Interface).build();
        assert_eq!(
            iface.instantiate().expect_err("interface"),
            RuntimeError::CannotInstantiate("Countable".into())
        );
    }

    #[test]
    fn concurrent_injection_adds_once() {
        let ty = TypeDesc::builder("Target").build();
        let added: usize = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let ty = ty.clone();
                    scope.spawn(move || {
                        ty.inject_method(MethodDesc {
                            name: Name::from("getIterator"),
                            attributes: MemberAttributes::PUBLIC | MemberAttributes::ABSTRACT,
                            callback: noop(),
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("join"))
                .filter(|added| *added)
                .count()
        });
        assert_eq!(added, 1);
        assert_eq!(ty.members().methods().count(), 1);
    }
}
