//==================================================
// File: registry/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Process-wide tables of declared types, functions and constants
// Objective: Case-insensitive lookup with built-ins seeded once at construction
//==================================================

mod builtins;
mod descriptor;
mod dual_map;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

pub use builtins::{CORE_MODULE, PRIMITIVE_TYPES, primitive_key};
pub use descriptor::{
    ClassConstantDesc, ConstantDesc, FieldDesc, FunctionDesc, MemberAttributes, MemberTable,
    MethodDesc, NativeCallback, TypeBuilder, TypeDesc, TypeKind, native_callback,
};
pub use dual_map::DualMap;

use crate::name::fold_case;

//==================================================
// Section 1.0 - Declaration Batches
//==================================================
/// Declarations contributed by one module.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub types: Vec<Arc<TypeDesc>>,
    pub functions: Vec<Arc<FunctionDesc>>,
    pub constants: Vec<ConstantDesc>,
}

impl Declarations {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.functions.is_empty() && self.constants.is_empty()
    }
}

//==================================================
// Section 2.0 - Type Registry
//==================================================
/// Name to descriptor tables. Every `declare_*` call replaces an existing
/// entry of the same name; lookups never fail, they return `None`.
pub struct TypeRegistry {
    types: RwLock<HashMap<String, Arc<TypeDesc>>>,
    functions: RwLock<HashMap<String, Arc<FunctionDesc>>>,
    constants: RwLock<DualMap<Arc<ConstantDesc>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates a registry seeded with the primitive pseudo-types, the
    /// built-in class catalog and the core constants.
    pub fn new() -> Self {
        let registry = Self::empty();
        builtins::populate(&registry);
        registry
    }

    /// Creates a registry with no entries at all.
    pub fn empty() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            functions: RwLock::new(HashMap::new()),
            constants: RwLock::new(DualMap::new()),
        }
    }

    /// Declares a type under its own name. Returns the replaced descriptor.
    pub fn declare_type(&self, ty: Arc<TypeDesc>) -> Option<Arc<TypeDesc>> {
        let key = ty.name().key();
        self.types.write().insert(key, ty)
    }

    /// Declares a type under an explicit lookup name.
    pub fn declare_type_as(&self, name: &str, ty: Arc<TypeDesc>) -> Option<Arc<TypeDesc>> {
        self.types.write().insert(fold_case(name).into_owned(), ty)
    }

    pub fn declare_function(&self, function: Arc<FunctionDesc>) -> Option<Arc<FunctionDesc>> {
        let key = function.name().key();
        self.functions.write().insert(key, function)
    }

    pub fn declare_constant(&self, constant: ConstantDesc) {
        let name = constant.name.clone();
        let ignore_case = !constant.case_sensitive;
        self.constants
            .write()
            .insert(&name, Arc::new(constant), ignore_case);
    }

    pub fn lookup_type(&self, name: &str) -> Option<Arc<TypeDesc>> {
        self.types.read().get(fold_case(name).as_ref()).cloned()
    }

    pub fn lookup_function(&self, name: &str) -> Option<Arc<FunctionDesc>> {
        self.functions.read().get(fold_case(name).as_ref()).cloned()
    }

    /// Looks the constant up by exact spelling, then through the
    /// case-insensitive index.
    pub fn lookup_constant(&self, name: &str) -> Option<Arc<ConstantDesc>> {
        self.constants.read().get(name).cloned()
    }

    /// Exact spelling only.
    pub fn lookup_constant_exact(&self, name: &str) -> Option<Arc<ConstantDesc>> {
        self.constants.read().get_exact(name).cloned()
    }

    pub fn type_count(&self) -> usize {
        self.types.read().len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.read().len()
    }

    pub fn constant_count(&self) -> usize {
        self.constants.read().len()
    }

    /// Declared type names in their declared spelling.
    pub fn type_names(&self) -> Vec<String> {
        self.types
            .read()
            .values()
            .map(|ty| ty.name().to_string())
            .collect()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions
            .read()
            .values()
            .map(|function| function.name().to_string())
            .collect()
    }

    pub fn functions(&self) -> Vec<Arc<FunctionDesc>> {
        self.functions.read().values().cloned().collect()
    }

    /// Declares every export of a module.
    pub fn load_module_entries(&self, module: &str, declarations: &Declarations) {
        debug!(
            module,
            types = declarations.types.len(),
            functions = declarations.functions.len(),
            constants = declarations.constants.len(),
            "registering module declarations"
        );
        for ty in &declarations.types {
            self.declare_type(ty.clone());
        }
        for function in &declarations.functions {
            self.declare_function(function.clone());
        }
        for constant in &declarations.constants {
            self.declare_constant(constant.clone());
        }
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_count())
            .field("functions", &self.function_count())
            .field("constants", &self.constant_count())
            .finish()
    }
}
