//==================================================
// File: dynamic/store.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Cache compiled eval fragments
// Objective: Reuse a fragment only while its recorded type dependencies still resolve identically
//==================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{ReentrantMutex, RwLock};
use tracing::debug;

use super::compiler::{CompileError, CompileRequest, CompiledUnit, Compiler};
use super::provider::{TypeDependency, TypesProvider};
use super::source::EvalKey;
use crate::registry::TypeDesc;
use crate::script::ScriptContext;

//==================================================
// Section 1.0 - Transient Modules
//==================================================
/// One compiled fragment. `eval_id` is its index in the store.
#[derive(Debug)]
pub struct TransientModule {
    eval_id: usize,
    key: EvalKey,
    unit: CompiledUnit,
    dependencies: Vec<TypeDependency>,
}

impl TransientModule {
    pub fn eval_id(&self) -> usize {
        self.eval_id
    }

    pub fn key(&self) -> &EvalKey {
        &self.key
    }

    pub fn unit(&self) -> &CompiledUnit {
        &self.unit
    }

    pub fn dependencies(&self) -> &[TypeDependency] {
        &self.dependencies
    }

    /// Eval id of the module whose code issued this eval.
    pub fn container_id(&self) -> Option<usize> {
        self.key.descriptor.container_id
    }
}

//==================================================
// Section 2.0 - Compilation Store
//==================================================
pub struct TransientCompilationStore {
    compiler: Arc<dyn Compiler>,
    cache: RwLock<HashMap<EvalKey, Arc<TransientModule>>>,
    modules: RwLock<Vec<Arc<TransientModule>>>,
    /// Serializes compilation. Reentrant so that autoload triggered while
    /// compiling may evaluate further code on the same thread.
    compile_gate: ReentrantMutex<()>,
    compilations: AtomicUsize,
    hits: AtomicUsize,
}

impl TransientCompilationStore {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            cache: RwLock::new(HashMap::new()),
            modules: RwLock::new(Vec::new()),
            compile_gate: ReentrantMutex::new(()),
            compilations: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }

    /// Returns a cached module that is still valid for `script`, or `None`.
    /// A cached module that fails revalidation is evicted.
    pub fn get_module(
        &self,
        key: &EvalKey,
        script: &mut ScriptContext,
        caller: Option<&Arc<TypeDesc>>,
    ) -> Option<Arc<TransientModule>> {
        let cached = self.cache.read().get(key).cloned()?;
        if TypesProvider::load_and_match(&cached.dependencies, script, caller) {
            return Some(cached);
        }
        let mut cache = self.cache.write();
        if cache
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &cached))
        {
            cache.remove(key);
        }
        debug!(eval_id = cached.eval_id, "cached fragment no longer matches its type dependencies");
        None
    }

    /// Returns a valid cached module or compiles and caches a new one.
    /// Concurrent requests for the same key compile at most once.
    pub fn get_or_compile(
        &self,
        key: &EvalKey,
        script: &mut ScriptContext,
        caller: Option<&Arc<TypeDesc>>,
    ) -> Result<Arc<TransientModule>, CompileError> {
        if let Some(module) = self.get_module(key, script, caller) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(module);
        }

        let _gate = self.compile_gate.lock();
        if let Some(module) = self.get_module(key, script, caller) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(module);
        }

        let request = CompileRequest {
            source: &key.code,
            kind: key.kind,
            descriptor: &key.descriptor,
        };
        let mut provider = TypesProvider::new(script, caller);
        let unit = self.compiler.compile(&request, &mut provider)?;
        let dependencies = provider.into_dependencies();
        self.compilations.fetch_add(1, Ordering::Relaxed);

        let module = {
            let mut modules = self.modules.write();
            let module = Arc::new(TransientModule {
                eval_id: modules.len(),
                key: key.clone(),
                unit,
                dependencies,
            });
            modules.push(Arc::clone(&module));
            module
        };
        debug!(
            eval_id = module.eval_id,
            kind = ?key.kind,
            dependencies = module.dependencies.len(),
            "compiled transient module"
        );
        self.cache.write().insert(key.clone(), Arc::clone(&module));
        Ok(module)
    }

    pub fn module(&self, eval_id: usize) -> Option<Arc<TransientModule>> {
        self.modules.read().get(eval_id).cloned()
    }

    /// Follows the container chain up to the module compiled from
    /// non-eval code.
    pub fn root_module(&self, eval_id: usize) -> Option<Arc<TransientModule>> {
        let modules = self.modules.read();
        let mut current = modules.get(eval_id)?;
        while let Some(parent) = current.container_id().and_then(|id| modules.get(id)) {
            current = parent;
        }
        Some(Arc::clone(current))
    }

    pub fn compilation_count(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    pub fn module_count(&self) -> usize {
        self.modules.read().len()
    }
}

impl fmt::Debug for TransientCompilationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientCompilationStore")
            .field("cached", &self.cached_count())
            .field("modules", &self.module_count())
            .field("compilations", &self.compilation_count())
            .field("hits", &self.hit_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplicationContext;
    use crate::dynamic::source::{EvalKind, SourceCodeDescriptor};
    use crate::registry::Declarations;
    use crate::value::Value;

    /// Binds the whole source text as a type name.
    struct TypeNameCompiler;

    impl Compiler for TypeNameCompiler {
        fn compile(
            &self,
            request: &CompileRequest<'_>,
            types: &mut TypesProvider<'_>,
        ) -> Result<CompiledUnit, CompileError> {
            if request.source.is_empty() {
                return Err(CompileError::syntax("unexpected end of file", request.descriptor));
            }
            let id = types
                .find_and_provide_type(request.source)
                .map(|ty| ty.id() as i64)
                .unwrap_or(-1);
            Ok(CompiledUnit::new(Declarations::default(), move |_| Ok(Value::Long(id))))
        }
    }

    fn setup() -> (TransientCompilationStore, ScriptContext) {
        let store = TransientCompilationStore::new(Arc::new(TypeNameCompiler));
        let script = ScriptContext::new(Arc::new(ApplicationContext::builder().build()));
        (store, script)
    }

    fn key(code: &str) -> EvalKey {
        EvalKey::new(code, EvalKind::ExplicitEval, SourceCodeDescriptor::new("test.php", 1, 1))
    }

    #[test]
    fn matching_dependencies_reuse_the_module() {
        let (store, mut script) = setup();
        script.declare_type(TypeDesc::builder("Foo").build());

        let first = store.get_or_compile(&key("Foo"), &mut script, None).expect("compile");
        let second = store.get_or_compile(&key("Foo"), &mut script, None).expect("reuse");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.compilation_count(), 1);
        assert_eq!(store.hit_count(), 1);
    }

    #[test]
    fn redeclared_dependency_forces_recompilation() {
        let (store, mut script) = setup();
        script.declare_type(TypeDesc::builder("Foo").build());
        let first = store.get_or_compile(&key("Foo"), &mut script, None).expect("compile");

        script.declare_type(TypeDesc::builder("Foo").build());
        assert!(store.get_module(&key("Foo"), &mut script, None).is_none());
        assert_eq!(store.cached_count(), 0);

        let second = store.get_or_compile(&key("Foo"), &mut script, None).expect("recompile");
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.eval_id(), 1);
        assert_eq!(store.compilation_count(), 2);
    }

    #[test]
    fn compile_errors_are_not_cached() {
        let (store, mut script) = setup();
        let err = store.get_or_compile(&key(""), &mut script, None).expect_err("syntax error");
        assert!(matches!(err, CompileError::Syntax { .. }));
        assert_eq!(store.cached_count(), 0);
        assert_eq!(store.module_count(), 0);
    }

    #[test]
    fn root_module_follows_containers() {
        let (store, mut script) = setup();
        let outer = store.get_or_compile(&key("A"), &mut script, None).expect("outer");
        let nested_key = EvalKey::new(
            "B",
            EvalKind::ExplicitEval,
            SourceCodeDescriptor::new("test.php", 1, 1).within(outer.eval_id()),
        );
        let inner = store.get_or_compile(&nested_key, &mut script, None).expect("inner");

        assert_eq!(inner.container_id(), Some(outer.eval_id()));
        let root = store.root_module(inner.eval_id()).expect("root");
        assert!(Arc::ptr_eq(&root, &outer));
        assert!(store.module(7).is_none());
    }
}
