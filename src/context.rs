//==================================================
// File: context.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tie one registry, one library loader and one eval cache together
// Objective: Share them with every script context and own the default-context singleton
//==================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::dynamic::{Compiler, TransientCompilationStore, UnavailableCompiler};
use crate::error::{RuntimeError, RuntimeResult};
use crate::loader::{
    CatalogLocator, LibraryLoader, LibraryModule, LoadTarget, Module, ModuleLocator,
};
use crate::name::Name;
use crate::registry::{
    ClassConstantDesc, ConstantDesc, FunctionDesc, MemberAttributes, MethodDesc, NativeCallback,
    TypeDesc, TypeRegistry,
};
use crate::value::Value;

/// Answers whether a script path can be included.
pub type FileExistencePredicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

//==================================================
// Section 1.0 - Hosting Hooks
//==================================================
/// Environment the runtime is embedded in, e.g. a web server that serves
/// precompiled pages.
pub trait HostingContext: Send + Sync {
    fn contains_precompiled(&self, path: &Path) -> bool;

    fn working_directory(&self) -> Option<PathBuf> {
        None
    }
}

static DEFAULT: OnceCell<Arc<ApplicationContext>> = OnceCell::new();
static EMPTY: Lazy<Arc<ApplicationContext>> =
    Lazy::new(|| Arc::new(ApplicationContext::empty_context()));

//==================================================
// Section 2.0 - Application Context
//==================================================
pub struct ApplicationContext {
    config: RuntimeConfig,
    registry: Arc<TypeRegistry>,
    loader: Option<Arc<LibraryLoader>>,
    transient: Option<TransientCompilationStore>,
    hosting: Option<Arc<dyn HostingContext>>,
    file_exists: OnceCell<FileExistencePredicate>,
}

//==================================================
// Section 3.0 - Builder
//==================================================
/// Builder for [`ApplicationContext`].
pub struct ContextBuilder {
    config: RuntimeConfig,
    registry: Option<Arc<TypeRegistry>>,
    locator: Option<Arc<dyn ModuleLocator>>,
    compiler: Option<Arc<dyn Compiler>>,
    hosting: Option<Arc<dyn HostingContext>>,
    transient: bool,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            config: RuntimeConfig::default(),
            registry: None,
            locator: None,
            compiler: None,
            hosting: None,
            transient: true,
        }
    }
}

impl ContextBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses an existing registry instead of a freshly seeded one.
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn locator(mut self, locator: Arc<dyn ModuleLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn hosting(mut self, hosting: Arc<dyn HostingContext>) -> Self {
        self.hosting = Some(hosting);
        self
    }

    pub fn with_transient_store(mut self, enabled: bool) -> Self {
        self.transient = enabled;
        self
    }

    pub fn build(self) -> ApplicationContext {
        let registry = self.registry.unwrap_or_else(|| Arc::new(TypeRegistry::new()));
        let locator: Arc<dyn ModuleLocator> = match self.locator {
            Some(locator) => locator,
            None => Arc::new(CatalogLocator::new()),
        };
        let loader = LibraryLoader::new(Arc::clone(&registry), locator, &self.config);
        let transient = self.transient.then(|| {
            let compiler: Arc<dyn Compiler> = match self.compiler {
                Some(compiler) => compiler,
                None => Arc::new(UnavailableCompiler),
            };
            TransientCompilationStore::new(compiler)
        });
        info!(
            reflection_only = self.config.loader.reflection_only,
            transient = transient.is_some(),
            hosted = self.hosting.is_some(),
            "created application context"
        );
        ApplicationContext {
            config: self.config,
            registry,
            loader: Some(Arc::new(loader)),
            transient,
            hosting: self.hosting,
            file_exists: OnceCell::new(),
        }
    }
}

impl ApplicationContext {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Installs the process-wide default context. Only the first call wins;
    /// returns whether this call created it.
    pub fn define_default(builder: ContextBuilder) -> bool {
        let mut created = false;
        DEFAULT.get_or_init(|| {
            created = true;
            Arc::new(builder.build())
        });
        created
    }

    /// The process-wide default context, created with defaults on first use.
    pub fn default_context() -> Arc<ApplicationContext> {
        Arc::clone(DEFAULT.get_or_init(|| Arc::new(ContextBuilder::default().build())))
    }

    /// Shared context with an empty registry and no loader or eval cache.
    pub fn empty() -> Arc<ApplicationContext> {
        Arc::clone(&*EMPTY)
    }

    fn empty_context() -> Self {
        Self {
            config: RuntimeConfig::default(),
            registry: Arc::new(TypeRegistry::empty()),
            loader: None,
            transient: None,
            hosting: None,
            file_exists: OnceCell::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        std::ptr::eq(self, Arc::as_ptr(&*EMPTY))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn loader(&self) -> RuntimeResult<&Arc<LibraryLoader>> {
        self.loader
            .as_ref()
            .ok_or_else(|| RuntimeError::invalid_operation("the context has no library loader"))
    }

    pub fn transient_store(&self) -> RuntimeResult<&TransientCompilationStore> {
        self.transient
            .as_ref()
            .ok_or_else(|| RuntimeError::invalid_operation("the context has no eval cache"))
    }

    pub fn hosting(&self) -> Option<&Arc<dyn HostingContext>> {
        self.hosting.as_ref()
    }

    pub fn load_library(
        &self,
        target: &LoadTarget,
        config: Option<&toml::Table>,
    ) -> RuntimeResult<Arc<Module>> {
        self.loader()?.load(target, config)
    }

    pub fn declare_type(&self, ty: Arc<TypeDesc>) -> Option<Arc<TypeDesc>> {
        self.registry.declare_type(ty)
    }

    pub fn declare_function(&self, function: Arc<FunctionDesc>) -> Option<Arc<FunctionDesc>> {
        self.registry.declare_function(function)
    }

    pub fn declare_constant(&self, constant: ConstantDesc) {
        self.registry.declare_constant(constant);
    }

    pub fn lookup_type(&self, name: &str) -> Option<Arc<TypeDesc>> {
        self.registry.lookup_type(name)
    }

    pub fn lookup_function(&self, name: &str) -> Option<Arc<FunctionDesc>> {
        self.registry.lookup_function(name)
    }

    pub fn lookup_constant(&self, name: &str) -> Option<Arc<ConstantDesc>> {
        self.registry.lookup_constant(name)
    }

    /// Adds a method to an already declared type. Returns false when the
    /// type already declares a method of that name.
    pub fn inject_method(
        &self,
        ty: &Arc<TypeDesc>,
        attributes: MemberAttributes,
        name: &str,
        callback: NativeCallback,
    ) -> bool {
        let added = ty.inject_method(MethodDesc {
            name: Name::from(name),
            attributes,
            callback,
        });
        debug!(type_name = %ty.name(), method = name, added, "injected method");
        added
    }

    pub fn inject_constant(
        &self,
        ty: &Arc<TypeDesc>,
        attributes: MemberAttributes,
        name: &str,
        value: Value,
    ) -> bool {
        ty.inject_constant(ClassConstantDesc {
            name: name.to_string(),
            attributes,
            value,
        })
    }

    /// Names of the extensions implemented by loaded libraries.
    pub fn loaded_extensions(&self) -> RuntimeResult<Vec<String>> {
        let loader = self.loader()?;
        Ok(loader
            .loaded_modules::<LibraryModule>()
            .iter()
            .flat_map(|module| module.extensions().iter().cloned())
            .collect())
    }

    /// The library implementing an extension, matched case-insensitively.
    /// Not available when libraries are loaded for reflection only.
    pub fn extension_implementor(&self, extension: &str) -> RuntimeResult<Option<LibraryModule>> {
        let loader = self.loader()?;
        if loader.is_reflection_only() {
            return Err(RuntimeError::invalid_operation(
                "extension implementors are not available in reflection-only mode",
            ));
        }
        Ok(loader
            .loaded_modules::<LibraryModule>()
            .into_iter()
            .find(|module| module.implements_extension(extension)))
    }

    /// Builds, once, the predicate used to decide whether a script exists:
    /// the script library index, then the hosting environment's precompiled
    /// pages, then the filesystem when non-precompiled scripts are allowed.
    pub fn resolve_file_existence_predicate(&self) -> FileExistencePredicate {
        let predicate = self.file_exists.get_or_init(|| {
            let mut stages: Vec<FileExistencePredicate> = Vec::new();
            if let Some(loader) = &self.loader {
                let loader = Arc::clone(loader);
                stages.push(Arc::new(move |path: &Path| {
                    loader.script_libraries().contains_script(path)
                }));
            }
            if let Some(hosting) = &self.hosting {
                let hosting = Arc::clone(hosting);
                stages.push(Arc::new(move |path: &Path| hosting.contains_precompiled(path)));
            }
            if self.config.allows_filesystem_scripts() {
                stages.push(Arc::new(|path: &Path| path.exists()));
            }
            debug!(stages = stages.len(), "built file existence predicate");
            let predicate: FileExistencePredicate =
                Arc::new(move |path: &Path| stages.iter().any(|stage| stage(path)));
            predicate
        });
        Arc::clone(predicate)
    }

    /// Directory relative includes resolve against.
    pub fn working_directory(&self) -> PathBuf {
        self.hosting
            .as_ref()
            .and_then(|hosting| hosting.working_directory())
            .unwrap_or_else(|| self.config.compiler.source_root.clone())
    }
}

impl fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("registry", &self.registry)
            .field("loader", &self.loader)
            .field("transient", &self.transient)
            .field("hosted", &self.hosting.is_some())
            .finish()
    }
}
