//==================================================
// File: loader/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Load libraries into the application registry
// Objective: Deduplicate modules by load-unit identity and register each exactly once
//==================================================

mod locator;
mod scripts;

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info};

pub use locator::{CatalogLocator, LocateError, ManifestLocator, ModuleLocator, UnitFactory};
pub use scripts::{ScriptEntry, ScriptLibraryDatabase};

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::name::fold_case;
use crate::registry::{Declarations, TypeRegistry};

//==================================================
// Section 1.0 - Load Targets & Units
//==================================================
/// What to load: a library name resolved by the locator, or an explicit URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoadTarget {
    Name(String),
    Url(String),
}

impl LoadTarget {
    pub fn name(name: impl Into<String>) -> Self {
        LoadTarget::Name(name.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        LoadTarget::Url(url.into())
    }

    /// Parses a reference as written in a manifest: `file://` and other
    /// scheme-qualified strings are URLs, anything else is a name.
    pub fn parse(reference: &str) -> Self {
        if reference.contains("://") {
            LoadTarget::url(reference)
        } else {
            LoadTarget::name(reference)
        }
    }

    fn alias_key(&self) -> String {
        match self {
            LoadTarget::Name(name) => format!("name:{}", fold_case(name)),
            LoadTarget::Url(url) => format!("url:{url}"),
        }
    }
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadTarget::Name(name) => f.write_str(name),
            LoadTarget::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Implements one or more extensions.
    Library,
    /// Contains precompiled scripts.
    ScriptLibrary,
    Plain,
}

/// A physically loaded unit, as produced by a locator.
#[derive(Debug, Clone)]
pub struct LoadUnit {
    /// Identity of the underlying unit; two targets resolving to the same
    /// identity share one module.
    pub identity: String,
    pub name: String,
    pub kind: ModuleKind,
    pub declarations: Declarations,
    pub references: Vec<LoadTarget>,
    pub extensions: Vec<String>,
    pub scripts: Vec<PathBuf>,
}

impl LoadUnit {
    pub fn new(identity: impl Into<String>, name: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            identity: identity.into(),
            name: name.into(),
            kind,
            declarations: Declarations::default(),
            references: Vec::new(),
            extensions: Vec::new(),
            scripts: Vec::new(),
        }
    }
}

//==================================================
// Section 2.0 - Modules & Views
//==================================================
/// A loaded and registered unit of declarations.
#[derive(Debug)]
pub struct Module {
    identity: String,
    name: String,
    kind: ModuleKind,
    declarations: Declarations,
    references: Vec<LoadTarget>,
    extensions: Vec<String>,
    scripts: Vec<PathBuf>,
    config: Option<toml::Table>,
    references_resolved: AtomicBool,
    resolving: AtomicBool,
}

impl Module {
    fn from_unit(unit: LoadUnit, config: Option<toml::Table>) -> Self {
        Self {
            identity: unit.identity,
            name: unit.name,
            kind: unit.kind,
            declarations: unit.declarations,
            references: unit.references,
            extensions: unit.extensions,
            scripts: unit.scripts,
            config,
            references_resolved: AtomicBool::new(false),
            resolving: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    /// Libraries this module statically references.
    pub fn references(&self) -> &[LoadTarget] {
        &self.references
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn implements_extension(&self, extension: &str) -> bool {
        let wanted = fold_case(extension);
        self.extensions.iter().any(|ext| fold_case(ext) == wanted)
    }

    pub fn scripts(&self) -> &[PathBuf] {
        &self.scripts
    }

    /// Configuration the module was loaded with.
    pub fn config(&self) -> Option<&toml::Table> {
        self.config.as_ref()
    }

    pub fn references_resolved(&self) -> bool {
        self.references_resolved.load(Ordering::Acquire)
    }
}

/// Typed view over loaded modules, used to filter snapshots by kind.
pub trait ModuleView: Sized {
    fn view(module: &Arc<Module>) -> Option<Self>;
}

impl ModuleView for Arc<Module> {
    fn view(module: &Arc<Module>) -> Option<Self> {
        Some(Arc::clone(module))
    }
}

/// A module that implements extensions.
#[derive(Debug, Clone)]
pub struct LibraryModule(Arc<Module>);

impl ModuleView for LibraryModule {
    fn view(module: &Arc<Module>) -> Option<Self> {
        (module.kind == ModuleKind::Library).then(|| LibraryModule(Arc::clone(module)))
    }
}

impl Deref for LibraryModule {
    type Target = Module;

    fn deref(&self) -> &Module {
        &self.0
    }
}

/// A module carrying precompiled scripts.
#[derive(Debug, Clone)]
pub struct ScriptLibraryModule(Arc<Module>);

impl ModuleView for ScriptLibraryModule {
    fn view(module: &Arc<Module>) -> Option<Self> {
        (module.kind == ModuleKind::ScriptLibrary).then(|| ScriptLibraryModule(Arc::clone(module)))
    }
}

impl Deref for ScriptLibraryModule {
    type Target = Module;

    fn deref(&self) -> &Module {
        &self.0
    }
}

//==================================================
// Section 3.0 - Library Loader
//==================================================
#[derive(Default)]
struct LoaderState {
    modules: IndexMap<String, Arc<Module>>,
    /// Load target key to module identity.
    aliases: HashMap<String, String>,
}

pub struct LibraryLoader {
    registry: Arc<TypeRegistry>,
    locator: Arc<dyn ModuleLocator>,
    reflection_only: bool,
    lazy_full_reflection: bool,
    state: Mutex<LoaderState>,
    scripts: ScriptLibraryDatabase,
}

impl LibraryLoader {
    pub fn new(
        registry: Arc<TypeRegistry>,
        locator: Arc<dyn ModuleLocator>,
        config: &RuntimeConfig,
    ) -> Self {
        Self {
            registry,
            locator,
            reflection_only: config.loader.reflection_only,
            lazy_full_reflection: config.loader.lazy_full_reflection,
            state: Mutex::new(LoaderState::default()),
            scripts: ScriptLibraryDatabase::new(config.compiler.source_root.clone()),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn is_reflection_only(&self) -> bool {
        self.reflection_only
    }

    pub fn script_libraries(&self) -> &ScriptLibraryDatabase {
        &self.scripts
    }

    /// Loads a library, or returns the module already loaded for the same
    /// target or the same underlying unit.
    ///
    /// Locating and registering happen under the loader lock, so concurrent
    /// requests for one identity perform a single physical load and a
    /// single registration. Referenced libraries are loaded after the lock
    /// is released; a module whose references failed to load retries them
    /// on its next load.
    pub fn load(
        &self,
        target: &LoadTarget,
        config: Option<&toml::Table>,
    ) -> RuntimeResult<Arc<Module>> {
        let module = self.locate_and_register(target, config)?;
        if !self.reflection_only && !self.lazy_full_reflection {
            self.resolve_references(&module)?;
        }
        Ok(module)
    }

    fn locate_and_register(
        &self,
        target: &LoadTarget,
        config: Option<&toml::Table>,
    ) -> RuntimeResult<Arc<Module>> {
        let mut state = self.state.lock();
        let alias = target.alias_key();
        if let Some(module) = state
            .aliases
            .get(&alias)
            .and_then(|identity| state.modules.get(identity))
        {
            debug!(%target, identity = module.identity(), "library already loaded");
            return Ok(Arc::clone(module));
        }

        let unit = self
            .locator
            .locate(target, config, &self.registry)
            .map_err(|err| RuntimeError::Configuration {
                locator: target.to_string(),
                message: err.to_string(),
            })?;

        if let Some(module) = state.modules.get(&unit.identity).cloned() {
            debug!(%target, identity = module.identity(), "target resolved to a loaded unit");
            state.aliases.insert(alias, unit.identity);
            return Ok(module);
        }

        let module = self.register(&mut state, unit, config.cloned());
        state.aliases.insert(alias, module.identity.clone());
        Ok(module)
    }

    /// Registers an already loaded unit. Returns the existing module when
    /// the identity is known.
    pub fn load_unit(&self, unit: LoadUnit) -> Arc<Module> {
        let mut state = self.state.lock();
        if let Some(module) = state.modules.get(&unit.identity) {
            return Arc::clone(module);
        }
        self.register(&mut state, unit, None)
    }

    fn register(
        &self,
        state: &mut LoaderState,
        unit: LoadUnit,
        config: Option<toml::Table>,
    ) -> Arc<Module> {
        let module = Arc::new(Module::from_unit(unit, config));
        // declarations go in before the module becomes visible as loaded
        self.registry
            .load_module_entries(&module.name, &module.declarations);
        state
            .modules
            .insert(module.identity.clone(), Arc::clone(&module));
        if module.kind == ModuleKind::ScriptLibrary {
            self.scripts.add_script_library(Arc::clone(&module));
        }
        info!(
            module = module.name(),
            identity = module.identity(),
            kind = ?module.kind(),
            "library loaded"
        );
        module
    }

    /// Loads the libraries a module references until that succeeds once.
    /// Does nothing in reflection-only mode, or when the module is reached
    /// again through its own reference chain.
    pub fn resolve_references(&self, module: &Module) -> RuntimeResult<()> {
        if self.reflection_only || module.references_resolved() {
            return Ok(());
        }
        if module.resolving.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let loaded = self.load_references(module.references());
        if loaded.is_ok() {
            module.references_resolved.store(true, Ordering::Release);
        }
        module.resolving.store(false, Ordering::Release);
        loaded.map(|_| ())
    }

    /// Loads each target in order, stopping at the first failure.
    pub fn load_references(&self, targets: &[LoadTarget]) -> RuntimeResult<Vec<Arc<Module>>> {
        targets.iter().map(|target| self.load(target, None)).collect()
    }

    pub fn is_loaded(&self, identity: &str) -> bool {
        self.state.lock().modules.contains_key(identity)
    }

    pub fn module_count(&self) -> usize {
        self.state.lock().modules.len()
    }

    /// Snapshot of the loaded modules that match the requested view, in
    /// load order.
    pub fn loaded_modules<V: ModuleView>(&self) -> Vec<V> {
        self.state
            .lock()
            .modules
            .values()
            .filter_map(V::view)
            .collect()
    }
}

impl fmt::Debug for LibraryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryLoader")
            .field("modules", &self.module_count())
            .field("reflection_only", &self.reflection_only)
            .field("lazy_full_reflection", &self.lazy_full_reflection)
            .finish()
    }
}
