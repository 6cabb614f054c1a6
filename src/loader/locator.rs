use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{LoadTarget, LoadUnit, ModuleKind};
use crate::name::fold_case;
use crate::registry::{ConstantDesc, Declarations, TypeDesc, TypeKind, TypeRegistry};
use crate::value::Value;

const MANIFEST_EXTENSION: &str = "toml";
const FILE_SCHEME: &str = "file://";

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("library '{0}' could not be located")]
    NotFound(String),
    #[error("unsupported library url '{0}'")]
    UnsupportedUrl(String),
    #[error("failed reading '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid manifest '{}': {message}", .path.display())]
    Manifest { path: PathBuf, message: String },
    #[error("{0}")]
    Failed(String),
}

/// Physically loads libraries.
///
/// `registry` is the registry the unit will be registered into; locators
/// may consult it to resolve base types declared by earlier libraries.
pub trait ModuleLocator: Send + Sync {
    fn locate(
        &self,
        target: &LoadTarget,
        config: Option<&toml::Table>,
        registry: &TypeRegistry,
    ) -> Result<LoadUnit, LocateError>;
}

pub type UnitFactory = Arc<dyn Fn() -> Result<LoadUnit, LocateError> + Send + Sync>;

/// In-memory catalog of named load units.
#[derive(Default)]
pub struct CatalogLocator {
    factories: RwLock<HashMap<String, UnitFactory>>,
    loads: AtomicUsize,
}

impl CatalogLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, factory: UnitFactory) {
        self.factories
            .write()
            .insert(fold_case(name).into_owned(), factory);
    }

    /// Registers a fixed unit under its own name.
    pub fn register_unit(&self, unit: LoadUnit) {
        let name = unit.name.clone();
        self.register(&name, Arc::new(move || Ok(unit.clone())));
    }

    /// Number of units handed out so far.
    pub fn physical_loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModuleLocator for CatalogLocator {
    fn locate(
        &self,
        target: &LoadTarget,
        _config: Option<&toml::Table>,
        _registry: &TypeRegistry,
    ) -> Result<LoadUnit, LocateError> {
        let LoadTarget::Name(name) = target else {
            return Err(LocateError::UnsupportedUrl(target.to_string()));
        };
        let factory = self
            .factories
            .read()
            .get(fold_case(name).as_ref())
            .cloned()
            .ok_or_else(|| LocateError::NotFound(name.clone()))?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        factory()
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    references: Vec<String>,
    #[serde(default)]
    scripts: Vec<PathBuf>,
    #[serde(default)]
    classes: Vec<ManifestClass>,
    #[serde(default)]
    constants: toml::Table,
}

#[derive(Debug, Deserialize)]
struct ManifestClass {
    name: String,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    implements: Vec<String>,
    #[serde(default)]
    interface: bool,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default)]
    constants: toml::Table,
}

/// Loads libraries described by TOML manifests.
///
/// A name `foo` resolves to the first `foo.toml` found along the search
/// paths; a `file://` URL names the manifest directly.
#[derive(Debug, Default)]
pub struct ManifestLocator {
    search_paths: Vec<PathBuf>,
    loads: AtomicUsize,
}

impl ManifestLocator {
    pub fn new<I, P>(search_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn add_search_path<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn physical_loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn resolve(&self, target: &LoadTarget) -> Result<PathBuf, LocateError> {
        match target {
            LoadTarget::Url(url) => url
                .strip_prefix(FILE_SCHEME)
                .map(PathBuf::from)
                .ok_or_else(|| LocateError::UnsupportedUrl(url.clone())),
            LoadTarget::Name(name) => {
                let file = Path::new(name).with_extension(MANIFEST_EXTENSION);
                self.search_paths
                    .iter()
                    .map(|root| root.join(&file))
                    .find(|candidate| candidate.is_file())
                    .ok_or_else(|| LocateError::NotFound(name.clone()))
            }
        }
    }

    fn read_manifest(path: &Path) -> Result<Manifest, LocateError> {
        let text = fs::read_to_string(path).map_err(|source| LocateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|err| LocateError::Manifest {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

impl ModuleLocator for ManifestLocator {
    fn locate(
        &self,
        target: &LoadTarget,
        _config: Option<&toml::Table>,
        registry: &TypeRegistry,
    ) -> Result<LoadUnit, LocateError> {
        let path = self.resolve(target)?;
        let manifest = Self::read_manifest(&path)?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        debug!(%target, path = %path.display(), "read library manifest");

        let identity = fs::canonicalize(&path)
            .unwrap_or_else(|_| path.clone())
            .display()
            .to_string();
        let kind = if !manifest.scripts.is_empty() {
            ModuleKind::ScriptLibrary
        } else if !manifest.extensions.is_empty() {
            ModuleKind::Library
        } else {
            ModuleKind::Plain
        };
        let declarations = build_declarations(&manifest, registry)
            .map_err(|message| LocateError::Manifest { path, message })?;

        Ok(LoadUnit {
            identity,
            name: manifest.name,
            kind,
            declarations,
            references: manifest
                .references
                .iter()
                .map(|reference| LoadTarget::parse(reference))
                .collect(),
            extensions: manifest.extensions,
            scripts: manifest.scripts,
        })
    }
}

fn build_declarations(
    manifest: &Manifest,
    registry: &TypeRegistry,
) -> Result<Declarations, String> {
    let mut declarations = Declarations::default();
    // classes may refer to classes listed earlier in the same manifest
    let mut local: HashMap<String, Arc<TypeDesc>> = HashMap::new();
    let find = |local: &HashMap<String, Arc<TypeDesc>>, name: &str| {
        local
            .get(fold_case(name).as_ref())
            .cloned()
            .or_else(|| registry.lookup_type(name))
            .ok_or_else(|| format!("unknown type '{name}'"))
    };

    for class in &manifest.classes {
        let kind = match (class.interface, class.is_abstract) {
            (true, _) => TypeKind::Interface,
            (false, true) => TypeKind::AbstractClass,
            (false, false) => TypeKind::Class,
        };
        let mut builder = TypeDesc::builder(class.name.as_str())
            .kind(kind)
            .module(manifest.name.as_str());
        if let Some(base) = &class.base {
            builder = builder.base(find(&local, base)?);
        }
        for interface in &class.implements {
            builder = builder.implements(find(&local, interface)?);
        }
        for (name, value) in &class.constants {
            let value = toml_to_value(value)
                .map_err(|err| format!("{}::{name}: {err}", class.name))?;
            builder = builder.constant(name.as_str(), value);
        }
        let ty = builder.build();
        local.insert(fold_case(&class.name).into_owned(), ty.clone());
        declarations.types.push(ty);
    }

    for (name, value) in &manifest.constants {
        let value = toml_to_value(value).map_err(|err| format!("{name}: {err}"))?;
        declarations
            .constants
            .push(ConstantDesc::new(name.as_str(), value, true).in_module(manifest.name.as_str()));
    }
    Ok(declarations)
}

fn toml_to_value(value: &toml::Value) -> Result<Value, String> {
    match value {
        toml::Value::String(s) => Ok(Value::String(s.clone())),
        toml::Value::Integer(i) => Ok(i32::try_from(*i).map_or(Value::Long(*i), Value::Int)),
        toml::Value::Float(f) => Ok(Value::Double(*f)),
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        other => Err(format!("unsupported constant type {}", other.type_str())),
    }
}
