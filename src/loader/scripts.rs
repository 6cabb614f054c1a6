use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::Module;

/// A precompiled script and the library that carries it.
#[derive(Debug, Clone)]
pub struct ScriptEntry {
    pub path: PathBuf,
    pub module: Arc<Module>,
}

/// Index of scripts contained in loaded script libraries.
///
/// Libraries are queued when added and reflected into the path index on
/// the next query.
pub struct ScriptLibraryDatabase {
    source_root: PathBuf,
    pending: Mutex<Vec<Arc<Module>>>,
    dirty: AtomicBool,
    entries: RwLock<HashMap<PathBuf, ScriptEntry>>,
}

impl ScriptLibraryDatabase {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            pending: Mutex::new(Vec::new()),
            dirty: AtomicBool::new(false),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn add_script_library(&self, module: Arc<Module>) {
        let mut pending = self.pending.lock();
        pending.push(module);
        self.dirty.store(true, Ordering::Release);
    }

    /// Forgets a library, whether or not it was reflected yet.
    pub fn remove_script_library(&self, identity: &str) -> bool {
        let mut pending = self.pending.lock();
        let queued = pending.len();
        pending.retain(|module| module.identity() != identity);
        let mut entries = self.entries.write();
        let indexed = entries.len();
        entries.retain(|_, entry| entry.module.identity() != identity);
        queued != pending.len() || indexed != entries.len()
    }

    pub fn clear_script_libraries(&self) {
        let mut pending = self.pending.lock();
        pending.clear();
        self.dirty.store(false, Ordering::Release);
        self.entries.write().clear();
    }

    pub fn contains_script(&self, path: &Path) -> bool {
        self.reflect_pending();
        self.entries.read().contains_key(&self.resolve(path))
    }

    pub fn script_entry(&self, path: &Path) -> Option<ScriptEntry> {
        self.reflect_pending();
        self.entries.read().get(&self.resolve(path)).cloned()
    }

    pub fn script_count(&self) -> usize {
        self.reflect_pending();
        self.entries.read().len()
    }

    fn reflect_pending(&self) {
        if !self.dirty.load(Ordering::Acquire) {
            return;
        }
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return;
        }
        let mut entries = self.entries.write();
        for module in pending.drain(..) {
            for script in module.scripts() {
                let path = self.resolve(script);
                debug!(
                    path = %path.display(),
                    library = module.name(),
                    "indexed precompiled script"
                );
                entries.insert(
                    path.clone(),
                    ScriptEntry {
                        path,
                        module: Arc::clone(&module),
                    },
                );
            }
        }
        self.dirty.store(false, Ordering::Release);
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.source_root.join(path))
        }
    }
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
