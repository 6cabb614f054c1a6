use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Value;
use crate::registry::TypeDesc;

pub type ObjectRef = Arc<PhpObject>;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Instance of a declared class.
pub struct PhpObject {
    id: u64,
    class: Arc<TypeDesc>,
    fields: RwLock<IndexMap<String, Value>>,
}

impl PhpObject {
    pub(crate) fn new(class: Arc<TypeDesc>, fields: IndexMap<String, Value>) -> ObjectRef {
        Arc::new(PhpObject {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            class,
            fields: RwLock::new(fields),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn class(&self) -> &Arc<TypeDesc> {
        &self.class
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.fields.write().insert(name.into(), value);
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }
}

impl fmt::Debug for PhpObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhpObject")
            .field("id", &self.id)
            .field("class", &self.class.name().as_str())
            .finish()
    }
}
