//! Type resolution on behalf of the compiler, with dependency recording.

use std::sync::Arc;

use tracing::trace;

use crate::registry::TypeDesc;
use crate::script::ScriptContext;

/// A type name a compiled fragment was bound against, and what it
/// resolved to at compile time. `resolved == None` is a phantom: the name
/// did not resolve, and the fragment stays valid only while it still
/// does not.
#[derive(Debug, Clone)]
pub struct TypeDependency {
    pub name: String,
    pub resolved: Option<Arc<TypeDesc>>,
}

impl TypeDependency {
    pub fn is_phantom(&self) -> bool {
        self.resolved.is_none()
    }

    fn matches(&self, current: Option<&Arc<TypeDesc>>) -> bool {
        match (current, &self.resolved) {
            (Some(current), Some(recorded)) => Arc::ptr_eq(current, recorded),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Resolves type names during one compilation and remembers which
/// runtime-declared types the result depends on.
pub struct TypesProvider<'a> {
    script: &'a mut ScriptContext,
    caller: Option<&'a Arc<TypeDesc>>,
    dependencies: Vec<TypeDependency>,
}

impl<'a> TypesProvider<'a> {
    pub(crate) fn new(script: &'a mut ScriptContext, caller: Option<&'a Arc<TypeDesc>>) -> Self {
        Self {
            script,
            caller,
            dependencies: Vec::new(),
        }
    }

    pub fn script(&mut self) -> &mut ScriptContext {
        &mut *self.script
    }

    pub fn caller(&self) -> Option<&Arc<TypeDesc>> {
        self.caller
    }

    /// Binds a name against the types already visible, without autoloading.
    /// The outcome is recorded even when the name does not resolve, so a
    /// later declaration of that name invalidates the fragment.
    pub fn provide_type(&mut self, name: &str) -> Option<Arc<TypeDesc>> {
        let resolved = resolve(self.script, self.caller, name, false);
        self.record(name, resolved.clone());
        resolved
    }

    /// Resolves a name, running the autoloader on a miss. Only types
    /// declared by the running script are recorded; registry types never
    /// change identity under a fragment.
    pub fn find_and_provide_type(&mut self, name: &str) -> Option<Arc<TypeDesc>> {
        let resolved = resolve(self.script, self.caller, name, true);
        if resolved.is_some() && self.script.is_type_declared(name) {
            self.record(name, resolved.clone());
        }
        resolved
    }

    pub fn is_type_declared(&self, name: &str) -> bool {
        self.script.is_type_declared(name)
    }

    pub fn dependencies(&self) -> &[TypeDependency] {
        &self.dependencies
    }

    pub(crate) fn into_dependencies(self) -> Vec<TypeDependency> {
        self.dependencies
    }

    fn record(&mut self, name: &str, resolved: Option<Arc<TypeDesc>>) {
        if self
            .dependencies
            .iter()
            .any(|dep| dep.name.eq_ignore_ascii_case(name))
        {
            return;
        }
        trace!(name, phantom = resolved.is_none(), "recorded type dependency");
        self.dependencies.push(TypeDependency {
            name: name.to_string(),
            resolved,
        });
    }

    /// Re-resolves every dependency in `script` (autoloading as needed) and
    /// reports whether each one still denotes the recorded type.
    pub fn load_and_match(
        dependencies: &[TypeDependency],
        script: &mut ScriptContext,
        caller: Option<&Arc<TypeDesc>>,
    ) -> bool {
        dependencies.iter().all(|dep| {
            let current = resolve(script, caller, &dep.name, true);
            dep.matches(current.as_ref())
        })
    }
}

fn resolve(
    script: &mut ScriptContext,
    caller: Option<&Arc<TypeDesc>>,
    name: &str,
    use_autoload: bool,
) -> Option<Arc<TypeDesc>> {
    if name.eq_ignore_ascii_case("self") {
        return caller.cloned();
    }
    if name.eq_ignore_ascii_case("parent") {
        return caller.and_then(|ty| ty.base()).cloned();
    }
    script.resolve_type(name, use_autoload)
}
