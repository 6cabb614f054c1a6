//! Per-request script context.
//!
//! Holds the declarations made while a script runs (layered over the
//! application registry), the autoload hook, the error-reporting state and
//! the assertion settings.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AssertionConfig;
use crate::context::ApplicationContext;
use crate::convert::{BoundCallback, CallbackBinder};
use crate::error::{RuntimeError, RuntimeResult};
use crate::name::fold_case;
use crate::registry::{ConstantDesc, Declarations, DualMap, FunctionDesc, TypeDesc};
use crate::value::{ObjectRef, Value};

/// Called with a class name the script could not resolve; expected to
/// declare it.
pub type AutoloadHook = Arc<dyn Fn(&mut ScriptContext, &str) + Send + Sync>;

/// Called with the full path, line and code of a failed assertion.
pub type AssertionCallback = Arc<dyn Fn(&Path, u32, &str) + Send + Sync>;

pub const INVOKE_METHOD: &str = "__invoke";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Notice,
    Warning,
    ParseError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

pub struct ScriptContext {
    app: Arc<ApplicationContext>,
    types: HashMap<String, Arc<TypeDesc>>,
    functions: HashMap<String, Arc<FunctionDesc>>,
    constants: DualMap<Arc<ConstantDesc>>,
    autoload: Option<AutoloadHook>,
    autoloading: HashSet<String>,
    error_reporting_disabled: u32,
    diagnostics: Vec<Diagnostic>,
    assertion: AssertionConfig,
    assertion_callback: Option<AssertionCallback>,
    working_directory: PathBuf,
}

impl ScriptContext {
    pub fn new(app: Arc<ApplicationContext>) -> Self {
        let assertion = app.config().assertion.clone();
        let working_directory = app.working_directory();
        Self {
            app,
            types: HashMap::new(),
            functions: HashMap::new(),
            constants: DualMap::new(),
            autoload: None,
            autoloading: HashSet::new(),
            error_reporting_disabled: 0,
            diagnostics: Vec::new(),
            assertion,
            assertion_callback: None,
            working_directory,
        }
    }

    pub fn app(&self) -> &Arc<ApplicationContext> {
        &self.app
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn set_working_directory(&mut self, path: impl Into<PathBuf>) {
        self.working_directory = path.into();
    }

    pub fn set_autoload(&mut self, hook: AutoloadHook) {
        self.autoload = Some(hook);
    }

    pub fn assertion(&self) -> &AssertionConfig {
        &self.assertion
    }

    pub fn assertion_mut(&mut self) -> &mut AssertionConfig {
        &mut self.assertion
    }

    pub fn assertion_callback(&self) -> Option<AssertionCallback> {
        self.assertion_callback.clone()
    }

    pub fn set_assertion_callback(&mut self, callback: Option<AssertionCallback>) {
        self.assertion_callback = callback;
    }

    pub fn declare_type(&mut self, ty: Arc<TypeDesc>) -> Option<Arc<TypeDesc>> {
        self.types.insert(ty.name().key(), ty)
    }

    pub fn declare_function(&mut self, function: Arc<FunctionDesc>) -> Option<Arc<FunctionDesc>> {
        self.functions.insert(function.name().key(), function)
    }

    pub fn declare_constant(&mut self, constant: ConstantDesc) {
        let name = constant.name.clone();
        let ignore_case = !constant.case_sensitive;
        self.constants.insert(&name, Arc::new(constant), ignore_case);
    }

    /// Declares everything a compiled unit declares.
    pub fn declare(&mut self, declarations: &Declarations) {
        for ty in &declarations.types {
            self.declare_type(Arc::clone(ty));
        }
        for function in &declarations.functions {
            self.declare_function(Arc::clone(function));
        }
        for constant in &declarations.constants {
            self.declare_constant(constant.clone());
        }
    }

    /// Whether the type was declared by this script rather than the
    /// application registry.
    pub fn is_type_declared(&self, name: &str) -> bool {
        self.types.contains_key(fold_case(name).as_ref())
    }

    pub fn is_function_declared(&self, name: &str) -> bool {
        self.functions.contains_key(fold_case(name).as_ref())
    }

    /// Script declarations first, then the application registry. Never
    /// autoloads.
    pub fn find_type(&self, name: &str) -> Option<Arc<TypeDesc>> {
        self.types
            .get(fold_case(name).as_ref())
            .cloned()
            .or_else(|| self.app.lookup_type(name))
    }

    /// Like [`ScriptContext::find_type`], but runs the autoload hook on a
    /// miss when `use_autoload` is set. Recursive autoload of the same name
    /// resolves to `None`.
    pub fn resolve_type(&mut self, name: &str, use_autoload: bool) -> Option<Arc<TypeDesc>> {
        if let Some(ty) = self.find_type(name) {
            return Some(ty);
        }
        if !use_autoload {
            return None;
        }
        let hook = self.autoload.clone()?;
        let key = fold_case(name).into_owned();
        if !self.autoloading.insert(key.clone()) {
            return None;
        }
        debug!(name, "autoloading type");
        hook(self, name);
        self.autoloading.remove(&key);
        self.find_type(name)
    }

    pub fn resolve_function(&self, name: &str) -> Option<Arc<FunctionDesc>> {
        self.functions
            .get(fold_case(name).as_ref())
            .cloned()
            .or_else(|| self.app.lookup_function(name))
    }

    pub fn resolve_constant(&self, name: &str) -> Option<Arc<ConstantDesc>> {
        self.constants
            .get(name)
            .cloned()
            .or_else(|| self.app.lookup_constant(name))
    }

    pub fn call_function(&self, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        let function = self
            .resolve_function(name)
            .ok_or_else(|| RuntimeError::UndefinedFunction(name.to_string()))?;
        function.invoke(args)
    }

    /// Resolves (autoloading if needed) and instantiates a class.
    pub fn instantiate(&mut self, name: &str) -> RuntimeResult<ObjectRef> {
        let ty = self
            .resolve_type(name, true)
            .ok_or_else(|| RuntimeError::UndefinedType(name.to_string()))?;
        ty.instantiate()
    }

    pub fn disable_error_reporting(&mut self) {
        self.error_reporting_disabled += 1;
    }

    pub fn enable_error_reporting(&mut self) {
        self.error_reporting_disabled = self.error_reporting_disabled.saturating_sub(1);
    }

    pub fn is_error_reporting_enabled(&self) -> bool {
        self.error_reporting_disabled == 0
    }

    /// Records a diagnostic unless error reporting is disabled.
    pub fn report(&mut self, level: DiagnosticLevel, message: impl Into<String>) {
        if !self.is_error_reporting_enabled() {
            return;
        }
        let message = message.into();
        warn!(?level, "{message}");
        self.diagnostics.push(Diagnostic { level, message });
    }

    pub fn report_warning(&mut self, message: impl Into<String>) {
        self.report(DiagnosticLevel::Warning, message);
    }

    pub fn report_error(&mut self, message: impl Into<String>) {
        self.report(DiagnosticLevel::ParseError, message);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn bind_method(
        &self,
        ty: &Arc<TypeDesc>,
        method: &str,
        target: Option<ObjectRef>,
    ) -> Option<BoundCallback> {
        let method = ty.find_method(method)?;
        Some(BoundCallback {
            target,
            routine: None,
            callback: method.callback,
        })
    }
}

/// Binds `"function"`, `"Class::method"`, `[$object, "method"]`,
/// `["Class", "method"]` and invokable objects.
impl CallbackBinder for ScriptContext {
    fn bind(&self, designator: &Value) -> Option<BoundCallback> {
        match designator.unwrap_reference() {
            Value::Array(array) if array.len() == 2 => {
                let method = array.get_int(1)?.unwrap_reference();
                let method = method.as_php_string()?;
                match array.get_int(0)?.unwrap_reference() {
                    Value::Object(object) => {
                        let ty = Arc::clone(object.class());
                        self.bind_method(&ty, &method, Some(object))
                    }
                    class => {
                        let ty = self.find_type(&class.as_php_string()?)?;
                        self.bind_method(&ty, &method, None)
                    }
                }
            }
            Value::Object(object) => {
                let ty = Arc::clone(object.class());
                self.bind_method(&ty, INVOKE_METHOD, Some(object))
            }
            other => {
                let name = other.as_php_string()?;
                if let Some((class, method)) = name.split_once("::") {
                    let ty = self.find_type(class)?;
                    return self.bind_method(&ty, method, None);
                }
                let function = self.resolve_function(&name)?;
                Some(BoundCallback {
                    target: None,
                    routine: None,
                    callback: function.callback().clone(),
                })
            }
        }
    }
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("types", &self.types.len())
            .field("functions", &self.functions.len())
            .field("constants", &self.constants.len())
            .field("diagnostics", &self.diagnostics.len())
            .field("working_directory", &self.working_directory)
            .finish()
    }
}
