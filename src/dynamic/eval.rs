//==================================================
// File: dynamic/eval.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Implement eval, create_function and assert
// Objective: Compile through the transient store and run fragments in the caller's scope
//==================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, warn};

use super::compiler::EvalFrame;
use super::source::{EvalKey, EvalKind, SourceCodeDescriptor};
use crate::error::{RuntimeError, RuntimeResult};
use crate::registry::TypeDesc;
use crate::script::ScriptContext;
use crate::value::{Locals, ObjectRef, Value};

pub const LAMBDA_FUNCTION_NAME: &str = "Lambda_";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x1000_0000_01b3;

static LAMBDA_INDEX: AtomicU32 = AtomicU32::new(0);

//==================================================
// Section 1.0 - Eval Scope & Outcome
//==================================================
/// Variables and `$this` of the scope an eval runs in.
pub struct EvalScope<'a> {
    pub locals: &'a mut Locals,
    pub this: Option<ObjectRef>,
    pub class_context: Option<Arc<TypeDesc>>,
}

impl<'a> EvalScope<'a> {
    pub fn new(locals: &'a mut Locals) -> Self {
        Self {
            locals,
            this: None,
            class_context: None,
        }
    }

    pub fn with_this(mut self, this: ObjectRef) -> Self {
        self.class_context = Some(Arc::clone(this.class()));
        self.this = Some(this);
        self
    }

    pub fn with_class_context(mut self, class_context: Arc<TypeDesc>) -> Self {
        self.class_context = Some(class_context);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    Completed(Value),
    /// The fragment did not compile; a parse error was reported.
    CompileFailed,
}

impl EvalOutcome {
    /// PHP's view of the outcome: a failed compilation evaluates to `false`.
    pub fn into_value(self) -> Value {
        match self {
            EvalOutcome::Completed(value) => value,
            EvalOutcome::CompileFailed => Value::Bool(false),
        }
    }
}

//==================================================
// Section 2.0 - Eval
//==================================================
/// Implements the `eval` construct.
pub fn eval(
    script: &mut ScriptContext,
    code: &str,
    synthetic: bool,
    scope: EvalScope<'_>,
    descriptor: SourceCodeDescriptor,
) -> RuntimeResult<Value> {
    let kind = if synthetic {
        EvalKind::SyntheticEval
    } else {
        EvalKind::ExplicitEval
    };
    eval_internal(script, "", code, "", kind, scope, descriptor).map(EvalOutcome::into_value)
}

/// Compiles `prefix + code + suffix` (or reuses a valid cached module),
/// declares what it declares into `script` and runs its entry point.
pub fn eval_internal(
    script: &mut ScriptContext,
    prefix: &str,
    code: &str,
    suffix: &str,
    kind: EvalKind,
    scope: EvalScope<'_>,
    descriptor: SourceCodeDescriptor,
) -> RuntimeResult<EvalOutcome> {
    let app = Arc::clone(script.app());
    let store = app.transient_store()?;

    let key = EvalKey::new(format!("{prefix}{code}{suffix}"), kind, descriptor);
    let module = match store.get_or_compile(&key, script, scope.class_context.as_ref()) {
        Ok(module) => module,
        Err(err) => {
            script.report_error(err.to_string());
            return Ok(EvalOutcome::CompileFailed);
        }
    };

    script.declare(&module.unit().declarations);
    let mut frame = EvalFrame {
        script,
        locals: scope.locals,
        this: scope.this,
        class_context: scope.class_context,
        eval_id: module.eval_id(),
    };
    let value = (module.unit().entry)(&mut frame)?;
    Ok(EvalOutcome::Completed(value))
}

//==================================================
// Section 3.0 - Lambda Functions
//==================================================
/// Deterministic lambda name derived from the parameter and body text.
pub fn generate_lambda_name(parameters: &str, body: &str) -> String {
    format!(
        "{LAMBDA_FUNCTION_NAME}{}_{}{}",
        fnv1a(body),
        fnv1a(parameters),
        parameters.len() + body.len()
    )
}

/// Process-unique lambda name from a shared counter.
pub fn next_lambda_name() -> String {
    let index = LAMBDA_INDEX.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    format!("{LAMBDA_FUNCTION_NAME}{index}")
}

fn fnv1a(text: &str) -> u64 {
    text.bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

/// Implements `create_function`. Returns the function name, or `None` when
/// the generated declaration did not compile.
pub fn create_lambda_function(
    script: &mut ScriptContext,
    parameters: &str,
    body: &str,
    descriptor: SourceCodeDescriptor,
) -> RuntimeResult<Option<String>> {
    let name = generate_lambda_name(parameters, body);
    if script.is_function_declared(&name) {
        return Ok(Some(name));
    }

    let prefix = format!("function {name}({parameters}){{");
    let mut locals = Locals::new();
    let outcome = eval_internal(
        script,
        &prefix,
        body,
        "}",
        EvalKind::LambdaFunction,
        EvalScope::new(&mut locals),
        descriptor,
    )?;
    match outcome {
        EvalOutcome::Completed(_) => {
            debug!(name = %name, "created lambda function");
            Ok(Some(name))
        }
        EvalOutcome::CompileFailed => Ok(None),
    }
}

//==================================================
// Section 4.0 - Assertions
//==================================================
/// Implements the `assert` construct. A string assertion is evaluated as
/// an expression; anything else is checked as is.
pub fn assert(
    script: &mut ScriptContext,
    assertion: &Value,
    scope: EvalScope<'_>,
    descriptor: SourceCodeDescriptor,
) -> RuntimeResult<bool> {
    if !script.assertion().active {
        return Ok(true);
    }

    let Some(code) = assertion.as_php_string().map(|code| code.into_owned()) else {
        return check_assertion(script, assertion, "", &descriptor);
    };

    let quiet = script.assertion().quiet;
    if quiet {
        script.disable_error_reporting();
    }
    let outcome = eval_internal(
        script,
        "return ",
        &code,
        ";",
        EvalKind::Assert,
        scope,
        descriptor.clone(),
    );
    if quiet {
        script.enable_error_reporting();
    }

    let result = outcome?.into_value();
    check_assertion(script, &result, &code, &descriptor)
}

/// Entry half of a compiled-in assertion. Returns whether the assertion
/// should be evaluated at all.
pub fn pre_assert(script: &mut ScriptContext) -> bool {
    if !script.assertion().active {
        return false;
    }
    if script.assertion().quiet {
        script.disable_error_reporting();
    }
    true
}

/// Exit half of a compiled-in assertion.
pub fn post_assert(script: &mut ScriptContext) {
    if script.assertion().quiet {
        script.enable_error_reporting();
    }
}

/// Acts on an evaluated assertion: runs the callback, reports the warning
/// and terminates the script as configured.
pub fn check_assertion(
    script: &mut ScriptContext,
    result: &Value,
    code: &str,
    descriptor: &SourceCodeDescriptor,
) -> RuntimeResult<bool> {
    if result.is_truthy() {
        return Ok(true);
    }

    if let Some(callback) = script.assertion_callback() {
        let full_path = script
            .app()
            .config()
            .compiler
            .source_root
            .join(&descriptor.path);
        callback(full_path.as_path(), descriptor.line, code);
    }

    if script.assertion().report_warning {
        script.report_warning(format!("Assertion \"{code}\" failed"));
    }

    if script.assertion().terminate {
        warn!(location = %descriptor, "assertion terminated the script");
        return Err(RuntimeError::ScriptDied(0));
    }
    Ok(false)
}
