mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use php_runtime_core::dynamic::{
    EvalScope, SourceCodeDescriptor, assert, check_assertion, create_lambda_function,
    generate_lambda_name, post_assert, pre_assert,
};
use php_runtime_core::script::DiagnosticLevel;
use php_runtime_core::value::{Locals, Value};
use php_runtime_core::{RuntimeConfig, RuntimeError, ScriptContext};

fn at(line: u32) -> SourceCodeDescriptor {
    SourceCodeDescriptor::new("lib/checks.php", line, 1)
}

fn check(script: &mut ScriptContext, assertion: Value) -> Result<bool, RuntimeError> {
    let mut locals = Locals::new();
    assert(script, &assertion, EvalScope::new(&mut locals), at(3))
}

#[test]
fn lambda_functions_are_declared_and_callable() {
    let (app, compiler) = common::context();
    let mut script = common::script(&app);

    let name = create_lambda_function(&mut script, "$a, $b", "return $b;", at(1))
        .expect("create")
        .expect("compiled");
    assert_eq!(name, generate_lambda_name("$a, $b", "return $b;"));
    assert!(script.is_function_declared(&name));
    assert_eq!(
        script
            .call_function(&name, &[Value::Int(1), Value::Int(2)])
            .expect("call"),
        Value::Int(2)
    );

    let again = create_lambda_function(&mut script, "$a, $b", "return $b;", at(9))
        .expect("create")
        .expect("compiled");
    assert_eq!(again, name);
    assert_eq!(compiler.compilations(), 1);
}

#[test]
fn lambda_with_broken_body_yields_none() {
    let (app, _) = common::context();
    let mut script = common::script(&app);

    let created = create_lambda_function(&mut script, "$x", "return $x", at(1)).expect("create");
    assert!(created.is_none());
    assert_eq!(script.diagnostics()[0].level, DiagnosticLevel::ParseError);
}

#[test]
fn passing_assertions_are_silent() {
    let (app, _) = common::context();
    let mut script = common::script(&app);

    assert!(check(&mut script, Value::from("1")).expect("assert"));
    assert!(check(&mut script, Value::Bool(true)).expect("assert"));
    assert!(script.diagnostics().is_empty());
}

#[test]
fn failed_assertion_runs_callback_and_warns() {
    let mut config = RuntimeConfig::default();
    config.compiler.source_root = PathBuf::from("/srv/site");
    let (app, _) = common::context_with(config);
    let mut script = common::script(&app);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    script.set_assertion_callback(Some(Arc::new(move |path: &Path, line: u32, code: &str| {
        sink.lock().push((path.to_path_buf(), line, code.to_string()));
    })));

    assert!(!check(&mut script, Value::from("0")).expect("assert"));
    assert_eq!(
        seen.lock().as_slice(),
        &[(PathBuf::from("/srv/site/lib/checks.php"), 3, "0".to_string())]
    );
    let warning = &script.diagnostics()[0];
    assert_eq!(warning.level, DiagnosticLevel::Warning);
    assert_eq!(warning.message, "Assertion \"0\" failed");
}

#[test]
fn non_string_assertions_are_checked_directly() {
    let (app, compiler) = common::context();
    let mut script = common::script(&app);

    assert!(!check(&mut script, Value::Null).expect("assert"));
    assert_eq!(script.diagnostics()[0].message, "Assertion \"\" failed");
    assert_eq!(compiler.compilations(), 0);
}

#[test]
fn terminating_assertion_kills_the_script() {
    let mut config = RuntimeConfig::default();
    config.assertion.terminate = true;
    config.assertion.report_warning = false;
    let (app, _) = common::context_with(config);
    let mut script = common::script(&app);

    assert_eq!(
        check(&mut script, Value::from("false")).expect_err("terminated"),
        RuntimeError::ScriptDied(0)
    );
    assert!(script.diagnostics().is_empty());
}

#[test]
fn quiet_assertions_hide_parse_errors_only() {
    let mut config = RuntimeConfig::default();
    config.assertion.quiet = true;
    let (app, _) = common::context_with(config);
    let mut script = common::script(&app);

    assert!(!check(&mut script, Value::from("???")).expect("assert"));
    assert!(script.is_error_reporting_enabled());
    let levels: Vec<_> = script.diagnostics().iter().map(|d| d.level).collect();
    assert_eq!(levels, vec![DiagnosticLevel::Warning]);
}

#[test]
fn inactive_assertions_are_skipped() {
    let (app, compiler) = common::context();
    let mut script = common::script(&app);
    script.assertion_mut().active = false;

    assert!(check(&mut script, Value::from("0")).expect("assert"));
    assert!(!pre_assert(&mut script));
    assert_eq!(compiler.compilations(), 0);
}

#[test]
fn compiled_in_assertions_bracket_error_reporting() {
    let (app, _) = common::context();
    let mut script = common::script(&app);
    script.assertion_mut().quiet = true;

    assert!(pre_assert(&mut script));
    assert!(!script.is_error_reporting_enabled());
    post_assert(&mut script);
    assert!(script.is_error_reporting_enabled());

    assert!(!check_assertion(&mut script, &Value::Int(0), "$n > 0", &at(4)).expect("check"));
    assert_eq!(script.diagnostics()[0].message, "Assertion \"$n > 0\" failed");
}
