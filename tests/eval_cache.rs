mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use php_runtime_core::dynamic::{EvalScope, SourceCodeDescriptor, eval};
use php_runtime_core::registry::TypeDesc;
use php_runtime_core::script::DiagnosticLevel;
use php_runtime_core::value::{Locals, Value};
use php_runtime_core::{RuntimeError, ScriptContext};

fn here() -> SourceCodeDescriptor {
    SourceCodeDescriptor::new("index.php", 10, 5)
}

fn run(script: &mut ScriptContext, code: &str) -> Result<Value, RuntimeError> {
    let mut locals = Locals::new();
    eval(script, code, false, EvalScope::new(&mut locals), here())
}

fn class_of(value: &Value) -> Arc<TypeDesc> {
    match value {
        Value::Object(object) => Arc::clone(object.class()),
        other => panic!("expected an object, got {other:?}"),
    }
}

#[test]
fn identical_code_in_an_unchanged_context_compiles_once() {
    let (app, compiler) = common::context();
    let mut script = common::script(&app);

    assert_eq!(run(&mut script, "return 42;").expect("eval"), Value::Int(42));
    assert_eq!(run(&mut script, "return 42;").expect("eval"), Value::Int(42));
    assert_eq!(compiler.compilations(), 1);

    let store = app.transient_store().expect("store");
    assert_eq!(store.compilation_count(), 1);
    assert_eq!(store.hit_count(), 1);
}

#[test]
fn cached_code_is_not_reused_where_a_dependency_means_another_type() {
    let (app, compiler) = common::context();
    let mut first = common::script(&app);
    let mut second = common::script(&app);
    let foo_a = TypeDesc::builder("Foo").build();
    let foo_b = TypeDesc::builder("Foo").build();
    first.declare_type(foo_a.clone());
    second.declare_type(foo_b.clone());

    let a = run(&mut first, "return new Foo();").expect("eval in first");
    assert!(Arc::ptr_eq(&class_of(&a), &foo_a));

    let b = run(&mut second, "return new Foo();").expect("eval in second");
    assert!(Arc::ptr_eq(&class_of(&b), &foo_b));
    assert_eq!(compiler.compilations(), 2);

    let again = run(&mut second, "return new Foo();").expect("reuse in second");
    assert!(Arc::ptr_eq(&class_of(&again), &foo_b));
    assert_eq!(compiler.compilations(), 2);
}

#[test]
fn phantom_dependency_holds_until_the_type_appears() {
    let (app, compiler) = common::context();
    let mut script = common::script(&app);

    assert_eq!(run(&mut script, "return Ghost::class;").expect("unbound"), Value::from("Ghost"));
    run(&mut script, "return Ghost::class;").expect("still unbound");
    assert_eq!(compiler.compilations(), 1);

    script.declare_type(TypeDesc::builder("GHOST").build());
    assert_eq!(run(&mut script, "return Ghost::class;").expect("bound"), Value::from("GHOST"));
    assert_eq!(compiler.compilations(), 2);
}

#[test]
fn unresolved_new_binds_late() {
    let (app, compiler) = common::context();
    let mut script = common::script(&app);

    let err = run(&mut script, "return new Ghost();").expect_err("undefined");
    assert_eq!(err, RuntimeError::UndefinedType("Ghost".into()));

    let ghost = TypeDesc::builder("Ghost").build();
    script.declare_type(ghost.clone());
    let object = run(&mut script, "return new Ghost();").expect("now defined");
    assert!(Arc::ptr_eq(&class_of(&object), &ghost));
    assert_eq!(compiler.compilations(), 1);
}

#[test]
fn registry_types_are_not_tracked() {
    let (app, compiler) = common::context();
    let mut first = common::script(&app);
    let mut second = common::script(&app);

    run(&mut first, "return new stdClass();").expect("first");
    run(&mut second, "return new stdClass();").expect("second");
    assert_eq!(compiler.compilations(), 1);
}

#[test]
fn autoloaded_types_bind_and_are_revalidated() {
    let (app, compiler) = common::context();
    let mut script = common::script(&app);
    let lazy = TypeDesc::builder("Lazy").build();
    let declared = lazy.clone();
    script.set_autoload(Arc::new(move |script: &mut ScriptContext, name: &str| {
        if name == "Lazy" {
            script.declare_type(declared.clone());
        }
    }));

    let object = run(&mut script, "return new Lazy();").expect("autoloaded");
    assert!(Arc::ptr_eq(&class_of(&object), &lazy));
    run(&mut script, "return new Lazy();").expect("reused");
    assert_eq!(compiler.compilations(), 1);
}

#[test]
fn declarations_made_by_eval_land_in_the_script() {
    let (app, _) = common::context();
    let mut script = common::script(&app);

    assert_eq!(run(&mut script, "class Widget {}").expect("declare"), Value::Null);
    assert!(script.is_type_declared("widget"));
    assert!(app.registry().lookup_type("Widget").is_none());

    let widget = run(&mut script, "return new Widget();").expect("instantiate");
    assert_eq!(class_of(&widget).name().as_str(), "Widget");
}

#[test]
fn eval_reads_the_callers_locals() {
    let (app, _) = common::context();
    let mut script = common::script(&app);
    let mut locals = Locals::new();
    locals.insert("count".into(), Value::Int(3));

    let value = eval(&mut script, "return $count;", false, EvalScope::new(&mut locals), here())
        .expect("eval");
    assert_eq!(value, Value::Int(3));
}

#[test]
fn parse_errors_evaluate_to_false() {
    let (app, compiler) = common::context();
    let mut script = common::script(&app);

    assert_eq!(run(&mut script, "return ;;").expect("eval"), Value::Bool(false));
    assert_eq!(compiler.compilations(), 1);
    assert_eq!(app.transient_store().expect("store").cached_count(), 0);
    let diagnostics = script.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].level, DiagnosticLevel::ParseError);
    assert!(diagnostics[0].message.contains("index.php(10,5)"));
}

#[test]
fn eval_without_a_store_is_an_invalid_operation() {
    let app = Arc::new(
        php_runtime_core::ApplicationContext::builder()
            .with_transient_store(false)
            .build(),
    );
    let mut script = ScriptContext::new(app);
    assert!(matches!(
        run(&mut script, "return 1;"),
        Err(RuntimeError::InvalidOperation(_))
    ));
}

#[test]
fn concurrent_evals_of_one_fragment_compile_once() {
    let (app, compiler) = common::context();
    let barrier = Arc::new(Barrier::new(8));

    let results: Vec<Value> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let app = Arc::clone(&app);
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    let mut script = ScriptContext::new(app);
                    barrier.wait();
                    run(&mut script, "return 7;").expect("eval")
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("join")).collect()
    });

    assert!(results.iter().all(|value| *value == Value::Int(7)));
    assert_eq!(compiler.compilations(), 1);
    let store = app.transient_store().expect("store");
    assert_eq!(store.module_count(), 1);
    assert_eq!(store.hit_count(), 7);
}
