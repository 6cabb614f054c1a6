//! A tiny compiler for a handful of statement shapes, enough to drive the
//! eval layer from tests:
//!
//! * `return <expr>;` where `<expr>` is an integer, `true`/`false`, a
//!   single-quoted string, `$name`, `new Name()` (bound with autoload) or
//!   `Name::class` (bound statically; evaluates to the declared spelling,
//!   or the written one when nothing is declared)
//! * `class Name {}` and `class Name extends Base {}`
//! * `function name($a, $b){return <expr>;}` (no `new` in bodies)

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use php_runtime_core::dynamic::{
    CompileError, CompileRequest, CompiledUnit, Compiler, EvalFrame, TypesProvider,
};
use php_runtime_core::registry::{Declarations, FunctionDesc, TypeDesc, native_callback};
use php_runtime_core::value::{Locals, Value};
use php_runtime_core::{ApplicationContext, RuntimeConfig, RuntimeError, ScriptContext};

#[derive(Default)]
pub struct ScriptedCompiler {
    compilations: AtomicUsize,
}

impl ScriptedCompiler {
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Variable(String),
    New {
        name: String,
        bound: Option<Arc<TypeDesc>>,
    },
    ClassName {
        name: String,
        bound: Option<Arc<TypeDesc>>,
    },
}

impl Expr {
    fn evaluate(&self, frame: &mut EvalFrame<'_>) -> Result<Value, RuntimeError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => Ok(frame.locals.get(name).cloned().unwrap_or(Value::Null)),
            Expr::New { bound: Some(ty), .. } => ty.instantiate().map(Value::Object),
            Expr::New { name, bound: None } => frame.script.instantiate(name).map(Value::Object),
            Expr::ClassName { .. } => Ok(self.evaluate_locals(&*frame.locals)),
        }
    }

    fn evaluate_locals(&self, locals: &Locals) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Variable(name) => locals.get(name).cloned().unwrap_or(Value::Null),
            Expr::New { .. } => Value::Null,
            Expr::ClassName { bound: Some(ty), .. } => Value::from(ty.name().as_str()),
            Expr::ClassName { name, bound: None } => Value::from(name.as_str()),
        }
    }
}

fn parse_literal(text: &str) -> Option<Expr> {
    if let Some(name) = text.strip_prefix('$') {
        return Some(Expr::Variable(name.to_string()));
    }
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Some(Expr::Literal(Value::from(inner)));
    }
    match text {
        "true" => return Some(Expr::Literal(Value::Bool(true))),
        "false" => return Some(Expr::Literal(Value::Bool(false))),
        "null" => return Some(Expr::Literal(Value::Null)),
        _ => {}
    }
    if let Ok(int) = text.parse::<i32>() {
        return Some(Expr::Literal(Value::Int(int)));
    }
    text.parse::<i64>().ok().map(|long| Expr::Literal(Value::Long(long)))
}

fn parse_expression(text: &str, types: &mut TypesProvider<'_>) -> Option<Expr> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("new ") {
        let name = rest.trim().strip_suffix("()")?.trim().to_string();
        let bound = types.find_and_provide_type(&name);
        return Some(Expr::New { name, bound });
    }
    if let Some(name) = text.strip_suffix("::class") {
        let bound = types.provide_type(name);
        return Some(Expr::ClassName { name: name.to_string(), bound });
    }
    parse_literal(text)
}

fn parse_return(text: &str) -> Option<&str> {
    text.trim().strip_prefix("return ")?.trim().strip_suffix(';')
}

impl Compiler for ScriptedCompiler {
    fn compile(
        &self,
        request: &CompileRequest<'_>,
        types: &mut TypesProvider<'_>,
    ) -> Result<CompiledUnit, CompileError> {
        self.compilations.fetch_add(1, Ordering::SeqCst);
        let source = request.source.trim();
        let syntax = |message: &str| CompileError::syntax(message, request.descriptor);

        if let Some(rest) = source.strip_prefix("function ") {
            let (name, rest) = rest.split_once('(').ok_or_else(|| syntax("expected '('"))?;
            let (params, rest) = rest.split_once("){").ok_or_else(|| syntax("expected '{'"))?;
            let body = rest.strip_suffix('}').ok_or_else(|| syntax("expected '}'"))?;
            let expr = parse_return(body)
                .and_then(parse_literal)
                .ok_or_else(|| syntax("unsupported function body"))?;
            let params: Vec<String> = params
                .split(',')
                .map(|p| p.trim().trim_start_matches('$').to_string())
                .filter(|p| !p.is_empty())
                .collect();
            let function = FunctionDesc::new(
                name.trim(),
                native_callback(move |_, args| {
                    let locals: Locals = params
                        .iter()
                        .cloned()
                        .zip(args.iter().cloned())
                        .collect();
                    Ok(expr.evaluate_locals(&locals))
                }),
            );
            let declarations = Declarations {
                functions: vec![function],
                ..Declarations::default()
            };
            return Ok(CompiledUnit::declarations_only(declarations));
        }

        if let Some(rest) = source.strip_prefix("class ") {
            let header = rest.strip_suffix("{}").ok_or_else(|| syntax("expected '{}'"))?;
            let mut words = header.split_whitespace();
            let name = words.next().ok_or_else(|| syntax("expected class name"))?;
            let mut builder = TypeDesc::builder(name);
            if words.next() == Some("extends") {
                let base_name = words.next().ok_or_else(|| syntax("expected base class"))?;
                let base = types
                    .find_and_provide_type(base_name)
                    .ok_or_else(|| syntax("unknown base class"))?;
                builder = builder.base(base);
            }
            let declarations = Declarations {
                types: vec![builder.build()],
                ..Declarations::default()
            };
            return Ok(CompiledUnit::declarations_only(declarations));
        }

        let expr = parse_return(source)
            .and_then(|text| parse_expression(text, types))
            .ok_or_else(|| syntax("unexpected token"))?;
        Ok(CompiledUnit::new(Declarations::default(), move |frame| {
            expr.evaluate(frame)
        }))
    }
}

/// An application context backed by a fresh [`ScriptedCompiler`].
pub fn context_with(config: RuntimeConfig) -> (Arc<ApplicationContext>, Arc<ScriptedCompiler>) {
    let compiler = Arc::new(ScriptedCompiler::default());
    let context = ApplicationContext::builder()
        .config(config)
        .compiler(compiler.clone())
        .build();
    (Arc::new(context), compiler)
}

pub fn context() -> (Arc<ApplicationContext>, Arc<ScriptedCompiler>) {
    context_with(RuntimeConfig::default())
}

pub fn script(app: &Arc<ApplicationContext>) -> ScriptContext {
    ScriptContext::new(Arc::clone(app))
}
