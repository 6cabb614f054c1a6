//! Dynamically compiled code: the transient compilation store and the
//! `eval`, `create_function` and `assert` entry points built on it.

mod compiler;
mod eval;
mod provider;
mod source;
mod store;

pub use compiler::{
    CompileError, CompileRequest, CompiledUnit, Compiler, EntryPoint, EvalFrame,
    UnavailableCompiler,
};
pub use eval::{
    EvalOutcome, EvalScope, LAMBDA_FUNCTION_NAME, assert, check_assertion, create_lambda_function,
    eval, eval_internal, generate_lambda_name, next_lambda_name, post_assert, pre_assert,
};
pub use provider::{TypeDependency, TypesProvider};
pub use source::{EvalKey, EvalKind, SourceCodeDescriptor};
pub use store::{TransientCompilationStore, TransientModule};
