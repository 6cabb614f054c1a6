//! Seam between the eval layer and code generation.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::provider::TypesProvider;
use super::source::{EvalKind, SourceCodeDescriptor};
use crate::error::RuntimeResult;
use crate::registry::{Declarations, TypeDesc};
use crate::script::ScriptContext;
use crate::value::{Locals, ObjectRef, Value};

/// What a compiled fragment sees when it runs.
pub struct EvalFrame<'a> {
    pub script: &'a mut ScriptContext,
    pub locals: &'a mut Locals,
    pub this: Option<ObjectRef>,
    pub class_context: Option<Arc<TypeDesc>>,
    /// Eval id of the running transient module; nested evals use it as
    /// their container.
    pub eval_id: usize,
}

pub type EntryPoint = Arc<dyn Fn(&mut EvalFrame<'_>) -> RuntimeResult<Value> + Send + Sync>;

/// Output of a successful compilation.
#[derive(Clone)]
pub struct CompiledUnit {
    /// Top-level types, functions and constants the fragment declares.
    pub declarations: Declarations,
    pub entry: EntryPoint,
}

impl CompiledUnit {
    pub fn new<F>(declarations: Declarations, entry: F) -> Self
    where
        F: Fn(&mut EvalFrame<'_>) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Self {
            declarations,
            entry: Arc::new(entry),
        }
    }

    /// A unit that only declares; running it yields `NULL`.
    pub fn declarations_only(declarations: Declarations) -> Self {
        Self::new(declarations, |_| Ok(Value::Null))
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("declarations", &self.declarations)
            .finish_non_exhaustive()
    }
}

pub struct CompileRequest<'a> {
    pub source: &'a str,
    pub kind: EvalKind,
    pub descriptor: &'a SourceCodeDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error, {message} in {location}")]
    Syntax { message: String, location: String },
    #[error("no compiler is configured for dynamic code")]
    Unavailable,
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, descriptor: &SourceCodeDescriptor) -> Self {
        CompileError::Syntax {
            message: message.into(),
            location: descriptor.to_string(),
        }
    }
}

/// Turns source fragments into runnable units. Type names that the
/// fragment binds against are resolved through `types`, which records
/// them for revalidation on reuse.
pub trait Compiler: Send + Sync {
    fn compile(
        &self,
        request: &CompileRequest<'_>,
        types: &mut TypesProvider<'_>,
    ) -> Result<CompiledUnit, CompileError>;
}

/// Used when the embedder supplied no compiler.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCompiler;

impl Compiler for UnavailableCompiler {
    fn compile(
        &self,
        _request: &CompileRequest<'_>,
        _types: &mut TypesProvider<'_>,
    ) -> Result<CompiledUnit, CompileError> {
        Err(CompileError::Unavailable)
    }
}
