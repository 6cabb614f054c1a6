use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Origin of a dynamically compiled fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EvalKind {
    #[default]
    Unknown,
    /// `eval()` in user code.
    ExplicitEval,
    /// Code the compiler itself routes through eval.
    SyntheticEval,
    /// `create_function()`.
    LambdaFunction,
    Assert,
    DynamicInclude,
}

/// Where a fragment came from. `container_id` is the eval id of the
/// transient module whose code issued the eval, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SourceCodeDescriptor {
    pub path: PathBuf,
    pub container_id: Option<usize>,
    pub line: u32,
    pub column: u32,
}

impl SourceCodeDescriptor {
    pub fn new(path: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            path: path.into(),
            container_id: None,
            line,
            column,
        }
    }

    pub fn within(mut self, container_id: usize) -> Self {
        self.container_id = Some(container_id);
        self
    }
}

impl fmt::Display for SourceCodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.path.display(), self.line, self.column)?;
        if let Some(id) = self.container_id {
            write!(f, " : eval()'d code #{id}")?;
        }
        Ok(())
    }
}

/// Cache key of a compiled fragment: the full source text, the kind of
/// eval and where it was issued from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvalKey {
    pub code: Arc<str>,
    pub kind: EvalKind,
    pub descriptor: SourceCodeDescriptor,
}

impl EvalKey {
    pub fn new(
        code: impl Into<Arc<str>>,
        kind: EvalKind,
        descriptor: SourceCodeDescriptor,
    ) -> Self {
        Self {
            code: code.into(),
            kind,
            descriptor,
        }
    }
}
