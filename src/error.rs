//! Error taxonomy shared by the registry, loader, conversion and eval layers.
//!
//! Lookup misses are not errors (they surface as `None`) and conversion
//! failures travel through [`crate::convert::ConversionStrictness`]; only
//! contract violations and load failures reach this enum.

use thiserror::Error;

/// Result type used across the runtime core.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A library could not be physically loaded.
    #[error("unable to load library '{locator}': {message}")]
    Configuration { locator: String, message: String },
    /// The embedding code asked for something the current state cannot provide.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("cannot convert {value_type} to {target}")]
    ConversionOutOfRange { target: String, value_type: String },
    /// Script execution was terminated (`die`/`exit` or a terminating assertion).
    #[error("script died with status {0}")]
    ScriptDied(i32),
    #[error("call to undefined function {0}()")]
    UndefinedFunction(String),
    #[error("call to undefined method {type_name}::{method}()")]
    UndefinedMethod { type_name: String, method: String },
    #[error("class '{0}' not found")]
    UndefinedType(String),
    #[error("cannot instantiate {0}")]
    CannotInstantiate(String),
}

impl RuntimeError {
    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        RuntimeError::InvalidOperation(message.into())
    }
}
