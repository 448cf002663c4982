//! Lane execution and argument binding errors

use super::types::Val;

/// Error raised while a lane executes
///
/// Every variant can be caught by a `try`/`catch` inside the kernel; the
/// catch binding receives [`RuntimeError::to_value`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("name '{name}' is not defined")]
    UndefinedVariable { name: String },

    #[error("unsupported operand types for {op}: {left} and {right}")]
    OperandTypes {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("{message}")]
    Type { message: String },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("assertion failed: {message}")]
    AssertionFailed { message: String },

    #[error("uncaught exception: {value}")]
    Thrown { value: Val },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("{name}() takes {expected} argument(s), got {got}")]
    Arity {
        name: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("{construct} cannot be executed")]
    Unsupported { construct: &'static str },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type {
            message: message.into(),
        }
    }

    /// The value a catch clause binds for this error
    pub fn to_value(&self) -> Val {
        match self {
            RuntimeError::Thrown { value } => value.clone(),
            other => Val::Str(other.to_string()),
        }
    }
}

/// Error binding call arguments to kernel parameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    #[error("takes {expected} positional argument(s) but {got} were given")]
    TooManyPositional { expected: usize, got: usize },

    #[error("got an unexpected keyword argument '{name}'")]
    UnknownKeyword { name: String },

    #[error("got multiple values for argument '{name}'")]
    MultipleValues { name: String },

    #[error("missing required argument '{name}'")]
    Missing { name: String },

    #[error("default value of '{name}' failed: {source}")]
    Default {
        name: String,
        #[source]
        source: RuntimeError,
    },
}
