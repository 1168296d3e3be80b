use cascade_diagnostics::{error_codes, Diagnostic, Span};
use thiserror::Error;

/// Interpreter-level failure. Errors abort the current tick; the host
/// binding logs them and flips the instance into its error state.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unknown variable: \"{0}\"")]
    UnknownVariable(String),
    #[error("type \"{0}\" is not defined in the rule-set meta info")]
    UnknownType(String),
    #[error("value shape mismatch: {0}")]
    ValueShape(String),
    #[error("array index {index} out of range, length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("function \"{0}\" not found")]
    UnknownFunction(String),
    #[error("call depth limit exceeded")]
    CallDepthExceeded,
    #[error("no value returned where one is required")]
    MissingValue,
    #[error("{0}")]
    Unsupported(String),
}

impl RuntimeError {
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::UnknownVariable(_) => error_codes::MISSING_INPUT,
            RuntimeError::UnknownType(_)
            | RuntimeError::ValueShape(_)
            | RuntimeError::IndexOutOfRange { .. }
            | RuntimeError::MissingValue => error_codes::VALUE_SHAPE_MISMATCH,
            RuntimeError::CallDepthExceeded => error_codes::CALL_DEPTH_EXCEEDED,
            RuntimeError::UnknownFunction(_) | RuntimeError::Unsupported(_) => {
                error_codes::UNSUPPORTED_OPERATION
            }
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string(), Span::unknown())
    }
}
