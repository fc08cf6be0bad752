//! smoothr error types

use numr::dtype::DType;

/// smoothr result type
pub type Result<T> = std::result::Result<T, Error>;

/// smoothr errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from numr operations
    #[error("numr error: {0}")]
    Numr(#[from] numr::error::Error),

    /// Invalid argument to an operation
    #[error("invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// Argument name
        arg: &'static str,
        /// Why it's invalid
        reason: String,
    },

    /// Input dtype not supported by the operation
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch {
        /// Expected dtype
        expected: DType,
        /// Actual dtype
        got: DType,
    },

    /// Target kind does not match what the criterion consumes
    #[error("criterion {criterion} expects {expected} targets, got {got}")]
    TargetMismatch {
        /// Display name of the criterion
        criterion: String,
        /// Expected target kind
        expected: &'static str,
        /// Target kind that was passed
        got: &'static str,
    },

    /// Criterion configuration could not be parsed
    #[error("config error: {reason}")]
    Config {
        /// Description of what went wrong
        reason: String,
    },
}
