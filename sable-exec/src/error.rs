//! Runtime error variants.

use sable_types::ValueError;
use thiserror::Error;

/// Failure raised while executing a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The operation or type combination is not implemented in this path.
    #[error("operation not supported")]
    NotSupported,
    /// Operand types cannot be reconciled even with coercion.
    #[error("operand types are not compatible")]
    NotCompatible,
    /// The caller violated an operation's contract.
    #[error("bad argument")]
    BadArgument,
    /// An internal invariant failed.
    #[error("unexpected internal state")]
    Unexpected,
    /// Arithmetic overflow surfaced as an error.
    #[error("numeric value out of range")]
    NumericValueOutOfRange,
    /// Negative length passed to SUBSTRING or OVERLAY.
    #[error("invalid substring argument")]
    SubStringError,
    /// Array element reference out of range.
    #[error("array element out of range")]
    BadArrayElement,
    /// CARDINALITY applied to a non-array value.
    #[error("cardinality of a non-array value")]
    InvalidCardinality,
    /// A value's dynamic type does not match the declared slot type.
    #[error("value type does not match the declared type")]
    TypeMismatch,
    /// A handle was used before it was set up.
    #[error("not initialized")]
    NotInitialized,
    /// Cooperative cancellation reached this task.
    #[error("cancelled")]
    Cancelled,
    /// The downstream connection closed mid-send.
    #[error("connection ran out")]
    ConnectionRanOut,
    /// The invoked stored function does not exist.
    #[error("stored function not found")]
    StoredFunctionNotFound,
}

impl From<ValueError> for ExecError {
    fn from(e: ValueError) -> ExecError {
        match e {
            ValueError::NotSupported => ExecError::NotSupported,
            ValueError::NotCompatible => ExecError::NotCompatible,
            ValueError::BadArgument => ExecError::BadArgument,
            ValueError::NumericValueOutOfRange => ExecError::NumericValueOutOfRange,
            ValueError::TypeMismatch => ExecError::TypeMismatch,
        }
    }
}
