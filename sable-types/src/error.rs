//! Error variants raised by value operations.

use thiserror::Error;

/// Failure of a value-level operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The operation is not implemented for this combination of types.
    #[error("operation not supported for these value types")]
    NotSupported,
    /// The operand types cannot be reconciled even with implicit conversion.
    #[error("operand types are not compatible")]
    NotCompatible,
    /// The caller violated the operation's contract.
    #[error("bad argument")]
    BadArgument,
    /// Arithmetic produced a value outside the destination's range.
    #[error("numeric value out of range")]
    NumericValueOutOfRange,
    /// A value's dynamic type does not match the declared slot type.
    #[error("value type does not match the declared type")]
    TypeMismatch,
}
