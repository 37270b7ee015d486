//! Normalizer errors.

use thiserror::Error;

/// Failure of a normalization operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NormError {
    /// Conflicting delimiters, an invalid output mode, or an out-of-range
    /// index.
    #[error("bad argument")]
    BadArgument,
    /// The handle was used before it was populated.
    #[error("not initialized")]
    NotInitialized,
    /// An internal table is corrupt.
    #[error("unexpected internal state")]
    Unexpected,
}
