//! Arithmetic operation selectors.

use core::fmt;

/// Arithmetic operations a value can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum Operation {
    /// `a + b`
    Addition = 0,
    /// `a - b`
    Subtraction = 1,
    /// `a * b`
    Multiplication = 2,
    /// `a / b`
    Division = 3,
    /// `a % b`
    Modulus = 4,
    /// `-a`
    Negation = 5,
    /// `|a|`
    AbsoluteValue = 6,
}

impl Operation {
    /// True for single-operand operations.
    pub const fn is_monadic(&self) -> bool {
        matches!(self, Self::Negation | Self::AbsoluteValue)
    }

    /// Recovers an operation from its serialized discriminant.
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Addition,
            1 => Self::Subtraction,
            2 => Self::Multiplication,
            3 => Self::Division,
            4 => Self::Modulus,
            5 => Self::Negation,
            6 => Self::AbsoluteValue,
            _ => return None,
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Addition => "+",
            Self::Subtraction | Self::Negation => "-",
            Self::Multiplication => "*",
            Self::Division => "/",
            Self::Modulus => "MOD",
            Self::AbsoluteValue => "ABS",
        };
        f.write_str(symbol)
    }
}
