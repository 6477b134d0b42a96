use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CalculatorError, Result};

/// One of the four arithmetic operations the calculator serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        }
    }

    /// Route serving this operation.
    pub fn path(self) -> &'static str {
        match self {
            Self::Add => "/add",
            Self::Subtract => "/subtract",
            Self::Multiply => "/multiply",
            Self::Divide => "/divide",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }

    /// Compute `x <op> y`, refusing division by zero and non-finite results.
    pub fn apply(self, x: f64, y: f64) -> Result<f64> {
        let value = match self {
            Self::Add => x + y,
            Self::Subtract => x - y,
            Self::Multiply => x * y,
            Self::Divide if y == 0.0 => return Err(CalculatorError::DivisionByZero),
            Self::Divide => x / y,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(CalculatorError::NonFinite)
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown operation '{value}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        assert_eq!(Operation::Add.apply(5.0, 3.0), Ok(8.0));
        assert_eq!(Operation::Subtract.apply(5.0, 3.0), Ok(2.0));
        assert_eq!(Operation::Multiply.apply(2.5, 4.0), Ok(10.0));
        assert_eq!(Operation::Divide.apply(10.0, 4.0), Ok(2.5));
    }

    #[test]
    fn refuses_zero_divisor_and_overflow() {
        assert_eq!(
            Operation::Divide.apply(1.0, 0.0),
            Err(CalculatorError::DivisionByZero)
        );
        assert_eq!(
            Operation::Divide.apply(1.0, -0.0),
            Err(CalculatorError::DivisionByZero)
        );
        assert_eq!(
            Operation::Multiply.apply(f64::MAX, 2.0),
            Err(CalculatorError::NonFinite)
        );
    }

    #[test]
    fn names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>(), Ok(op));
            assert_eq!(op.path(), format!("/{op}"));
        }
        assert!("modulo".parse::<Operation>().is_err());
        assert_eq!(Operation::Subtract.symbol(), "-");
    }
}
