/// Why a calculation was refused. Every variant is a client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CalculatorError {
    #[error("missing required parameters 'x' and 'y'")]
    MissingParameters,

    /// Names the offending parameter.
    #[error("parameter '{0}' must be a valid number")]
    InvalidNumber(&'static str),

    #[error("division by zero is not allowed")]
    DivisionByZero,

    /// JSON cannot carry infinities or NaN.
    #[error("result is not a finite number")]
    NonFinite,
}

pub type Result<T> = std::result::Result<T, CalculatorError>;
