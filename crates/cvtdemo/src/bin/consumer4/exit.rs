use std::fmt;

use cvtdemo::adapters::AdapterError;
use cvtdemo::contract::ContractError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(FAILURE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Exit code for a validator failure on the management subcommands.
pub fn contract_error(context: &str, err: ContractError) -> CliError {
    let code = match &err {
        ContractError::Transport(_) => TRANSPORT_ERROR,
        ContractError::SchemaNotFound { .. } | ContractError::VersionConflict { .. } => FAILURE,
        ContractError::Remote { status, .. } if *status >= 500 => INTERNAL,
        ContractError::Remote { .. } => FAILURE,
        ContractError::Internal(_) => INTERNAL,
        _ => DATA_INVALID,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// Calculation failures all exit 1; the message is the underlying error.
pub fn adapter_error(err: AdapterError) -> CliError {
    CliError::failure(err.to_string())
}
