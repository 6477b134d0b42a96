use std::sync::Arc;

use cvtdemo::adapters::{TransportConfig, ValidatingClient};
use cvtdemo::calculator::Operation;
use cvtdemo::contract::{ContractValidator, Result as ContractResult};
use cvtdemo::service::RemoteValidator;
use serde_json::Value;

use crate::cmd::CalcArgs;
use crate::exit::{adapter_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{format_number, print_calculation, Calculation, OutputFormat};
use crate::settings::ConsumerSettings;

pub async fn run(
    operation: Operation,
    args: CalcArgs,
    settings: &ConsumerSettings,
    format: Option<OutputFormat>,
) -> CliResult<i32> {
    let (Some(x), Some(y)) = (parse_operand(&args.x), parse_operand(&args.y)) else {
        return Err(CliError::failure("Both arguments must be valid numbers"));
    };
    let path = format!(
        "{}?x={}&y={}",
        operation.path(),
        format_number(x),
        format_number(y)
    );

    let mut client = ValidatingClient::new(
        &settings.producer_url,
        TransportConfig::new(settings.schema_id.clone()),
    )
    .map_err(adapter_error)?;
    if args.validate {
        match enable_validation(settings).await {
            Ok((validator, version)) => {
                client = client.with_validator(validator);
                client.pin_schema_version(version);
            }
            Err(err) => continue_without_validation(&err.to_string()),
        }
    }

    let response = client.get(&path).await.map_err(adapter_error)?;
    if !response.is_success() {
        let message = response
            .json::<Value>()
            .ok()
            .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", response.status));
        return Err(CliError::failure(message));
    }

    if client.is_validating() {
        match &response.validation {
            Some(result) if result.valid => eprintln!("CVT validation passed"),
            Some(result) => {
                eprintln!("CVT validation failed: {}", result.joined_errors());
                return Ok(FAILURE);
            }
            None => continue_without_validation("validator did not return a result"),
        }
    }

    let result = response
        .json::<Value>()
        .ok()
        .and_then(|body| body.get("result").and_then(Value::as_f64))
        .ok_or_else(|| {
            CliError::failure(format!("Unexpected response format: {}", response.text()))
        })?;

    print_calculation(
        &Calculation {
            operation,
            x,
            y,
            result,
        },
        format,
    );
    Ok(SUCCESS)
}

/// A finite number, or `None`.
pub fn parse_operand(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Register the consumer's schema and return the version to validate against.
async fn enable_validation(
    settings: &ConsumerSettings,
) -> ContractResult<(Arc<dyn ContractValidator>, String)> {
    let validator = RemoteValidator::connect(&settings.cvt_server_addr)?;
    let info = validator
        .register_schema(&settings.schema_id, &settings.schema_path)
        .await?;
    tracing::debug!(
        schema_id = %info.schema_id,
        version = %info.version,
        "schema registered for validation"
    );
    Ok((Arc::new(validator), info.version))
}

fn continue_without_validation(reason: &str) {
    eprintln!("Warning: Failed to enable CVT validation: {reason}");
    eprintln!("Continuing without validation...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operands_must_be_finite_numbers() {
        assert_eq!(parse_operand("5"), Some(5.0));
        assert_eq!(parse_operand("-2.5"), Some(-2.5));
        assert_eq!(parse_operand("1e3"), Some(1000.0));
        assert_eq!(parse_operand("abc"), None);
        assert_eq!(parse_operand(""), None);
        assert_eq!(parse_operand("inf"), None);
        assert_eq!(parse_operand("NaN"), None);
    }
}
