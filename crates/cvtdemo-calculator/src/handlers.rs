use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{CalculatorError, Result};
use crate::operation::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub result: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl IntoResponse for CalculatorError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

type Params = Query<Vec<(String, String)>>;

pub async fn add(Query(params): Params) -> Response {
    calculate(Operation::Add, &params)
}

pub async fn subtract(Query(params): Params) -> Response {
    calculate(Operation::Subtract, &params)
}

pub async fn multiply(Query(params): Params) -> Response {
    calculate(Operation::Multiply, &params)
}

pub async fn divide(Query(params): Params) -> Response {
    calculate(Operation::Divide, &params)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "method not allowed" })),
    )
        .into_response()
}

fn calculate(operation: Operation, params: &[(String, String)]) -> Response {
    let outcome = operands(params).and_then(|(x, y)| operation.apply(x, y));
    match outcome {
        Ok(result) => Json(CalculationResult { result }).into_response(),
        Err(err) => {
            tracing::debug!(operation = %operation, error = %err, "calculation refused");
            err.into_response()
        }
    }
}

/// Parse `x` and `y`; the first occurrence of each wins.
pub fn operands(params: &[(String, String)]) -> Result<(f64, f64)> {
    let first = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    };
    let (Some(x), Some(y)) = (first("x"), first("y")) else {
        return Err(CalculatorError::MissingParameters);
    };
    Ok((number("x", x)?, number("y", y)?))
}

fn number(name: &'static str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or(CalculatorError::InvalidNumber(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_operands() {
        assert_eq!(operands(&params(&[("x", "5"), ("y", "-3.5")])), Ok((5.0, -3.5)));
        assert_eq!(
            operands(&params(&[("x", "1"), ("x", "9"), ("y", "2")])),
            Ok((1.0, 2.0))
        );
    }

    #[test]
    fn reports_missing_and_invalid_operands() {
        assert_eq!(
            operands(&params(&[("x", "5")])),
            Err(CalculatorError::MissingParameters)
        );
        assert_eq!(
            operands(&params(&[("x", ""), ("y", "3")])),
            Err(CalculatorError::MissingParameters)
        );
        assert_eq!(
            operands(&params(&[("x", "five"), ("y", "3")])),
            Err(CalculatorError::InvalidNumber("x"))
        );
        assert_eq!(
            operands(&params(&[("x", "5"), ("y", "NaN")])),
            Err(CalculatorError::InvalidNumber("y"))
        );
        assert_eq!(
            operands(&params(&[("x", "inf"), ("y", "1")])),
            Err(CalculatorError::InvalidNumber("x"))
        );
    }
}
