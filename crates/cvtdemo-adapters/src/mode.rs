use std::fmt;
use std::str::FromStr;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use cvtdemo_contract::ValidationResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What the provider does with an exchange that breaks the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Replace the response with a 400 rejection.
    #[default]
    Strict,
    /// Pass the response through and log a warning.
    Warn,
    /// Pass the response through and log at debug level only.
    Shadow,
}

impl ValidationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Warn => "warn",
            Self::Shadow => "shadow",
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown validation mode '{0}' (expected strict, warn or shadow)")]
pub struct ParseModeError(String);

impl FromStr for ValidationMode {
    type Err = ParseModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "warn" => Ok(Self::Warn),
            "shadow" => Ok(Self::Shadow),
            _ => Err(ParseModeError(value.to_string())),
        }
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BufferedResponse {
    pub fn json(status: StatusCode, value: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(value.to_string()),
        }
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Decide the response the caller sees.
///
/// Only strict mode with a failed result changes anything; logging is left
/// to the caller.
pub fn apply_mode(
    mode: ValidationMode,
    original: BufferedResponse,
    result: Option<&ValidationResult>,
) -> BufferedResponse {
    match (mode, result) {
        (ValidationMode::Strict, Some(result)) if !result.valid => rejection(result),
        _ => original,
    }
}

/// The 400 response strict mode sends in place of a contract violation.
pub fn rejection(result: &ValidationResult) -> BufferedResponse {
    BufferedResponse::json(
        StatusCode::BAD_REQUEST,
        &json!({
            "error": format!("contract validation failed: {}", result.joined_errors()),
            "details": result.errors,
        }),
    )
}
