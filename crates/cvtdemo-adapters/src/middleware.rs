use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use cvtdemo_contract::{
    body_from_bytes, ContractValidator, Interaction, ValidationRequest, ValidationResponse,
    ValidationResult, ValidationScope,
};
use serde_json::json;

use crate::capture::InteractionLog;
use crate::mode::{apply_mode, rejection, BufferedResponse, ValidationMode};

/// Default cap on buffered request and response bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// A path excluded from validation: exact, or a prefix when it ends in `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFilter {
    Exact(String),
    Prefix(String),
}

impl PathFilter {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

/// Provider-side validation settings for [`with_validation`].
#[derive(Clone)]
pub struct MiddlewareConfig {
    pub schema_id: String,
    /// The version this producer serves; the latest registered when `None`.
    pub schema_version: Option<String>,
    pub validator: Arc<dyn ContractValidator>,
    pub mode: ValidationMode,
    pub validate_request: bool,
    pub validate_response: bool,
    pub exclude: Vec<PathFilter>,
    pub max_body_bytes: usize,
    /// Every validated exchange is appended here.
    pub log: InteractionLog,
}

impl MiddlewareConfig {
    pub fn new(schema_id: impl Into<String>, validator: Arc<dyn ContractValidator>) -> Self {
        Self {
            schema_id: schema_id.into(),
            schema_version: None,
            validator,
            mode: ValidationMode::default(),
            validate_request: true,
            validate_response: true,
            exclude: Vec::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log: InteractionLog::new(),
        }
    }

    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn exclude_path(mut self, pattern: &str) -> Self {
        self.exclude.push(PathFilter::parse(pattern));
        self
    }

    pub fn with_log(mut self, log: InteractionLog) -> Self {
        self.log = log;
        self
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|filter| filter.matches(path))
    }
}

/// Wrap every route of `router` with contract validation.
pub fn with_validation(router: Router, config: MiddlewareConfig) -> Router {
    router.layer(from_fn_with_state(Arc::new(config), validate_exchange))
}

async fn validate_exchange(
    State(config): State<Arc<MiddlewareConfig>>,
    request: Request,
    next: Next,
) -> Response {
    if config.is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "request body could not be buffered for validation");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "request body too large" })),
            )
                .into_response();
        }
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or_else(|| parts.uri.path());
    let mut recorded = ValidationRequest::new(parts.method.as_str(), path_and_query);
    recorded.headers = header_map(&parts.headers);
    recorded.body = body_from_bytes(&bytes);

    let mut result: Option<ValidationResult> = None;
    if config.validate_request {
        result = check(&config, &recorded, None).await;
        let failed = result.as_ref().filter(|result| !result.valid);
        if let (ValidationMode::Strict, Some(failed)) = (config.mode, failed) {
            let rejected = rejection(failed);
            report(&config, &recorded, rejected.status.as_u16(), failed);
            config.log.push(Interaction {
                request: recorded,
                response: to_validation_response(&rejected),
                validation_result: Some(failed.clone()),
            });
            return rejected.into_response();
        }
    }

    let response = next
        .run(Request::from_parts(parts, Body::from(bytes)))
        .await;
    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "response body could not be buffered for validation");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "response body could not be buffered" })),
            )
                .into_response();
        }
    };
    let original = BufferedResponse {
        status: parts.status,
        headers: parts.headers,
        body: bytes,
    };
    let observed = to_validation_response(&original);

    if config.validate_response {
        if let Some(checked) = check(&config, &recorded, Some(&observed)).await {
            result = Some(match result {
                Some(earlier) => earlier.merge(checked),
                None => checked,
            });
        }
    }

    if let Some(failed) = result.as_ref().filter(|result| !result.valid) {
        report(&config, &recorded, observed.status_code, failed);
    }
    let effective = apply_mode(config.mode, original, result.as_ref());
    config.log.push(Interaction {
        request: recorded,
        response: observed,
        validation_result: result,
    });
    effective.into_response()
}

async fn check(
    config: &MiddlewareConfig,
    request: &ValidationRequest,
    response: Option<&ValidationResponse>,
) -> Option<ValidationResult> {
    let scope = if response.is_some() {
        ValidationScope::Response
    } else {
        ValidationScope::Request
    };
    let outcome = config
        .validator
        .validate_scoped(
            &config.schema_id,
            config.schema_version.as_deref(),
            scope,
            request,
            response,
        )
        .await;
    match outcome {
        Ok(result) => Some(result),
        Err(err) => {
            tracing::warn!(
                schema_id = %config.schema_id,
                method = %request.method,
                path = %request.path,
                error = %err,
                "contract validation unavailable, passing through"
            );
            None
        }
    }
}

fn report(
    config: &MiddlewareConfig,
    request: &ValidationRequest,
    status: u16,
    result: &ValidationResult,
) {
    match config.mode {
        ValidationMode::Strict | ValidationMode::Warn => tracing::warn!(
            schema_id = %config.schema_id,
            mode = %config.mode,
            method = %request.method,
            path = %request.path,
            status,
            errors = %result.joined_errors(),
            "contract violation"
        ),
        ValidationMode::Shadow => tracing::debug!(
            schema_id = %config.schema_id,
            method = %request.method,
            path = %request.path,
            status,
            errors = %result.joined_errors(),
            "contract violation (shadow)"
        ),
    }
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn to_validation_response(response: &BufferedResponse) -> ValidationResponse {
    ValidationResponse {
        status_code: response.status.as_u16(),
        headers: header_map(&response.headers),
        body: body_from_bytes(&response.body),
    }
}
