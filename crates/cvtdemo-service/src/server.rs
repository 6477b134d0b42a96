use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use cvtdemo_contract::{
    CanIDeployResult, ConsumerInfo, ContractError, ContractValidator, LocalValidator,
    RegisterConsumerOptions, SchemaDocument, SchemaInfo, ValidationResult,
};
use tower_http::trace::TraceLayer;

use crate::settings::ServerSettings;
use crate::wire::{
    ConsumerQuery, DeployQuery, ErrorBody, HealthBody, RegisterSchemaBody, SchemaQuery,
    ValidateBody,
};

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<Json<T>, ApiError>;
type SharedValidator = Arc<dyn ContractValidator>;

/// Routes for the validation protocol over `validator`.
pub fn build_router(validator: SharedValidator) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/schemas", post(register_schema))
        .route("/v1/schemas/{schema_id}", get(fetch_schema))
        .route("/v1/validate", post(validate))
        .route("/v1/consumers", post(register_consumer).get(list_consumers))
        .route("/v1/can-i-deploy", get(can_i_deploy))
        .with_state(validator)
        .layer(TraceLayer::new_for_http())
}

/// Build an in-process engine from settings and register preloaded schemas.
pub async fn prepare_validator(
    settings: &ServerSettings,
) -> cvtdemo_contract::Result<SharedValidator> {
    let validator = LocalValidator::with_config(settings.registry_config());
    for preload in &settings.preload {
        let info = validator
            .register_schema(&preload.schema_id, &preload.path)
            .await?;
        tracing::info!(
            schema_id = %info.schema_id,
            version = %info.version,
            path = %preload.path.display(),
            "preloaded schema"
        );
    }
    Ok(validator.into_shared())
}

/// Serve the protocol on `listener` until interrupted.
pub async fn serve(
    listener: tokio::net::TcpListener,
    validator: SharedValidator,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "cvt-server listening");
    axum::serve(listener, build_router(validator))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Map an engine error onto an HTTP status and `{error, code}` body.
pub fn map_error(err: ContractError) -> ApiError {
    let status = match &err {
        ContractError::SchemaNotFound { .. } => StatusCode::NOT_FOUND,
        ContractError::VersionConflict { .. } => StatusCode::CONFLICT,
        ContractError::LoadFailed(_)
        | ContractError::InvalidSchema(_)
        | ContractError::CompileFailed(_)
        | ContractError::InvalidJson(_)
        | ContractError::InvalidInput(_)
        | ContractError::InvalidRegistration(_)
        | ContractError::NoInteractions => StatusCode::BAD_REQUEST,
        ContractError::Remote { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        ContractError::Transport(_) => StatusCode::BAD_GATEWAY,
        ContractError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

fn bad_request(message: String) -> ApiError {
    map_error(ContractError::InvalidInput(message))
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok".to_string(),
    })
}

async fn register_schema(
    State(validator): State<SharedValidator>,
    payload: Result<Json<RegisterSchemaBody>, JsonRejection>,
) -> Result<(StatusCode, Json<SchemaInfo>), ApiError> {
    let Json(body) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let info = validator
        .register_schema_document(&body.schema_id, body.document)
        .await
        .map_err(map_error)?;
    let status = if info.newly_registered {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(info)))
}

async fn fetch_schema(
    State(validator): State<SharedValidator>,
    Path(schema_id): Path<String>,
    query: Result<Query<SchemaQuery>, QueryRejection>,
) -> ApiResult<SchemaDocument> {
    let Query(query) = query.map_err(|rejection| bad_request(rejection.body_text()))?;
    validator
        .fetch_schema(&schema_id, query.version.as_deref())
        .await
        .map(Json)
        .map_err(map_error)
}

async fn validate(
    State(validator): State<SharedValidator>,
    payload: Result<Json<ValidateBody>, JsonRejection>,
) -> ApiResult<ValidationResult> {
    let Json(body) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    validator
        .validate_scoped(
            &body.schema_id,
            body.version.as_deref(),
            body.scope,
            &body.request,
            body.response.as_ref(),
        )
        .await
        .map(Json)
        .map_err(map_error)
}

async fn register_consumer(
    State(validator): State<SharedValidator>,
    payload: Result<Json<RegisterConsumerOptions>, JsonRejection>,
) -> Result<(StatusCode, Json<ConsumerInfo>), ApiError> {
    let Json(options) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let info = validator
        .register_consumer(options)
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn list_consumers(
    State(validator): State<SharedValidator>,
    query: Result<Query<ConsumerQuery>, QueryRejection>,
) -> ApiResult<Vec<ConsumerInfo>> {
    let Query(query) = query.map_err(|rejection| bad_request(rejection.body_text()))?;
    validator
        .list_consumers(&query.schema_id, &query.environment)
        .await
        .map(Json)
        .map_err(map_error)
}

async fn can_i_deploy(
    State(validator): State<SharedValidator>,
    query: Result<Query<DeployQuery>, QueryRejection>,
) -> ApiResult<CanIDeployResult> {
    let Query(query) = query.map_err(|rejection| bad_request(rejection.body_text()))?;
    validator
        .can_i_deploy(&query.schema_id, &query.version, &query.environment)
        .await
        .map(Json)
        .map_err(map_error)
}
