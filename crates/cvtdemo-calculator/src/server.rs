use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use cvtdemo_adapters::{with_validation, MiddlewareConfig};
use cvtdemo_contract::ContractValidator;
use cvtdemo_service::RemoteValidator;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::settings::ProducerSettings;

/// The calculator routes without contract validation.
///
/// Other methods on a known path get a 405 JSON error.
pub fn router() -> Router {
    Router::new()
        .route(
            "/add",
            get(handlers::add).fallback(handlers::method_not_allowed),
        )
        .route(
            "/subtract",
            get(handlers::subtract).fallback(handlers::method_not_allowed),
        )
        .route(
            "/multiply",
            get(handlers::multiply).fallback(handlers::method_not_allowed),
        )
        .route(
            "/divide",
            get(handlers::divide).fallback(handlers::method_not_allowed),
        )
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
}

/// The application as configured by `settings`.
///
/// When validation is enabled but the validator cannot be reached or the
/// schema cannot be registered, the calculator serves without validation.
pub async fn build_app(settings: &ProducerSettings) -> Router {
    let routes = router();
    let app = if !settings.cvt_enabled {
        tracing::info!("contract validation disabled");
        routes
    } else {
        match connect_validator(settings).await {
            Ok((validator, version)) => {
                tracing::info!(
                    schema_id = %settings.schema_id,
                    schema_version = %version,
                    schema_path = %settings.schema_path.display(),
                    mode = %settings.mode,
                    "contract validation enabled"
                );
                let config = MiddlewareConfig::new(settings.schema_id.clone(), validator)
                    .with_schema_version(version)
                    .with_mode(settings.mode)
                    .exclude_path("/health");
                with_validation(routes, config)
            }
            Err(err) => {
                tracing::warn!(
                    validator = %settings.cvt_server_addr,
                    error = %err,
                    "contract validation unavailable, serving without it"
                );
                routes
            }
        }
    };
    app.layer(TraceLayer::new_for_http())
}

/// The validator and the schema version this producer registered.
async fn connect_validator(
    settings: &ProducerSettings,
) -> cvtdemo_contract::Result<(Arc<dyn ContractValidator>, String)> {
    let validator = RemoteValidator::connect(&settings.cvt_server_addr)?;
    let info = validator
        .register_schema(&settings.schema_id, &settings.schema_path)
        .await?;
    tracing::debug!(
        schema_id = %info.schema_id,
        version = %info.version,
        newly_registered = info.newly_registered,
        "schema registered"
    );
    Ok((Arc::new(validator), info.version))
}

/// Bind and serve until interrupted.
pub async fn serve(settings: ProducerSettings) -> std::io::Result<()> {
    let app = build_app(&settings).await;
    let listener = tokio::net::TcpListener::bind(settings.listen_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "calculator listening");
    axum::serve(listener, app)
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
