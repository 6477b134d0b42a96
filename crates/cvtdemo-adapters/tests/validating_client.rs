use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use cvtdemo_adapters::{TransportConfig, ValidatingClient};
use cvtdemo_contract::{
    CanIDeployResult, ConsumerInfo, ContractError, ContractValidator, LocalValidator,
    RegisterConsumerOptions, SchemaDocument, SchemaInfo, ValidationRequest, ValidationResponse,
    ValidationResult, ValidationScope,
};
use serde_json::{json, Value};

const SCHEMA: &str = include_str!("../../../schemas/calculator-api.json");

async fn spawn_producer() -> SocketAddr {
    let app = Router::new()
        .route(
            "/add",
            get(|Query(params): Query<HashMap<String, f64>>| async move {
                let sum = params.get("x").copied().unwrap_or(0.0)
                    + params.get("y").copied().unwrap_or(0.0);
                Json(json!({ "result": sum }))
            }),
        )
        .route("/subtract", get(|| async { Json(json!({ "value": 2 })) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve producer");
    });
    addr
}

async fn calculator_validator() -> Arc<dyn ContractValidator> {
    let validator = LocalValidator::new();
    validator
        .register_schema_document("calculator-api", serde_json::from_str(SCHEMA).unwrap())
        .await
        .expect("register schema");
    validator.into_shared()
}

#[tokio::test]
async fn records_and_validates_each_exchange() {
    let addr = spawn_producer().await;
    let client = ValidatingClient::new(
        &format!("http://{addr}"),
        TransportConfig::new("calculator-api"),
    )
    .unwrap()
    .with_validator(calculator_validator().await);
    assert!(client.is_validating());

    let good = client.get("/add?x=5&y=3").await.expect("add");
    assert_eq!(good.status, 200);
    assert_eq!(good.json::<Value>().unwrap()["result"], 8.0);
    let result = good.validation.expect("validated");
    assert!(result.valid, "errors: {:?}", result.errors);

    let drifted = client.get("/subtract?x=5&y=3").await.expect("subtract");
    assert_eq!(drifted.status, 200);
    let result = drifted.validation.expect("validated");
    assert!(!result.valid);
    assert!(result.joined_errors().contains("result"));

    let log = client.interactions();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].request.path, "/add?x=5&y=3");
    assert_eq!(log[0].response.body, Some(json!({ "result": 8.0 })));
    assert_eq!(log[1].validation_result.as_ref().map(|r| r.valid), Some(false));
}

#[tokio::test]
async fn disabled_auto_validation_only_records() {
    let addr = spawn_producer().await;
    let config = TransportConfig {
        auto_validate: false,
        ..TransportConfig::new("calculator-api")
    };
    let client = ValidatingClient::new(&format!("http://{addr}"), config)
        .unwrap()
        .with_validator(calculator_validator().await);

    let response = client.get("/add?x=1&y=2").await.expect("add");
    assert!(response.validation.is_none());
    assert_eq!(client.log().len(), 1);
    assert!(client.interactions()[0].validation_result.is_none());
}

#[tokio::test]
async fn pinned_client_ignores_a_newer_candidate() {
    let addr = spawn_producer().await;
    let validator = calculator_validator().await;
    validator
        .register_schema_document(
            "calculator-api",
            serde_json::from_str(include_str!(
                "../../../schemas/calculator-api-v2-breaking.json"
            ))
            .unwrap(),
        )
        .await
        .expect("register candidate");

    let pinned = ValidatingClient::new(
        &format!("http://{addr}"),
        TransportConfig::new("calculator-api").with_schema_version("1.0.0"),
    )
    .unwrap()
    .with_validator(validator.clone());
    let result = pinned
        .get("/add?x=5&y=3")
        .await
        .expect("add")
        .validation
        .expect("validated");
    assert!(result.valid, "errors: {:?}", result.errors);

    let mut latest = ValidatingClient::new(
        &format!("http://{addr}"),
        TransportConfig::new("calculator-api"),
    )
    .unwrap()
    .with_validator(validator);
    let result = latest
        .get("/add?x=5&y=3")
        .await
        .expect("add")
        .validation
        .expect("validated");
    assert!(!result.valid);

    latest.pin_schema_version("1.0.0");
    let result = latest
        .get("/add?x=5&y=3")
        .await
        .expect("add")
        .validation
        .expect("validated");
    assert!(result.valid, "errors: {:?}", result.errors);
}

struct Unreachable;

#[async_trait]
impl ContractValidator for Unreachable {
    async fn register_schema(&self, _: &str, _: &Path) -> cvtdemo_contract::Result<SchemaInfo> {
        Err(unreachable_error())
    }

    async fn register_schema_document(
        &self,
        _: &str,
        _: Value,
    ) -> cvtdemo_contract::Result<SchemaInfo> {
        Err(unreachable_error())
    }

    async fn fetch_schema(
        &self,
        _: &str,
        _: Option<&str>,
    ) -> cvtdemo_contract::Result<SchemaDocument> {
        Err(unreachable_error())
    }

    async fn validate_scoped(
        &self,
        _: &str,
        _: Option<&str>,
        _: ValidationScope,
        _: &ValidationRequest,
        _: Option<&ValidationResponse>,
    ) -> cvtdemo_contract::Result<ValidationResult> {
        Err(unreachable_error())
    }

    async fn register_consumer(
        &self,
        _: RegisterConsumerOptions,
    ) -> cvtdemo_contract::Result<ConsumerInfo> {
        Err(unreachable_error())
    }

    async fn list_consumers(
        &self,
        _: &str,
        _: &str,
    ) -> cvtdemo_contract::Result<Vec<ConsumerInfo>> {
        Err(unreachable_error())
    }

    async fn can_i_deploy(
        &self,
        _: &str,
        _: &str,
        _: &str,
    ) -> cvtdemo_contract::Result<CanIDeployResult> {
        Err(unreachable_error())
    }
}

fn unreachable_error() -> ContractError {
    ContractError::Transport("connection failed: refused".to_string())
}

#[tokio::test]
async fn unreachable_validator_still_returns_the_producer_response() {
    let addr = spawn_producer().await;
    let client = ValidatingClient::new(
        &format!("http://{addr}"),
        TransportConfig::new("calculator-api"),
    )
    .unwrap()
    .with_validator(Arc::new(Unreachable));

    let response = client.get("/add?x=5&y=3").await.expect("add");
    assert_eq!(response.status, 200);
    assert!(response.validation.is_none());
    assert_eq!(client.log().len(), 1);
}

#[tokio::test]
async fn unreachable_producer_is_an_http_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ValidatingClient::new(
        &format!("http://{addr}"),
        TransportConfig::new("calculator-api"),
    )
    .unwrap();
    let err = client.get("/add?x=1&y=1").await.unwrap_err();
    assert!(matches!(err, cvtdemo_adapters::AdapterError::Http { .. }));
    assert!(client.interactions().is_empty());
}
