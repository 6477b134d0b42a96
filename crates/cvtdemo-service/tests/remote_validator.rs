use std::net::SocketAddr;
use std::path::PathBuf;

use cvtdemo_contract::{
    ContractError, ContractValidator, EndpointUsage, LocalValidator, RegisterConsumerOptions,
    ValidationRequest, ValidationResponse, ValidationScope,
};
use cvtdemo_service::{build_router, RemoteValidator};
use serde_json::{json, Value};

fn schema_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../schemas")
        .join(name)
}

async fn spawn_server() -> SocketAddr {
    let app = build_router(LocalValidator::new().into_shared());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve validator");
    });
    addr
}

fn registration(schema_version: &str) -> RegisterConsumerOptions {
    RegisterConsumerOptions {
        consumer_id: "consumer-4".to_string(),
        consumer_version: "1.0.0".to_string(),
        schema_id: "calculator-api".to_string(),
        schema_version: schema_version.to_string(),
        environment: "demo".to_string(),
        used_endpoints: vec![
            EndpointUsage::new("GET", "/add", &["result"]),
            EndpointUsage::new("GET", "/subtract", &["result"]),
        ],
    }
}

#[tokio::test]
async fn remote_client_drives_full_protocol() {
    let addr = spawn_server().await;
    let client = RemoteValidator::connect(&addr.to_string()).expect("client");
    client.health().await.expect("health");

    let info = client
        .register_schema("calculator-api", &schema_path("calculator-api.json"))
        .await
        .expect("register v1");
    assert!(info.newly_registered);
    assert_eq!(info.version, "1.0.0");

    let request = ValidationRequest::new("GET", "/add?x=5&y=3");
    let good = ValidationResponse::new(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "result": 8 }));
    let result = client
        .validate("calculator-api", &request, &good)
        .await
        .expect("validate");
    assert!(result.valid, "errors: {:?}", result.errors);

    let bad = ValidationResponse::new(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "value": 8 }));
    let result = client
        .validate_response("calculator-api", &request, &bad)
        .await
        .expect("validate response");
    assert!(!result.valid);

    let registered = client
        .register_consumer(registration("1.0.0"))
        .await
        .expect("register consumer");
    let listed = client
        .list_consumers("calculator-api", "demo")
        .await
        .expect("list consumers");
    assert_eq!(listed, vec![registered]);

    client
        .register_schema(
            "calculator-api",
            &schema_path("calculator-api-v2-breaking.json"),
        )
        .await
        .expect("register v2");
    let deploy = client
        .can_i_deploy("calculator-api", "2.0.0", "demo")
        .await
        .expect("can-i-deploy");
    assert!(!deploy.safe_to_deploy);
    assert_eq!(deploy.affected_consumers, vec!["consumer-4"]);
    assert_eq!(deploy.breaking_changes.len(), 2);

    let pinned = client
        .validate_scoped(
            "calculator-api",
            Some(info.version.as_str()),
            ValidationScope::Full,
            &request,
            Some(&good),
        )
        .await
        .expect("validate pinned");
    assert!(pinned.valid, "errors: {:?}", pinned.errors);
    let latest = client
        .validate("calculator-api", &request, &good)
        .await
        .expect("validate latest");
    assert!(!latest.valid);

    let fetched = client
        .fetch_schema("calculator-api", Some("1.0.0"))
        .await
        .expect("fetch v1");
    assert_eq!(fetched.version, "1.0.0");
}

#[tokio::test]
async fn remote_errors_carry_status_and_code() {
    let addr = spawn_server().await;
    let client = RemoteValidator::connect(&format!("http://{addr}/")).expect("client");

    let err = client
        .can_i_deploy("calculator-api", "1.0.0", "demo")
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        ContractError::Remote { status: 404, code, .. } if code == "schema_not_found"
    ));
    assert!(err.is_not_found());

    let document: Value =
        serde_json::from_str(include_str!("../../../schemas/calculator-api.json")).unwrap();
    client
        .register_schema_document("calculator-api", document.clone())
        .await
        .expect("register");

    let mut altered = document;
    altered["info"]["title"] = json!("Altered");
    let err = client
        .register_schema_document("calculator-api", altered)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContractError::Remote { status: 409, ref code, .. } if code == "version_conflict"
    ));

    let err = client
        .register_consumer(registration("9.9.9"))
        .await
        .unwrap_err();
    assert!(matches!(err, ContractError::Remote { status: 404, .. }));
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let addr = spawn_server().await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/v1/validate"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("post");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json error body");
    assert_eq!(body["code"], "invalid_input");
    assert!(body["error"].as_str().is_some());
}
