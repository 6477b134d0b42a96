use std::path::PathBuf;

use cvtdemo_contract::{
    AutoRegisterConfig, BreakingChangeKind, ContractValidator, Interaction, LocalValidator,
    ValidationRequest, ValidationResponse, ValidationScope,
};
use serde_json::json;

fn schema_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../schemas")
        .join(name)
}

fn captured(path: &str, result: f64) -> Interaction {
    Interaction {
        request: ValidationRequest::new("GET", path),
        response: ValidationResponse::new(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "result": result })),
        validation_result: None,
    }
}

fn auto_register() -> AutoRegisterConfig {
    AutoRegisterConfig {
        consumer_id: "consumer-4".to_string(),
        consumer_version: "1.0.0".to_string(),
        schema_id: "calculator-api".to_string(),
        schema_version: "1.0.0".to_string(),
        environment: "demo".to_string(),
    }
}

#[tokio::test]
async fn rename_of_result_blocks_deploy_for_captured_consumer() {
    let engine = LocalValidator::new();
    let current = engine
        .register_schema("calculator-api", &schema_path("calculator-api.json"))
        .await
        .unwrap();
    engine
        .register_schema(
            "calculator-api",
            &schema_path("calculator-api-v2-breaking.json"),
        )
        .await
        .unwrap();

    // The candidate does not change what the serving version accepts.
    let served = captured("/add?x=5&y=3", 8.0);
    let result = engine
        .validate_scoped(
            "calculator-api",
            Some(current.version.as_str()),
            ValidationScope::Full,
            &served.request,
            Some(&served.response),
        )
        .await
        .unwrap();
    assert!(result.valid, "errors: {:?}", result.errors);

    let interactions = vec![
        captured("/add?x=5&y=3", 8.0),
        captured("/add?x=1&y=1", 2.0),
        captured("/subtract?x=5&y=3", 2.0),
    ];
    let info = engine
        .register_consumer_from_interactions(&interactions, &auto_register())
        .await
        .unwrap();
    assert_eq!(info.used_endpoints.len(), 2);
    assert_eq!(info.used_endpoints[0].path, "/add");
    assert_eq!(info.used_endpoints[0].used_fields, vec!["result"]);

    let result = engine
        .can_i_deploy("calculator-api", "2.0.0", "demo")
        .await
        .unwrap();
    assert!(!result.safe_to_deploy);
    assert_eq!(
        result.summary,
        "2 breaking change(s) affect 1 consumer(s) in demo: consumer-4"
    );
    assert!(result
        .breaking_changes
        .iter()
        .all(|change| change.kind == BreakingChangeKind::FieldRemoved
            && change.field.as_deref() == Some("result")));

    let unchanged = engine
        .can_i_deploy("calculator-api", "1.0.0", "demo")
        .await
        .unwrap();
    assert!(unchanged.safe_to_deploy);
    assert_eq!(
        unchanged.summary,
        "calculator-api@1.0.0 is compatible with 1 consumer(s) in demo"
    );
}

#[tokio::test]
async fn deploy_check_is_read_only() {
    let engine = LocalValidator::new();
    engine
        .register_schema("calculator-api", &schema_path("calculator-api.json"))
        .await
        .unwrap();
    engine
        .register_consumer_from_interactions(&[captured("/add?x=5&y=3", 8.0)], &auto_register())
        .await
        .unwrap();

    let first = engine
        .can_i_deploy("calculator-api", "1.0.0", "demo")
        .await
        .unwrap();
    let second = engine
        .can_i_deploy("calculator-api", "1.0.0", "demo")
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(
        engine
            .list_consumers("calculator-api", "demo")
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn reregistering_a_consumer_replaces_it() {
    let engine = LocalValidator::new();
    engine
        .register_schema("calculator-api", &schema_path("calculator-api.json"))
        .await
        .unwrap();

    let config = auto_register();
    engine
        .register_consumer_from_interactions(&[captured("/add?x=5&y=3", 8.0)], &config)
        .await
        .unwrap();
    engine
        .register_consumer_from_interactions(&[captured("/subtract?x=5&y=3", 2.0)], &config)
        .await
        .unwrap();

    let consumers = engine.list_consumers("calculator-api", "demo").await.unwrap();
    assert_eq!(consumers.len(), 1);
    assert_eq!(consumers[0].used_endpoints[0].path, "/subtract");
}
