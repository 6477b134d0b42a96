use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compat::{
    assess_deployment, BreakingChangeDetector, CanIDeployResult, ConsumerCheck, UsageDiffDetector,
};
use crate::config::RegistryConfig;
use crate::consumer::{
    self, AutoRegisterConfig, ConsumerInfo, ConsumerRegistry, RegisterConsumerOptions,
};
use crate::error::{ContractError, Result};
use crate::interaction::{
    Interaction, ValidationRequest, ValidationResponse, ValidationResult, ValidationScope,
};
use crate::registry::{load_document, SchemaRegistry};
use crate::validator::CompiledSchema;

/// What the engine knows about a registered schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub schema_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub operations: Vec<String>,
    /// False when an identical document was already registered.
    #[serde(default)]
    pub newly_registered: bool,
}

impl SchemaInfo {
    pub fn describe(schema: &CompiledSchema, newly_registered: bool) -> Self {
        Self {
            schema_id: schema.id().to_string(),
            version: schema.version().to_string(),
            title: schema.schema().title.clone(),
            operations: schema.schema().operation_keys(),
            newly_registered,
        }
    }
}

/// A registered schema document as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub schema_id: String,
    pub version: String,
    pub document: Value,
}

/// The contract validation protocol.
///
/// `validate_scoped` checks against the named version, or the latest
/// registered version of the schema ID when none is given. The `validate*`
/// shorthands always use the latest. Deploy checks name the candidate
/// version explicitly.
#[async_trait]
pub trait ContractValidator: Send + Sync {
    /// Register a schema document read from a local file.
    async fn register_schema(&self, schema_id: &str, path: &Path) -> Result<SchemaInfo>;

    async fn register_schema_document(&self, schema_id: &str, document: Value)
        -> Result<SchemaInfo>;

    /// The stored document for a version, or the latest.
    async fn fetch_schema(&self, schema_id: &str, version: Option<&str>)
        -> Result<SchemaDocument>;

    async fn validate_scoped(
        &self,
        schema_id: &str,
        version: Option<&str>,
        scope: ValidationScope,
        request: &ValidationRequest,
        response: Option<&ValidationResponse>,
    ) -> Result<ValidationResult>;

    async fn register_consumer(&self, options: RegisterConsumerOptions) -> Result<ConsumerInfo>;

    async fn list_consumers(&self, schema_id: &str, environment: &str)
        -> Result<Vec<ConsumerInfo>>;

    async fn can_i_deploy(
        &self,
        schema_id: &str,
        version: &str,
        environment: &str,
    ) -> Result<CanIDeployResult>;

    async fn validate(
        &self,
        schema_id: &str,
        request: &ValidationRequest,
        response: &ValidationResponse,
    ) -> Result<ValidationResult> {
        self.validate_scoped(
            schema_id,
            None,
            ValidationScope::Full,
            request,
            Some(response),
        )
        .await
    }

    async fn validate_request(
        &self,
        schema_id: &str,
        request: &ValidationRequest,
    ) -> Result<ValidationResult> {
        self.validate_scoped(schema_id, None, ValidationScope::Request, request, None)
            .await
    }

    async fn validate_response(
        &self,
        schema_id: &str,
        request: &ValidationRequest,
        response: &ValidationResponse,
    ) -> Result<ValidationResult> {
        self.validate_scoped(
            schema_id,
            None,
            ValidationScope::Response,
            request,
            Some(response),
        )
        .await
    }

    fn build_consumer_from_interactions(
        &self,
        interactions: &[Interaction],
        config: &AutoRegisterConfig,
    ) -> Result<RegisterConsumerOptions> {
        consumer::build_consumer_from_interactions(interactions, config)
    }

    async fn register_consumer_from_interactions(
        &self,
        interactions: &[Interaction],
        config: &AutoRegisterConfig,
    ) -> Result<ConsumerInfo> {
        let options = self.build_consumer_from_interactions(interactions, config)?;
        self.register_consumer(options).await
    }
}

struct EngineState {
    schemas: SchemaRegistry,
    consumers: ConsumerRegistry,
}

/// In-process engine. All state sits behind one mutex that is never held
/// across an await point.
pub struct LocalValidator {
    state: Mutex<EngineState>,
    config: RegistryConfig,
    detector: Box<dyn BreakingChangeDetector>,
}

impl LocalValidator {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            state: Mutex::new(EngineState {
                schemas: SchemaRegistry::with_config(config),
                consumers: ConsumerRegistry::new(),
            }),
            config,
            detector: Box::new(UsageDiffDetector),
        }
    }

    /// Replace the breaking-change detector used by `can_i_deploy`.
    pub fn with_detector(mut self, detector: impl BreakingChangeDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn into_shared(self) -> Arc<dyn ContractValidator> {
        Arc::new(self)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut EngineState) -> Result<T>) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ContractError::Internal("validator state lock poisoned".to_string()))?;
        f(&mut state)
    }
}

impl Default for LocalValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContractValidator for LocalValidator {
    async fn register_schema(&self, schema_id: &str, path: &Path) -> Result<SchemaInfo> {
        let document = load_document(path, self.config.max_schema_file_size)?;
        self.register_schema_document(schema_id, document).await
    }

    async fn register_schema_document(
        &self,
        schema_id: &str,
        document: Value,
    ) -> Result<SchemaInfo> {
        let (schema, fresh) =
            self.with_state(|state| state.schemas.register_value(schema_id, document))?;
        if fresh {
            tracing::info!(schema_id, version = schema.version(), "schema registered");
        }
        Ok(SchemaInfo::describe(&schema, fresh))
    }

    async fn fetch_schema(&self, schema_id: &str, version: Option<&str>) -> Result<SchemaDocument> {
        let schema = self.with_state(|state| state.schemas.get(schema_id, version))?;
        Ok(SchemaDocument {
            schema_id: schema.id().to_string(),
            version: schema.version().to_string(),
            document: schema.schema().document().clone(),
        })
    }

    async fn validate_scoped(
        &self,
        schema_id: &str,
        version: Option<&str>,
        scope: ValidationScope,
        request: &ValidationRequest,
        response: Option<&ValidationResponse>,
    ) -> Result<ValidationResult> {
        let schema = self.with_state(|state| state.schemas.get(schema_id, version))?;
        let result = schema.validate_scoped(scope, request, response)?;
        tracing::debug!(
            schema_id,
            version = schema.version(),
            scope = scope.as_str(),
            method = %request.method,
            path = request.path_only(),
            valid = result.valid,
            errors = result.errors.len(),
            "interaction validated"
        );
        Ok(result)
    }

    async fn register_consumer(&self, options: RegisterConsumerOptions) -> Result<ConsumerInfo> {
        options.check()?;
        let registered_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        let info = self.with_state(|state| {
            state
                .schemas
                .get(&options.schema_id, Some(options.schema_version.as_str()))?;
            Ok(state.consumers.upsert(options, registered_at))
        })?;
        tracing::info!(
            consumer_id = %info.consumer_id,
            consumer_version = %info.consumer_version,
            schema_id = %info.schema_id,
            schema_version = %info.schema_version,
            environment = %info.environment,
            endpoints = info.used_endpoints.len(),
            "consumer registered"
        );
        Ok(info)
    }

    async fn list_consumers(
        &self,
        schema_id: &str,
        environment: &str,
    ) -> Result<Vec<ConsumerInfo>> {
        self.with_state(|state| Ok(state.consumers.list(schema_id, environment)))
    }

    async fn can_i_deploy(
        &self,
        schema_id: &str,
        version: &str,
        environment: &str,
    ) -> Result<CanIDeployResult> {
        let (candidate, consumers) = self.with_state(|state| {
            let candidate = state.schemas.get(schema_id, Some(version))?;
            let consumers: Vec<(ConsumerInfo, Option<Arc<CompiledSchema>>)> = state
                .consumers
                .list(schema_id, environment)
                .into_iter()
                .map(|info| {
                    let baseline = state
                        .schemas
                        .get(schema_id, Some(info.schema_version.as_str()))
                        .ok();
                    (info, baseline)
                })
                .collect();
            Ok((candidate, consumers))
        })?;

        let checks: Vec<ConsumerCheck<'_>> = consumers
            .iter()
            .map(|(consumer, baseline)| ConsumerCheck {
                consumer,
                baseline: baseline.as_deref().map(CompiledSchema::schema),
            })
            .collect();
        let result = assess_deployment(
            candidate.schema(),
            environment,
            &checks,
            self.detector.as_ref(),
        );
        tracing::info!(
            schema_id,
            version,
            environment,
            safe = result.safe_to_deploy,
            breaking_changes = result.breaking_changes.len(),
            "deploy safety checked"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::consumer::EndpointUsage;

    const V1: &str = include_str!("../../../schemas/calculator-api.json");
    const V2: &str = include_str!("../../../schemas/calculator-api-v2-breaking.json");

    fn document(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    fn registration(environment: &str) -> RegisterConsumerOptions {
        RegisterConsumerOptions {
            consumer_id: "consumer-4".to_string(),
            consumer_version: "1.0.0".to_string(),
            schema_id: "calculator-api".to_string(),
            schema_version: "1.0.0".to_string(),
            environment: environment.to_string(),
            used_endpoints: vec![
                EndpointUsage::new("GET", "/add", &["result"]),
                EndpointUsage::new("GET", "/subtract", &["result"]),
            ],
        }
    }

    #[tokio::test]
    async fn register_reports_operations_and_idempotence() {
        let engine = LocalValidator::new();
        let info = engine
            .register_schema_document("calculator-api", document(V1))
            .await
            .unwrap();
        assert!(info.newly_registered);
        assert_eq!(info.version, "1.0.0");
        assert!(info.operations.contains(&"GET /add".to_string()));

        let again = engine
            .register_schema_document("calculator-api", document(V1))
            .await
            .unwrap();
        assert!(!again.newly_registered);
    }

    #[tokio::test]
    async fn pinned_validation_ignores_newer_candidates() {
        let engine = LocalValidator::new();
        let pinned = engine
            .register_schema_document("calculator-api", document(V1))
            .await
            .unwrap();

        let request = ValidationRequest::new("GET", "/add?x=5&y=3");
        let response = ValidationResponse::new(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "result": 8 }));
        assert!(engine.validate("calculator-api", &request, &response).await.unwrap().valid);

        engine
            .register_schema_document("calculator-api", document(V2))
            .await
            .unwrap();
        let again = engine
            .register_schema_document("calculator-api", document(V1))
            .await
            .unwrap();
        assert_eq!(again.version, pinned.version);

        let latest = engine.validate("calculator-api", &request, &response).await.unwrap();
        assert!(!latest.valid, "unpinned validation follows the latest version");

        let result = engine
            .validate_scoped(
                "calculator-api",
                Some(pinned.version.as_str()),
                ValidationScope::Full,
                &request,
                Some(&response),
            )
            .await
            .unwrap();
        assert!(result.valid, "{:?}", result.errors);

        assert!(matches!(
            engine
                .validate_scoped(
                    "calculator-api",
                    Some("9.9.9"),
                    ValidationScope::Request,
                    &request,
                    None,
                )
                .await,
            Err(ContractError::SchemaNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn validating_unknown_schema_fails() {
        let engine = LocalValidator::new();
        let request = ValidationRequest::new("GET", "/add?x=1&y=2");
        assert!(matches!(
            engine.validate_request("calculator-api", &request).await,
            Err(ContractError::SchemaNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn consumers_require_a_registered_schema_version() {
        let engine = LocalValidator::new();
        assert!(matches!(
            engine.register_consumer(registration("demo")).await,
            Err(ContractError::SchemaNotFound { .. })
        ));

        engine
            .register_schema_document("calculator-api", document(V1))
            .await
            .unwrap();
        let info = engine.register_consumer(registration("demo")).await.unwrap();
        assert_eq!(info.used_endpoints.len(), 2);
        assert_eq!(
            engine.list_consumers("calculator-api", "demo").await.unwrap(),
            vec![info]
        );
        assert!(engine
            .list_consumers("calculator-api", "prod")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn can_i_deploy_flags_the_rename() {
        let engine = LocalValidator::new();
        engine
            .register_schema_document("calculator-api", document(V1))
            .await
            .unwrap();
        engine
            .register_schema_document("calculator-api", document(V2))
            .await
            .unwrap();
        engine.register_consumer(registration("demo")).await.unwrap();

        let safe = engine.can_i_deploy("calculator-api", "1.0.0", "demo").await.unwrap();
        assert!(safe.safe_to_deploy);

        let result = engine.can_i_deploy("calculator-api", "2.0.0", "demo").await.unwrap();
        assert!(!result.safe_to_deploy);
        assert_eq!(result.breaking_changes.len(), 2);
        assert_eq!(result.affected_consumers, vec!["consumer-4"]);

        let elsewhere = engine.can_i_deploy("calculator-api", "2.0.0", "prod").await.unwrap();
        assert!(elsewhere.safe_to_deploy);
        assert_eq!(elsewhere.summary, "no consumers registered for calculator-api in prod");

        assert!(matches!(
            engine.can_i_deploy("calculator-api", "3.0.0", "demo").await,
            Err(ContractError::SchemaNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_returns_stored_document() {
        let engine = LocalValidator::new();
        engine
            .register_schema_document("calculator-api", document(V1))
            .await
            .unwrap();
        let fetched = engine.fetch_schema("calculator-api", None).await.unwrap();
        assert_eq!(fetched.version, "1.0.0");
        assert_eq!(fetched.document, document(V1));
    }
}
