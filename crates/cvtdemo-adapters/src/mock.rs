use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use cvtdemo_contract::{
    ContractSchema, ContractValidator, Interaction, Operation, RegistryConfig, ValidationRequest,
};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::capture::InteractionLog;
use crate::error::{AdapterError, Result};
use crate::transport::CapturedResponse;

const MAX_EXAMPLE_DEPTH: usize = 16;

/// Stands in for the producer by answering from the registered schema.
///
/// The pinned version of the schema, or the latest when none is pinned, is
/// fetched once, on first use. Served
/// exchanges are recorded (without a validation result) so they can feed
/// consumer registration.
pub struct MockClient {
    validator: Arc<dyn ContractValidator>,
    schema_id: String,
    schema_version: Option<String>,
    schema: OnceCell<ContractSchema>,
    log: InteractionLog,
}

impl MockClient {
    pub fn new(validator: Arc<dyn ContractValidator>, schema_id: impl Into<String>) -> Self {
        Self {
            validator,
            schema_id: schema_id.into(),
            schema_version: None,
            schema: OnceCell::new(),
            log: InteractionLog::new(),
        }
    }

    /// Answer from `version` instead of the latest.
    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }

    pub fn log(&self) -> &InteractionLog {
        &self.log
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.log.snapshot()
    }

    pub async fn get(&self, path_and_query: &str) -> Result<CapturedResponse> {
        self.execute("GET", path_and_query, None).await
    }

    pub async fn execute(
        &self,
        method: &str,
        path_and_query: &str,
        body: Option<Value>,
    ) -> Result<CapturedResponse> {
        let schema = self.schema().await?;
        let mut request = ValidationRequest::new(method, path_and_query);
        if let Some(body) = body {
            request = request
                .with_header("content-type", "application/json")
                .with_body(body);
        }

        let operation = schema
            .find_operation(&request.method, request.path_only())
            .ok_or_else(|| AdapterError::NoMockOperation {
                schema_id: self.schema_id.clone(),
                method: request.method.clone(),
                path: request.path_only().to_string(),
            })?;

        let captured = mock_response(operation);
        tracing::debug!(
            schema_id = %self.schema_id,
            operation = %operation.key,
            status = captured.status,
            "served mock response"
        );
        self.log.push(Interaction {
            request,
            response: captured.to_validation_response(),
            validation_result: None,
        });
        Ok(captured)
    }

    async fn schema(&self) -> Result<&ContractSchema> {
        self.schema
            .get_or_try_init(|| async {
                let fetched = self
                    .validator
                    .fetch_schema(&self.schema_id, self.schema_version.as_deref())
                    .await?;
                let schema = ContractSchema::from_document(
                    &fetched.schema_id,
                    fetched.document,
                    RegistryConfig::default().max_ref_depth,
                )?;
                Ok::<_, AdapterError>(schema)
            })
            .await
    }
}

fn mock_response(operation: &Operation) -> CapturedResponse {
    let status = operation
        .responses
        .keys()
        .filter_map(|key| key.parse::<u16>().ok())
        .filter(|code| (200..300).contains(code))
        .min()
        .unwrap_or(200);

    let body = operation
        .success_response()
        .and_then(|response| response.body_schema.as_ref())
        .map(generate_example);

    let mut headers = BTreeMap::new();
    let body = match body {
        Some(value) => {
            headers.insert("content-type".to_string(), "application/json".to_string());
            Bytes::from(value.to_string())
        }
        None => Bytes::new(),
    };

    CapturedResponse {
        status,
        headers,
        body,
        validation: None,
    }
}

/// An instance of `schema`: declared examples first, then a value built
/// from the declared type.
pub fn generate_example(schema: &Value) -> Value {
    example_at(schema, 0)
}

fn example_at(schema: &Value, depth: usize) -> Value {
    let Some(map) = schema.as_object() else {
        return Value::Null;
    };
    if depth >= MAX_EXAMPLE_DEPTH {
        return Value::Null;
    }
    if let Some(declared) = declared_example(map) {
        return declared;
    }

    if let Some(Value::Array(parts)) = map.get("allOf") {
        let mut merged = Map::new();
        for part in parts {
            if let Value::Object(fields) = example_at(part, depth + 1) {
                merged.extend(fields);
            }
        }
        return Value::Object(merged);
    }
    for key in ["oneOf", "anyOf"] {
        if let Some(first) = map.get(key).and_then(Value::as_array).and_then(|v| v.first()) {
            return example_at(first, depth + 1);
        }
    }

    let declared_type = match map.get("type") {
        Some(Value::String(kind)) => Some(kind.as_str()),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null"),
        _ => None,
    };
    match declared_type {
        Some("object") => object_example(map, depth),
        None if map.contains_key("properties") => object_example(map, depth),
        Some("array") => {
            let item = map
                .get("items")
                .map(|items| example_at(items, depth + 1))
                .unwrap_or(Value::Null);
            Value::Array(vec![item])
        }
        Some("string") => Value::String(string_example(map).to_string()),
        Some("integer") => map
            .get("minimum")
            .and_then(Value::as_i64)
            .map(Value::from)
            .unwrap_or_else(|| Value::from(0)),
        Some("number") => map
            .get("minimum")
            .cloned()
            .filter(Value::is_number)
            .unwrap_or_else(|| Value::from(0)),
        Some("boolean") => Value::Bool(false),
        _ => Value::Null,
    }
}

fn declared_example(map: &Map<String, Value>) -> Option<Value> {
    if let Some(example) = map.get("example") {
        return Some(example.clone());
    }
    if let Some(first) = map.get("examples").and_then(Value::as_array).and_then(|v| v.first()) {
        return Some(first.clone());
    }
    if let Some(value) = map.get("default").or_else(|| map.get("const")) {
        return Some(value.clone());
    }
    map.get("enum")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
        .cloned()
}

fn object_example(map: &Map<String, Value>, depth: usize) -> Value {
    let mut object = Map::new();
    if let Some(properties) = map.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            object.insert(name.clone(), example_at(property, depth + 1));
        }
    }
    Value::Object(object)
}

fn string_example(map: &Map<String, Value>) -> &'static str {
    match map.get("format").and_then(Value::as_str) {
        Some("date-time") => "1970-01-01T00:00:00Z",
        Some("date") => "1970-01-01",
        Some("uuid") => "00000000-0000-0000-0000-000000000000",
        Some("email") => "user@example.com",
        Some("uri") => "https://example.com",
        _ => "string",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn examples_win_over_generation() {
        assert_eq!(generate_example(&json!({ "type": "number", "example": 8 })), json!(8));
        assert_eq!(
            generate_example(&json!({ "type": "string", "examples": ["a", "b"] })),
            json!("a")
        );
        assert_eq!(
            generate_example(&json!({ "type": "string", "enum": ["healthy"] })),
            json!("healthy")
        );
        assert_eq!(
            generate_example(&json!({ "type": "integer", "default": 3 })),
            json!(3)
        );
    }

    #[test]
    fn generates_from_types() {
        let schema = json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "count": { "type": "integer", "minimum": 1 },
                "ratio": { "type": "number" },
                "tags": { "type": "array", "items": { "type": "string" } },
                "active": { "type": ["boolean", "null"] }
            }
        });
        assert_eq!(
            generate_example(&schema),
            json!({
                "id": "00000000-0000-0000-0000-000000000000",
                "count": 1,
                "ratio": 0,
                "tags": ["string"],
                "active": false
            })
        );
    }

    #[test]
    fn composition_merges_and_picks_first() {
        let schema = json!({
            "allOf": [
                { "properties": { "a": { "type": "integer" } } },
                { "properties": { "b": { "type": "boolean" } } }
            ]
        });
        assert_eq!(generate_example(&schema), json!({ "a": 0, "b": false }));
        assert_eq!(
            generate_example(&json!({ "oneOf": [{ "type": "string" }, { "type": "integer" }] })),
            json!("string")
        );
    }
}
