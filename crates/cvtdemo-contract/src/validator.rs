use std::collections::HashMap;
use std::fmt;

use jsonschema::Validator;
use serde_json::{Map, Number, Value};

use crate::error::{ContractError, Result};
use crate::interaction::{ValidationRequest, ValidationResponse, ValidationResult, ValidationScope};
use crate::schema::{path_parameters, ContractSchema, Operation, OperationKey, ParameterLocation};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    Parameter(ParameterLocation, String),
    RequestBody,
    Response(String),
}

/// A registered schema with one compiled validator per parameter, request
/// body and response body.
pub struct CompiledSchema {
    schema: ContractSchema,
    validators: HashMap<(OperationKey, Slot), Validator>,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("id", &self.schema.id)
            .field("version", &self.schema.version)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl CompiledSchema {
    /// Compile every embedded JSON Schema. With `strict_mode`, request and
    /// response bodies reject undeclared properties.
    pub fn compile(schema: ContractSchema, strict_mode: bool) -> Result<Self> {
        let mut validators = HashMap::new();

        for op in schema.operations() {
            for param in &op.parameters {
                let context = format!(
                    "{} {} parameter '{}'",
                    op.key,
                    param.location.as_str(),
                    param.name
                );
                validators.insert(
                    (op.key.clone(), Slot::Parameter(param.location, param.name.clone())),
                    compile_one(&param.schema, false, &context)?,
                );
            }
            let body_schema = op.request_body.as_ref().and_then(|body| body.schema.as_ref());
            if let Some(body_schema) = body_schema {
                let context = format!("{} request body", op.key);
                validators.insert(
                    (op.key.clone(), Slot::RequestBody),
                    compile_one(body_schema, strict_mode, &context)?,
                );
            }
            for (status, spec) in &op.responses {
                if let Some(body_schema) = &spec.body_schema {
                    let context = format!("{} response {status}", op.key);
                    validators.insert(
                        (op.key.clone(), Slot::Response(status.clone())),
                        compile_one(body_schema, strict_mode, &context)?,
                    );
                }
            }
        }

        Ok(Self { schema, validators })
    }

    pub fn schema(&self) -> &ContractSchema {
        &self.schema
    }

    pub fn id(&self) -> &str {
        &self.schema.id
    }

    pub fn version(&self) -> &str {
        &self.schema.version
    }

    /// Check the half of an exchange selected by `scope`.
    pub fn validate_scoped(
        &self,
        scope: ValidationScope,
        request: &ValidationRequest,
        response: Option<&ValidationResponse>,
    ) -> Result<ValidationResult> {
        match (scope, response) {
            (ValidationScope::Request, _) => Ok(self.validate_request(request)),
            (ValidationScope::Response, Some(response)) => {
                Ok(self.validate_response(request, response))
            }
            (ValidationScope::Full, Some(response)) => Ok(self.validate(request, response)),
            (scope, None) => Err(ContractError::InvalidInput(format!(
                "scope '{}' requires a response",
                scope.as_str()
            ))),
        }
    }

    pub fn validate(
        &self,
        request: &ValidationRequest,
        response: &ValidationResponse,
    ) -> ValidationResult {
        let Some(op) = self.operation_for(request) else {
            return ValidationResult::from_errors(vec![no_operation(request)]);
        };
        let mut errors = self.request_errors(op, request);
        errors.extend(self.response_errors(op, response));
        ValidationResult::from_errors(errors)
    }

    pub fn validate_request(&self, request: &ValidationRequest) -> ValidationResult {
        match self.operation_for(request) {
            Some(op) => ValidationResult::from_errors(self.request_errors(op, request)),
            None => ValidationResult::from_errors(vec![no_operation(request)]),
        }
    }

    pub fn validate_response(
        &self,
        request: &ValidationRequest,
        response: &ValidationResponse,
    ) -> ValidationResult {
        match self.operation_for(request) {
            Some(op) => ValidationResult::from_errors(self.response_errors(op, response)),
            None => ValidationResult::from_errors(vec![no_operation(request)]),
        }
    }

    fn operation_for(&self, request: &ValidationRequest) -> Option<&Operation> {
        self.schema
            .find_operation(&request.method, request.path_only())
    }

    fn validator(&self, key: &OperationKey, slot: Slot) -> Option<&Validator> {
        self.validators.get(&(key.clone(), slot))
    }

    fn request_errors(&self, op: &Operation, request: &ValidationRequest) -> Vec<String> {
        let mut errors = Vec::new();
        let query = request.query_pairs();
        let bound = path_parameters(&op.key.path, request.path_only());

        for param in &op.parameters {
            let raw: Vec<&str> = match param.location {
                ParameterLocation::Query => values_named(&query, &param.name),
                ParameterLocation::Path => values_named(&bound, &param.name),
                ParameterLocation::Header => request.header(&param.name).into_iter().collect(),
                ParameterLocation::Cookie => continue,
            };
            let location = param.location.as_str();

            if raw.is_empty() {
                if param.required {
                    errors.push(format!(
                        "missing required {location} parameter '{}'",
                        param.name
                    ));
                }
                continue;
            }

            let value = coerce_parameter(&param.schema, &raw);
            let slot = Slot::Parameter(param.location, param.name.clone());
            if let Some(message) = self
                .validator(&op.key, slot)
                .and_then(|validator| collect_errors(validator, &value))
            {
                errors.push(format!("{location} parameter '{}': {message}", param.name));
            }
        }

        if let Some(spec) = &op.request_body {
            match &request.body {
                None if spec.required => errors.push("request body is required".to_string()),
                None => {}
                Some(body) => {
                    if let Some(message) = self
                        .validator(&op.key, Slot::RequestBody)
                        .and_then(|validator| collect_errors(validator, body))
                    {
                        errors.push(format!("request body: {message}"));
                    }
                }
            }
        }

        errors
    }

    fn response_errors(&self, op: &Operation, response: &ValidationResponse) -> Vec<String> {
        let Some((status_key, spec)) = op.response_for(response.status_code) else {
            return vec![format!(
                "unexpected status code {} for {}",
                response.status_code, op.key
            )];
        };

        let mut errors = Vec::new();
        if let Some(media_type) = response.media_type() {
            if !spec.accepts_media_type(&media_type) {
                errors.push(format!(
                    "response content type '{media_type}' is not declared for {status_key} of {}",
                    op.key
                ));
            }
        }

        if spec.body_schema.is_some() {
            match &response.body {
                None => errors.push(format!(
                    "response body: expected a JSON body for {status_key} of {}",
                    op.key
                )),
                Some(body) => {
                    if let Some(message) = self
                        .validator(&op.key, Slot::Response(status_key.to_string()))
                        .and_then(|validator| collect_errors(validator, body))
                    {
                        errors.push(format!("response body: {message}"));
                    }
                }
            }
        }

        errors
    }
}

fn compile_one(schema: &Value, strict_mode: bool, context: &str) -> Result<Validator> {
    let mut schema_to_compile = schema.clone();
    if strict_mode {
        apply_strict_mode(&mut schema_to_compile);
    }
    jsonschema::validator_for(&schema_to_compile)
        .map_err(|err| ContractError::CompileFailed(format!("{context}: {err}")))
}

/// First error plus up to three more, joined with `"; "`.
fn collect_errors(validator: &Validator, instance: &Value) -> Option<String> {
    let mut errors = validator.iter_errors(instance);
    let first = errors.next()?;
    let mut message = first.to_string();
    for err in errors.take(3) {
        message.push_str("; ");
        message.push_str(&err.to_string());
    }
    Some(message)
}

fn no_operation(request: &ValidationRequest) -> String {
    format!(
        "no operation matches {} {}",
        request.method.to_ascii_uppercase(),
        request.path_only()
    )
}

fn values_named<'a>(pairs: &'a [(String, String)], name: &str) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .collect()
}

/// Turn raw parameter text into the JSON type its schema declares. Values
/// that do not parse stay strings so the schema reports them.
fn coerce_parameter(schema: &Value, raw: &[&str]) -> Value {
    if schema.get("type").and_then(Value::as_str) == Some("array") {
        let items = schema.get("items").cloned().unwrap_or(Value::Null);
        let parts: Vec<&str> = match raw {
            [single] => single.split(',').collect(),
            many => many.to_vec(),
        };
        return Value::Array(parts.iter().map(|part| coerce_scalar(&items, part)).collect());
    }
    raw.first()
        .map(|first| coerce_scalar(schema, first))
        .unwrap_or(Value::Null)
}

fn coerce_scalar(schema: &Value, raw: &str) -> Value {
    let as_string = || Value::String(raw.to_string());
    match schema.get("type").and_then(Value::as_str) {
        Some("integer") => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| as_string()),
        Some("number") => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(as_string),
        Some("boolean") => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => as_string(),
        },
        _ => as_string(),
    }
}

fn apply_strict_mode(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for key in ["properties", "patternProperties"] {
                if let Some(Value::Object(children)) = map.get_mut(key) {
                    children.values_mut().for_each(apply_strict_mode);
                }
            }
            for key in ["items", "additionalProperties", "not"] {
                if let Some(child) = map.get_mut(key) {
                    apply_strict_mode(child);
                }
            }
            for key in ["allOf", "anyOf", "oneOf", "prefixItems"] {
                if let Some(Value::Array(children)) = map.get_mut(key) {
                    children.iter_mut().for_each(apply_strict_mode);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(apply_strict_mode),
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds
            .iter()
            .any(|kind| matches!(kind, Value::String(kind) if kind == "object")),
        _ => map.contains_key("properties") || map.contains_key("required"),
    }
}
