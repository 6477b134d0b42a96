//! OpenAPI 3 documents reduced to what contract checks need.
//!
//! A document is parsed once at registration: local `$ref`s are inlined,
//! path-level parameters are merged into each operation, and every
//! operation is indexed by method and path template.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ContractError, Result};

const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// An operation's method (uppercase) and path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationKey {
    pub method: String,
    pub path: String,
}

impl OperationKey {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    Cookie,
}

impl ParameterLocation {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "query" => Some(Self::Query),
            "path" => Some(Self::Path),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Value,
}

impl Parameter {
    /// The declared JSON type, if the schema names exactly one.
    pub fn declared_type(&self) -> Option<&str> {
        self.schema.get("type").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestBodySpec {
    pub required: bool,
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    /// Media types declared under `content`, lowercased.
    pub media_types: Vec<String>,
    /// Schema of the JSON body, when one is declared.
    pub body_schema: Option<Value>,
}

impl ResponseSpec {
    /// Top-level properties of the JSON body schema.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.body_schema
            .as_ref()
            .and_then(|schema| schema.get("properties"))
            .and_then(Value::as_object)
    }

    /// Names the JSON body schema lists as required.
    pub fn required_fields(&self) -> Vec<String> {
        self.body_schema
            .as_ref()
            .map(required_names)
            .unwrap_or_default()
    }

    pub fn accepts_media_type(&self, media_type: &str) -> bool {
        if self.media_types.is_empty() {
            return true;
        }
        self.media_types
            .iter()
            .any(|declared| media_type_matches(declared, media_type))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub key: OperationKey,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBodySpec>,
    /// Keyed by `"200"`, `"4XX"` or `"default"` as written in the document.
    pub responses: BTreeMap<String, ResponseSpec>,
}

impl Operation {
    /// The response declared for `status`: exact code, then range, then default.
    pub fn response_for(&self, status: u16) -> Option<(&str, &ResponseSpec)> {
        let exact = status.to_string();
        let range = format!("{}XX", status / 100);
        let found = [exact.as_str(), range.as_str(), "default"]
            .into_iter()
            .find_map(|wanted| {
                self.responses
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
                    .map(|(key, spec)| (key.as_str(), spec))
            });
        found
    }

    /// The response a successful call returns: lowest 2xx code, then `2XX`.
    pub fn success_response(&self) -> Option<&ResponseSpec> {
        self.responses
            .iter()
            .filter_map(|(key, spec)| key.parse::<u16>().ok().map(|code| (code, spec)))
            .filter(|(code, _)| (200..300).contains(code))
            .min_by_key(|(code, _)| *code)
            .map(|(_, spec)| spec)
            .or_else(|| {
                self.responses
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case("2XX"))
                    .map(|(_, spec)| spec)
            })
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|param| param.required)
    }

    /// Top-level fields the request body schema requires.
    pub fn required_body_fields(&self) -> Vec<String> {
        self.request_body
            .as_ref()
            .and_then(|body| body.schema.as_ref())
            .map(required_names)
            .unwrap_or_default()
    }
}

/// A parsed, reference-free OpenAPI document registered under an ID.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractSchema {
    pub id: String,
    pub version: String,
    pub title: Option<String>,
    operations: BTreeMap<OperationKey, Operation>,
    document: Value,
}

impl ContractSchema {
    /// Parse an OpenAPI 3 document. The version comes from `info.version`.
    pub fn from_document(id: &str, document: Value, max_ref_depth: usize) -> Result<Self> {
        let root = document
            .as_object()
            .ok_or_else(|| invalid("document must be a JSON object"))?;

        match root.get("openapi").and_then(Value::as_str) {
            Some(version) if version.starts_with("3.") => {}
            Some(version) => {
                return Err(invalid(format!("unsupported OpenAPI version {version}")));
            }
            None => return Err(invalid("missing 'openapi' field")),
        }

        let info = root
            .get("info")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("missing 'info' object"))?;
        let version = info
            .get("version")
            .and_then(Value::as_str)
            .filter(|version| !version.trim().is_empty())
            .ok_or_else(|| invalid("info.version is required"))?
            .to_string();
        let title = info.get("title").and_then(Value::as_str).map(str::to_string);

        let paths = root
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("missing 'paths' object"))?;

        let resolver = RefResolver {
            root: &document,
            max_depth: max_ref_depth,
        };
        let mut operations = BTreeMap::new();
        for (path, item) in paths {
            if !path.starts_with('/') {
                return Err(invalid(format!("path '{path}' must start with '/'")));
            }
            let item = resolver.resolve(item, 0)?;
            let item = item
                .as_object()
                .ok_or_else(|| invalid(format!("path item '{path}' must be an object")))?;
            let shared = parse_parameters(item.get("parameters"), path)?;

            for method in METHODS {
                let Some(raw) = item.get(method) else {
                    continue;
                };
                let key = OperationKey::new(method, path);
                let operation = parse_operation(key.clone(), raw, &shared)?;
                operations.insert(key, operation);
            }
        }

        Ok(Self {
            id: id.to_string(),
            version,
            title,
            operations,
            document,
        })
    }

    /// The document as registered.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    pub fn operation_keys(&self) -> Vec<String> {
        self.operations.keys().map(ToString::to_string).collect()
    }

    /// Lookup by method and path template.
    pub fn operation(&self, method: &str, template: &str) -> Option<&Operation> {
        self.operations.get(&OperationKey::new(method, template))
    }

    /// Lookup by method and a concrete request path. Literal templates win
    /// over templated ones.
    pub fn find_operation(&self, method: &str, path: &str) -> Option<&Operation> {
        let path = path.split('?').next().unwrap_or_default();
        if let Some(operation) = self.operation(method, path) {
            return Some(operation);
        }
        let method = method.to_ascii_uppercase();
        self.operations
            .values()
            .find(|op| op.key.method == method && template_matches(&op.key.path, path))
    }
}

/// Values bound to `{name}` segments when `path` matches `template`.
pub fn path_parameters(template: &str, path: &str) -> Vec<(String, String)> {
    template
        .split('/')
        .zip(path.split('/'))
        .filter_map(|(pattern, actual)| {
            pattern
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
                .map(|name| (name.to_string(), actual.to_string()))
        })
        .collect()
}

fn template_matches(template: &str, path: &str) -> bool {
    let pattern: Vec<&str> = template.split('/').collect();
    let actual: Vec<&str> = path.split('/').collect();
    pattern.len() == actual.len()
        && pattern.iter().zip(&actual).all(|(pattern, actual)| {
            (is_template_segment(pattern) && !actual.is_empty()) || pattern == actual
        })
}

fn is_template_segment(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

fn parse_operation(key: OperationKey, raw: &Value, shared: &[Parameter]) -> Result<Operation> {
    let raw = raw
        .as_object()
        .ok_or_else(|| invalid(format!("operation {key} must be an object")))?;

    let own = parse_parameters(raw.get("parameters"), &key.path)?;
    let mut parameters: Vec<Parameter> = shared
        .iter()
        .filter(|param| {
            !own.iter()
                .any(|other| other.name == param.name && other.location == param.location)
        })
        .cloned()
        .collect();
    parameters.extend(own);

    let request_body = raw.get("requestBody").map(|body| RequestBodySpec {
        required: body.get("required").and_then(Value::as_bool).unwrap_or(false),
        schema: body.get("content").and_then(json_content_schema),
    });

    let mut responses = BTreeMap::new();
    if let Some(declared) = raw.get("responses") {
        let declared = declared
            .as_object()
            .ok_or_else(|| invalid(format!("responses of {key} must be an object")))?;
        for (status, response) in declared {
            if !is_status_key(status) {
                return Err(invalid(format!("invalid response key '{status}' in {key}")));
            }
            let content = response.get("content").and_then(Value::as_object);
            let media_types = content
                .map(|content| content.keys().map(|ty| ty.to_ascii_lowercase()).collect())
                .unwrap_or_default();
            let body_schema = response.get("content").and_then(json_content_schema);
            responses.insert(
                status.clone(),
                ResponseSpec {
                    media_types,
                    body_schema,
                },
            );
        }
    }

    Ok(Operation {
        key,
        parameters,
        request_body,
        responses,
    })
}

fn parse_parameters(raw: Option<&Value>, path: &str) -> Result<Vec<Parameter>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let items = raw
        .as_array()
        .ok_or_else(|| invalid(format!("parameters of '{path}' must be an array")))?;

    items
        .iter()
        .map(|item| {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!("parameter without a name in '{path}'")))?;
            let location = item
                .get("in")
                .and_then(Value::as_str)
                .and_then(ParameterLocation::parse)
                .ok_or_else(|| {
                    invalid(format!("parameter '{name}' in '{path}' has no valid 'in'"))
                })?;
            let required = location == ParameterLocation::Path
                || item.get("required").and_then(Value::as_bool).unwrap_or(false);
            Ok(Parameter {
                name: name.to_string(),
                location,
                required,
                schema: item.get("schema").cloned().unwrap_or_else(|| Value::Object(Map::new())),
            })
        })
        .collect()
}

fn json_content_schema(content: &Value) -> Option<Value> {
    let content = content.as_object()?;
    content
        .iter()
        .find(|(media_type, _)| is_json_media_type(media_type))
        .map(|(_, media)| {
            media
                .get("schema")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()))
        })
}

fn is_json_media_type(media_type: &str) -> bool {
    let media_type = media_type.to_ascii_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}

fn media_type_matches(declared: &str, actual: &str) -> bool {
    match declared.split_once('/') {
        Some(("*", "*")) => true,
        Some((kind, "*")) => actual
            .split_once('/')
            .is_some_and(|(actual_kind, _)| actual_kind == kind),
        _ => declared == actual,
    }
}

fn is_status_key(key: &str) -> bool {
    if key == "default" {
        return true;
    }
    let bytes = key.as_bytes();
    bytes.len() == 3
        && (b'1'..=b'5').contains(&bytes[0])
        && (bytes[1..].iter().all(u8::is_ascii_digit)
            || bytes[1..].iter().all(|b| b.eq_ignore_ascii_case(&b'X')))
}

fn required_names(schema: &Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

struct RefResolver<'a> {
    root: &'a Value,
    max_depth: usize,
}

impl RefResolver<'_> {
    fn resolve(&self, value: &Value, depth: usize) -> Result<Value> {
        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    if depth >= self.max_depth {
                        return Err(invalid(format!(
                            "$ref nesting exceeds {} at '{reference}'",
                            self.max_depth
                        )));
                    }
                    let pointer = reference.strip_prefix('#').ok_or_else(|| {
                        invalid(format!("only local references are supported: '{reference}'"))
                    })?;
                    let target = self
                        .root
                        .pointer(pointer)
                        .ok_or_else(|| invalid(format!("unresolved reference '{reference}'")))?;
                    return self.resolve(target, depth + 1);
                }

                let mut resolved = Map::with_capacity(map.len());
                for (key, child) in map {
                    resolved.insert(key.clone(), self.resolve(child, depth)?);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(item, depth))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }
}

fn invalid(message: impl Into<String>) -> ContractError {
    ContractError::InvalidSchema(message.into())
}
