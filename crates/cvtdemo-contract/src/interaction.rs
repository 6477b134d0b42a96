use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The request half of an HTTP exchange, as the validator sees it.
///
/// `path` may carry a query string (`/add?x=5&y=3`); validation splits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ValidationRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Add a header. Names are stored lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The path without its query string.
    pub fn path_only(&self) -> &str {
        split_query(&self.path).0
    }

    /// Decoded query pairs in the order they appear.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match split_query(&self.path).1 {
            Some(query) => form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// The response half of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ValidationResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Media type from `Content-Type`, lowercased and without parameters.
    pub fn media_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// Outcome of checking an exchange against a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Combine two results; invalid if either is.
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.valid = self.valid && other.valid;
        self.errors.extend(other.errors);
        self
    }

    /// All errors joined with `"; "`.
    pub fn joined_errors(&self) -> String {
        self.errors.join("; ")
    }
}

/// A captured request/response pair and, when it was checked, the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub request: ValidationRequest,
    pub response: ValidationResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<ValidationResult>,
}

/// Which half of an exchange to check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationScope {
    #[default]
    Full,
    Request,
    Response,
}

impl ValidationScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

/// Parse a buffered HTTP body as JSON. Empty or non-JSON bodies yield `None`.
pub fn body_from_bytes(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}

fn split_query(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    }
}

fn find_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn query_is_split_and_decoded() {
        let request = ValidationRequest::new("get", "/add?x=5&y=-3.5&note=a%20b");
        assert_eq!(request.method, "GET");
        assert_eq!(request.path_only(), "/add");
        assert_eq!(
            request.query_pairs(),
            vec![
                ("x".to_string(), "5".to_string()),
                ("y".to_string(), "-3.5".to_string()),
                ("note".to_string(), "a b".to_string()),
            ]
        );
    }

    #[test]
    fn headers_are_case_insensitive() {
        let response = ValidationResponse::new(200)
            .with_header("Content-Type", "Application/JSON; charset=utf-8");
        assert_eq!(
            response.header("content-type"),
            Some("Application/JSON; charset=utf-8")
        );
        assert_eq!(response.media_type().as_deref(), Some("application/json"));
    }

    #[test]
    fn merge_keeps_errors_from_both_halves() {
        let merged = ValidationResult::from_errors(vec!["a".to_string()])
            .merge(ValidationResult::ok())
            .merge(ValidationResult::from_errors(vec!["b".to_string()]));
        assert!(!merged.valid);
        assert_eq!(merged.joined_errors(), "a; b");
    }

    #[test]
    fn body_from_bytes_ignores_empty_and_non_json() {
        assert_eq!(body_from_bytes(b""), None);
        assert_eq!(body_from_bytes(b"  \n"), None);
        assert_eq!(body_from_bytes(b"plain text"), None);
        assert_eq!(body_from_bytes(br#"{"result":8}"#), Some(json!({"result": 8})));
    }

    #[test]
    fn scope_wire_format_is_lowercase() {
        let scope: ValidationScope = serde_json::from_str(r#""response""#).unwrap();
        assert_eq!(scope, ValidationScope::Response);
        assert_eq!(serde_json::to_string(&ValidationScope::Full).unwrap(), r#""full""#);
    }
}
