use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cvtdemo_contract::{
    body_from_bytes, ContractValidator, Interaction, ValidationRequest, ValidationResponse,
    ValidationResult, ValidationScope,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::capture::InteractionLog;
use crate::error::{AdapterError, Result};

/// How a [`ValidatingClient`] validates what it sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub schema_id: String,
    /// Version to validate against; the latest registered when `None`.
    pub schema_version: Option<String>,
    /// Validate each exchange before the call returns.
    pub auto_validate: bool,
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(schema_id: impl Into<String>) -> Self {
        Self {
            schema_id: schema_id.into(),
            schema_version: None,
            auto_validate: true,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }
}

/// A buffered response together with its validation outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    /// `None` when validation was off or the validator could not answer.
    pub validation: Option<ValidationResult>,
}

impl CapturedResponse {
    /// Buffer a `reqwest` response.
    pub async fn read(response: reqwest::Response) -> reqwest::Result<Self> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
            validation: None,
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn to_validation_response(&self) -> ValidationResponse {
        ValidationResponse {
            status_code: self.status,
            headers: self.headers.clone(),
            body: body_from_bytes(&self.body),
        }
    }
}

/// HTTP client that records every exchange and, when bound to a validator,
/// checks it against the contract.
#[derive(Clone)]
pub struct ValidatingClient {
    http: reqwest::Client,
    base_url: String,
    validator: Option<Arc<dyn ContractValidator>>,
    config: TransportConfig,
    log: InteractionLog,
}

impl ValidatingClient {
    /// Client for the producer at `base_url`, not yet bound to a validator.
    pub fn new(base_url: &str, config: TransportConfig) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AdapterError::InvalidUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| AdapterError::Http {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            validator: None,
            config,
            log: InteractionLog::new(),
        })
    }

    pub fn with_validator(mut self, validator: Arc<dyn ContractValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Validate against `version` from now on.
    pub fn pin_schema_version(&mut self, version: impl Into<String>) {
        self.config.schema_version = Some(version.into());
    }

    /// Record into an existing log instead of a private one.
    pub fn with_log(mut self, log: InteractionLog) -> Self {
        self.log = log;
        self
    }

    pub fn is_validating(&self) -> bool {
        self.validator.is_some() && self.config.auto_validate
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn log(&self) -> &InteractionLog {
        &self.log
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.log.snapshot()
    }

    pub async fn get(&self, path_and_query: &str) -> Result<CapturedResponse> {
        self.execute(Method::GET, path_and_query, None).await
    }

    /// Send one request, buffer the response, validate and record it.
    ///
    /// A validator failure is logged and leaves the result empty; the
    /// producer's response is returned either way.
    pub async fn execute(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&Value>,
    ) -> Result<CapturedResponse> {
        let url = format!("{}{path_and_query}", self.base_url);
        let mut request = self.http.request(method.clone(), &url);
        let mut recorded = ValidationRequest::new(method.as_str(), path_and_query);
        if let Some(body) = body {
            request = request.json(body);
            recorded = recorded
                .with_header("content-type", "application/json")
                .with_body(body.clone());
        }

        let response = request.send().await.map_err(|source| AdapterError::Http {
            url: url.clone(),
            source,
        })?;
        let mut captured = CapturedResponse::read(response)
            .await
            .map_err(|source| AdapterError::Http { url, source })?;
        let response = captured.to_validation_response();

        if self.config.auto_validate {
            if let Some(validator) = &self.validator {
                captured.validation = match validator
                    .validate_scoped(
                        &self.config.schema_id,
                        self.config.schema_version.as_deref(),
                        ValidationScope::Full,
                        &recorded,
                        Some(&response),
                    )
                    .await
                {
                    Ok(result) => Some(result),
                    Err(err) => {
                        tracing::warn!(
                            schema_id = %self.config.schema_id,
                            schema_version = ?self.config.schema_version,
                            method = %recorded.method,
                            path = %recorded.path,
                            error = %err,
                            "contract validation unavailable"
                        );
                        None
                    }
                };
            }
        }

        self.log.push(Interaction {
            request: recorded,
            response,
            validation_result: captured.validation.clone(),
        });
        Ok(captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_base_urls_without_scheme() {
        assert!(matches!(
            ValidatingClient::new("localhost:10001", TransportConfig::new("calculator-api")),
            Err(AdapterError::InvalidUrl(_))
        ));
        let client =
            ValidatingClient::new("http://localhost:10001/", TransportConfig::new("calculator-api"))
                .unwrap();
        assert!(!client.is_validating());
        assert!(client.interactions().is_empty());
    }

    #[test]
    fn captured_json_decodes_body() {
        let captured = CapturedResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: Bytes::from_static(br#"{"result":8}"#),
            validation: None,
        };
        let value: Value = captured.json().unwrap();
        assert_eq!(value["result"], 8);
        assert!(captured.is_success());
        assert_eq!(
            captured.to_validation_response().body,
            Some(serde_json::json!({ "result": 8 }))
        );
    }
}
