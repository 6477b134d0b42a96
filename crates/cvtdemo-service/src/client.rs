use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use cvtdemo_contract::{
    load_document, CanIDeployResult, ConsumerInfo, ContractError, ContractValidator,
    RegisterConsumerOptions, RegistryConfig, Result, SchemaDocument, SchemaInfo,
    ValidationRequest, ValidationResponse, ValidationResult, ValidationScope,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::wire::{ErrorBody, HealthBody, RegisterSchemaBody, ValidateBody};

/// Options for [`RemoteValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum size of a schema file read before upload.
    pub max_schema_file_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_schema_file_size: RegistryConfig::default().max_schema_file_size,
        }
    }
}

/// [`ContractValidator`] backed by a `cvt-server` over HTTP.
///
/// Connection failures and timeouts surface as [`ContractError::Transport`];
/// error answers from the server as [`ContractError::Remote`].
#[derive(Debug, Clone)]
pub struct RemoteValidator {
    http: reqwest::Client,
    base_url: String,
    options: ClientOptions,
}

impl RemoteValidator {
    /// Client for `addr`, given as `host:port` or a full `http(s)://` URL.
    pub fn connect(addr: &str) -> Result<Self> {
        Self::with_options(addr, ClientOptions::default())
    }

    pub fn with_options(addr: &str, options: ClientOptions) -> Result<Self> {
        let base_url = normalize_base_url(addr)?;
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|err| ContractError::Transport(format!("failed to build client: {err}")))?;
        Ok(Self {
            http,
            base_url,
            options,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the server answers its health endpoint.
    pub async fn health(&self) -> Result<()> {
        let _: HealthBody = self.send(self.http.get(self.url("/health"))).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|err| ContractError::Transport(describe_transport_error(&err)))?;
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(|err| {
                ContractError::Transport(format!("unreadable response from validator: {err}"))
            });
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.code, body.error),
            Err(_) if text.trim().is_empty() => (
                "http_error".to_string(),
                status.canonical_reason().unwrap_or("error").to_string(),
            ),
            Err(_) => ("http_error".to_string(), text.trim().to_string()),
        };
        Err(ContractError::Remote {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

#[async_trait]
impl ContractValidator for RemoteValidator {
    async fn register_schema(&self, schema_id: &str, path: &Path) -> Result<SchemaInfo> {
        let document = load_document(path, self.options.max_schema_file_size)?;
        self.register_schema_document(schema_id, document).await
    }

    async fn register_schema_document(
        &self,
        schema_id: &str,
        document: Value,
    ) -> Result<SchemaInfo> {
        let body = RegisterSchemaBody {
            schema_id: schema_id.to_string(),
            document,
        };
        self.send(self.http.post(self.url("/v1/schemas")).json(&body))
            .await
    }

    async fn fetch_schema(&self, schema_id: &str, version: Option<&str>) -> Result<SchemaDocument> {
        let segment: String = form_urlencoded::byte_serialize(schema_id.as_bytes()).collect();
        let mut request = self.http.get(self.url(&format!("/v1/schemas/{segment}")));
        if let Some(version) = version {
            request = request.query(&[("version", version)]);
        }
        self.send(request).await
    }

    async fn validate_scoped(
        &self,
        schema_id: &str,
        version: Option<&str>,
        scope: ValidationScope,
        request: &ValidationRequest,
        response: Option<&ValidationResponse>,
    ) -> Result<ValidationResult> {
        let body = ValidateBody {
            schema_id: schema_id.to_string(),
            version: version.map(str::to_string),
            scope,
            request: request.clone(),
            response: response.cloned(),
        };
        self.send(self.http.post(self.url("/v1/validate")).json(&body))
            .await
    }

    async fn register_consumer(&self, options: RegisterConsumerOptions) -> Result<ConsumerInfo> {
        self.send(self.http.post(self.url("/v1/consumers")).json(&options))
            .await
    }

    async fn list_consumers(
        &self,
        schema_id: &str,
        environment: &str,
    ) -> Result<Vec<ConsumerInfo>> {
        let request = self
            .http
            .get(self.url("/v1/consumers"))
            .query(&[("schema_id", schema_id), ("environment", environment)]);
        self.send(request).await
    }

    async fn can_i_deploy(
        &self,
        schema_id: &str,
        version: &str,
        environment: &str,
    ) -> Result<CanIDeployResult> {
        let request = self.http.get(self.url("/v1/can-i-deploy")).query(&[
            ("schema_id", schema_id),
            ("version", version),
            ("environment", environment),
        ]);
        self.send(request).await
    }
}

/// Normalise `host:port` or a URL into a base URL without trailing slash.
pub fn normalize_base_url(addr: &str) -> Result<String> {
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(ContractError::InvalidInput(
            "validator address is empty".to_string(),
        ));
    }
    let with_scheme = if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    };
    Ok(with_scheme.trim_end_matches('/').to_string())
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}
