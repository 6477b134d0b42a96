//! JSON bodies exchanged between [`RemoteValidator`](crate::RemoteValidator)
//! and the router.

use cvtdemo_contract::{ValidationRequest, ValidationResponse, ValidationScope};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSchemaBody {
    pub schema_id: String,
    pub document: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateBody {
    pub schema_id: String,
    /// Latest when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub scope: ValidationScope,
    pub request: ValidationRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ValidationResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaQuery {
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerQuery {
    pub schema_id: String,
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployQuery {
    pub schema_id: String,
    pub version: String,
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
}
