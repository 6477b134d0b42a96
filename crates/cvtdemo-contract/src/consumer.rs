use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ContractError, Result};
use crate::interaction::Interaction;

/// One endpoint a consumer calls and the response fields it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointUsage {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub used_fields: Vec<String>,
}

impl EndpointUsage {
    pub fn new(method: &str, path: &str, used_fields: &[&str]) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            used_fields: used_fields.iter().map(|field| field.to_string()).collect(),
        }
    }
}

/// A consumer registration as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterConsumerOptions {
    pub consumer_id: String,
    pub consumer_version: String,
    pub schema_id: String,
    pub schema_version: String,
    pub environment: String,
    #[serde(default)]
    pub used_endpoints: Vec<EndpointUsage>,
}

impl RegisterConsumerOptions {
    /// Reject blank identifiers and endpoints.
    pub fn check(&self) -> Result<()> {
        let required = [
            ("consumer_id", &self.consumer_id),
            ("consumer_version", &self.consumer_version),
            ("schema_id", &self.schema_id),
            ("schema_version", &self.schema_version),
            ("environment", &self.environment),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ContractError::InvalidRegistration(format!("{name} is required")));
        }
        for endpoint in &self.used_endpoints {
            if endpoint.method.trim().is_empty() || !endpoint.path.starts_with('/') {
                return Err(ContractError::InvalidRegistration(format!(
                    "endpoint '{} {}' needs a method and an absolute path",
                    endpoint.method, endpoint.path
                )));
            }
        }
        Ok(())
    }
}

/// A stored consumer registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerInfo {
    pub consumer_id: String,
    pub consumer_version: String,
    pub schema_id: String,
    pub schema_version: String,
    pub environment: String,
    #[serde(default)]
    pub used_endpoints: Vec<EndpointUsage>,
    /// Unix seconds.
    pub registered_at: u64,
}

impl ConsumerInfo {
    pub fn from_options(options: RegisterConsumerOptions, registered_at: u64) -> Self {
        Self {
            consumer_id: options.consumer_id,
            consumer_version: options.consumer_version,
            schema_id: options.schema_id,
            schema_version: options.schema_version,
            environment: options.environment,
            used_endpoints: options.used_endpoints,
            registered_at,
        }
    }
}

/// Identity to register under when deriving usage from captured traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRegisterConfig {
    pub consumer_id: String,
    pub consumer_version: String,
    pub schema_id: String,
    pub schema_version: String,
    pub environment: String,
}

/// Derive a registration from captured interactions.
///
/// Endpoints are distinct (method, path without query) pairs in first-seen
/// order. Used fields are the top-level keys of every 2xx JSON object body
/// seen for that endpoint, sorted.
pub fn build_consumer_from_interactions(
    interactions: &[Interaction],
    config: &AutoRegisterConfig,
) -> Result<RegisterConsumerOptions> {
    if interactions.is_empty() {
        return Err(ContractError::NoInteractions);
    }

    let mut endpoints: Vec<(EndpointUsage, BTreeSet<String>)> = Vec::new();
    for interaction in interactions {
        let method = interaction.request.method.to_ascii_uppercase();
        let path = interaction.request.path_only();
        let index = match endpoints
            .iter()
            .position(|(usage, _)| usage.method == method && usage.path == path)
        {
            Some(index) => index,
            None => {
                endpoints.push((EndpointUsage::new(&method, path, &[]), BTreeSet::new()));
                endpoints.len() - 1
            }
        };

        let response = &interaction.response;
        if (200..300).contains(&response.status_code) {
            if let Some(Value::Object(body)) = &response.body {
                endpoints[index].1.extend(body.keys().cloned());
            }
        }
    }

    Ok(RegisterConsumerOptions {
        consumer_id: config.consumer_id.clone(),
        consumer_version: config.consumer_version.clone(),
        schema_id: config.schema_id.clone(),
        schema_version: config.schema_version.clone(),
        environment: config.environment.clone(),
        used_endpoints: endpoints
            .into_iter()
            .map(|(mut usage, fields)| {
                usage.used_fields = fields.into_iter().collect();
                usage
            })
            .collect(),
    })
}

/// Consumer registrations, one per (consumer, schema, environment).
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    records: Vec<ConsumerInfo>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced record keeps its position.
    pub fn upsert(&mut self, options: RegisterConsumerOptions, registered_at: u64) -> ConsumerInfo {
        let info = ConsumerInfo::from_options(options, registered_at);
        match self.records.iter_mut().find(|record| {
            record.consumer_id == info.consumer_id
                && record.schema_id == info.schema_id
                && record.environment == info.environment
        }) {
            Some(record) => *record = info.clone(),
            None => self.records.push(info.clone()),
        }
        info
    }

    /// Registrations for a schema in an environment, in registration order.
    pub fn list(&self, schema_id: &str, environment: &str) -> Vec<ConsumerInfo> {
        self.records
            .iter()
            .filter(|record| record.schema_id == schema_id && record.environment == environment)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
