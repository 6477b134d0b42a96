//! Deploy safety: does a candidate schema version break any registered
//! consumer?

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::consumer::{ConsumerInfo, EndpointUsage};
use crate::schema::{ContractSchema, Operation, ParameterLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakingChangeKind {
    EndpointRemoved,
    FieldRemoved,
    TypeChanged,
    RequiredFieldAdded,
}

/// One way a candidate version breaks one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingChange {
    pub consumer_id: String,
    pub consumer_version: String,
    pub kind: BreakingChangeKind,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanIDeployResult {
    pub safe_to_deploy: bool,
    pub summary: String,
    #[serde(default)]
    pub breaking_changes: Vec<BreakingChange>,
    #[serde(default)]
    pub affected_consumers: Vec<String>,
}

/// A consumer paired with the schema version it registered against, when
/// that version is still known.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerCheck<'a> {
    pub consumer: &'a ConsumerInfo,
    pub baseline: Option<&'a ContractSchema>,
}

/// Finds the changes in `candidate` that break `consumer`.
pub trait BreakingChangeDetector: Send + Sync {
    fn detect(&self, check: ConsumerCheck<'_>, candidate: &ContractSchema) -> Vec<BreakingChange>;
}

/// Compares a consumer's recorded endpoint and field usage with the
/// candidate, using the consumer's baseline version for types and
/// requirements.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageDiffDetector;

impl BreakingChangeDetector for UsageDiffDetector {
    fn detect(&self, check: ConsumerCheck<'_>, candidate: &ContractSchema) -> Vec<BreakingChange> {
        let mut changes = Vec::new();
        for usage in &check.consumer.used_endpoints {
            let report = |kind, field: Option<&str>, description: String| BreakingChange {
                consumer_id: check.consumer.consumer_id.clone(),
                consumer_version: check.consumer.consumer_version.clone(),
                kind,
                method: usage.method.to_ascii_uppercase(),
                path: usage.path.clone(),
                field: field.map(str::to_string),
                description,
            };

            let Some(current) = candidate.find_operation(&usage.method, &usage.path) else {
                changes.push(report(
                    BreakingChangeKind::EndpointRemoved,
                    None,
                    format!(
                        "{} {} is not provided by {}@{}",
                        usage.method.to_ascii_uppercase(),
                        usage.path,
                        candidate.id,
                        candidate.version
                    ),
                ));
                continue;
            };
            let previous = check
                .baseline
                .and_then(|baseline| baseline.find_operation(&usage.method, &usage.path));

            for (kind, field, description) in response_field_changes(usage, previous, current) {
                changes.push(report(kind, Some(field.as_str()), description));
            }

            if let Some(previous) = previous {
                for (field, description) in new_requirements(previous, current) {
                    changes.push(report(
                        BreakingChangeKind::RequiredFieldAdded,
                        Some(field.as_str()),
                        description,
                    ));
                }
            }
        }
        changes
    }
}

/// Run `detector` over every consumer and summarise.
pub fn assess_deployment(
    candidate: &ContractSchema,
    environment: &str,
    consumers: &[ConsumerCheck<'_>],
    detector: &dyn BreakingChangeDetector,
) -> CanIDeployResult {
    if consumers.is_empty() {
        return CanIDeployResult {
            safe_to_deploy: true,
            summary: format!("no consumers registered for {} in {environment}", candidate.id),
            breaking_changes: Vec::new(),
            affected_consumers: Vec::new(),
        };
    }

    let breaking_changes: Vec<BreakingChange> = consumers
        .iter()
        .flat_map(|check| detector.detect(*check, candidate))
        .collect();

    let mut affected_consumers: Vec<String> = Vec::new();
    for change in &breaking_changes {
        if !affected_consumers.contains(&change.consumer_id) {
            affected_consumers.push(change.consumer_id.clone());
        }
    }

    let summary = if breaking_changes.is_empty() {
        format!(
            "{}@{} is compatible with {} consumer(s) in {environment}",
            candidate.id,
            candidate.version,
            consumers.len()
        )
    } else {
        format!(
            "{} breaking change(s) affect {} consumer(s) in {environment}: {}",
            breaking_changes.len(),
            affected_consumers.len(),
            affected_consumers.join(", ")
        )
    };

    CanIDeployResult {
        safe_to_deploy: breaking_changes.is_empty(),
        summary,
        breaking_changes,
        affected_consumers,
    }
}

fn response_field_changes(
    usage: &EndpointUsage,
    previous: Option<&Operation>,
    current: &Operation,
) -> Vec<(BreakingChangeKind, String, String)> {
    let previous_props = previous
        .and_then(Operation::success_response)
        .and_then(|response| response.properties());
    let current_response = current.success_response();
    let current_props = current_response.and_then(|response| response.properties());

    // A success body declared without properties constrains nothing.
    if current_props.is_none()
        && current_response.is_some_and(|response| response.body_schema.is_some())
    {
        return Vec::new();
    }

    let used: Vec<String> = if usage.used_fields.is_empty() {
        previous
            .and_then(Operation::success_response)
            .map(|response| response.required_fields())
            .unwrap_or_default()
    } else {
        usage.used_fields.clone()
    };

    let endpoint = &current.key;
    let mut changes = Vec::new();
    for field in used {
        let before = previous_props.and_then(|props| props.get(&field));
        match current_props.and_then(|props| props.get(&field)) {
            None => {
                let mut description =
                    format!("response field '{field}' of {endpoint} was removed");
                let target = rename_target(&field, before, previous_props, current_props);
                if let Some(target) = target {
                    description.push_str(&format!(", possibly renamed to '{target}'"));
                }
                changes.push((BreakingChangeKind::FieldRemoved, field, description));
            }
            Some(after) => {
                let (Some(old_type), Some(new_type)) = (
                    before.and_then(|schema| schema.get("type")),
                    after.get("type"),
                ) else {
                    continue;
                };
                if old_type != new_type {
                    let description = format!(
                        "response field '{field}' of {endpoint} changed type from {} to {}",
                        type_label(old_type),
                        type_label(new_type)
                    );
                    changes.push((BreakingChangeKind::TypeChanged, field, description));
                }
            }
        }
    }
    changes
}

/// A property the candidate gained with the same type as the removed one.
fn rename_target(
    field: &str,
    before: Option<&Value>,
    previous_props: Option<&Map<String, Value>>,
    current_props: Option<&Map<String, Value>>,
) -> Option<String> {
    let removed_type = before?.get("type")?;
    let previous_props = previous_props?;
    current_props?
        .iter()
        .filter(|(name, _)| name.as_str() != field && !previous_props.contains_key(*name))
        .find(|(_, schema)| schema.get("type") == Some(removed_type))
        .map(|(name, _)| name.clone())
}

fn new_requirements(previous: &Operation, current: &Operation) -> Vec<(String, String)> {
    let endpoint = &current.key;
    let mut changes = Vec::new();

    for param in current.required_parameters() {
        if param.location == ParameterLocation::Path {
            continue;
        }
        let was_required = previous
            .required_parameters()
            .any(|old| old.name == param.name && old.location == param.location);
        if !was_required {
            changes.push((
                param.name.clone(),
                format!(
                    "{endpoint} now requires {} parameter '{}'",
                    param.location.as_str(),
                    param.name
                ),
            ));
        }
    }

    let old_body: BTreeSet<String> = previous.required_body_fields().into_iter().collect();
    for field in current.required_body_fields() {
        if !old_body.contains(&field) {
            let description = format!("{endpoint} now requires request body field '{field}'");
            changes.push((field, description));
        }
    }

    changes
}

fn type_label(value: &Value) -> String {
    match value {
        Value::String(kind) => kind.clone(),
        other => other.to_string(),
    }
}
