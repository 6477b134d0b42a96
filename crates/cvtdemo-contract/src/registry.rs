use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::config::RegistryConfig;
use crate::error::{ContractError, Result};
use crate::schema::ContractSchema;
use crate::validator::CompiledSchema;

/// Versioned schemas keyed by schema ID.
///
/// Versions of one ID are kept in registration order; the last one
/// registered is the latest. A registered (ID, version) never changes.
pub struct SchemaRegistry {
    schemas: HashMap<String, Vec<Arc<CompiledSchema>>>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            schemas: HashMap::new(),
            config,
        }
    }

    /// Register a schema from a JSON string.
    pub fn register(
        &mut self,
        schema_id: &str,
        document_json: &str,
    ) -> Result<(Arc<CompiledSchema>, bool)> {
        let document: Value = serde_json::from_str(document_json)?;
        self.register_value(schema_id, document)
    }

    /// Register a schema document. Returns the stored schema and whether it
    /// was newly added; re-registering an identical document is a no-op.
    pub fn register_value(
        &mut self,
        schema_id: &str,
        document: Value,
    ) -> Result<(Arc<CompiledSchema>, bool)> {
        validate_schema_id(schema_id)?;
        let schema = ContractSchema::from_document(schema_id, document, self.config.max_ref_depth)?;

        if let Some(existing) = self.find(schema_id, &schema.version) {
            if existing.schema().document() == schema.document() {
                return Ok((existing, false));
            }
            return Err(ContractError::VersionConflict {
                schema_id: schema_id.to_string(),
                version: schema.version,
            });
        }

        let compiled = Arc::new(CompiledSchema::compile(schema, self.config.strict_mode)?);
        self.schemas
            .entry(schema_id.to_string())
            .or_default()
            .push(Arc::clone(&compiled));
        tracing::debug!(schema_id, version = compiled.version(), "registered schema");
        Ok((compiled, true))
    }

    /// Load a schema document from disk and register it.
    pub fn register_file(
        &mut self,
        schema_id: &str,
        path: &Path,
    ) -> Result<(Arc<CompiledSchema>, bool)> {
        let document = load_document(path, self.config.max_schema_file_size)?;
        self.register_value(schema_id, document)
    }

    /// A specific version, or the latest when `version` is `None`.
    pub fn get(&self, schema_id: &str, version: Option<&str>) -> Result<Arc<CompiledSchema>> {
        let found = match version {
            Some(version) => self.find(schema_id, version),
            None => self
                .schemas
                .get(schema_id)
                .and_then(|versions| versions.last())
                .cloned(),
        };
        found.ok_or_else(|| ContractError::SchemaNotFound {
            schema_id: schema_id.to_string(),
            version: version.map(str::to_string),
        })
    }

    /// Versions of a schema in registration order.
    pub fn versions(&self, schema_id: &str) -> Vec<String> {
        self.schemas
            .get(schema_id)
            .map(|versions| versions.iter().map(|s| s.version().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn has_schema(&self, schema_id: &str) -> bool {
        self.schemas.contains_key(schema_id)
    }

    /// Registered schema IDs, sorted.
    pub fn schema_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.schemas.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn find(&self, schema_id: &str, version: &str) -> Option<Arc<CompiledSchema>> {
        self.schemas
            .get(schema_id)?
            .iter()
            .find(|schema| schema.version() == version)
            .cloned()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a JSON or YAML (`.yaml`/`.yml`) schema document, refusing files
/// larger than `max_bytes`.
pub fn load_document(path: &Path, max_bytes: usize) -> Result<Value> {
    let file = std::fs::File::open(path)
        .map_err(|err| ContractError::LoadFailed(format!("{}: {err}", path.display())))?;
    let metadata = file
        .metadata()
        .map_err(|err| ContractError::LoadFailed(format!("{}: {err}", path.display())))?;
    if !metadata.is_file() {
        return Err(ContractError::LoadFailed(format!(
            "not a regular file: {}",
            path.display()
        )));
    }
    if metadata.len() > max_bytes as u64 {
        return Err(ContractError::LoadFailed(format!(
            "schema file too large ({} bytes): {}",
            metadata.len(),
            path.display()
        )));
    }

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            ContractError::LoadFailed(format!("failed reading {}: {err}", path.display()))
        })?;
    if content.len() > max_bytes {
        return Err(ContractError::LoadFailed(format!(
            "schema file too large while reading: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    if matches!(extension.as_deref(), Some("yaml" | "yml")) {
        return parse_yaml(&content)
            .map_err(|err| ContractError::LoadFailed(format!("{}: {err}", path.display())));
    }
    serde_json::from_str(&content)
        .map_err(|err| ContractError::LoadFailed(format!("{}: {err}", path.display())))
}

/// Parse a YAML document into JSON. Scalar mapping keys (`200:`) become
/// strings.
pub fn parse_yaml(content: &str) -> std::result::Result<Value, String> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|err| err.to_string())?;
    yaml_to_json(document)
}

fn yaml_to_json(value: serde_yaml::Value) -> std::result::Result<Value, String> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(flag) => Value::Bool(flag),
        serde_yaml::Value::Number(number) => yaml_number(&number)?,
        serde_yaml::Value::String(text) => Value::String(text),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<std::result::Result<_, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = serde_json::Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_number(number: &serde_yaml::Number) -> std::result::Result<Value, String> {
    if let Some(value) = number.as_i64() {
        Ok(Value::from(value))
    } else if let Some(value) = number.as_u64() {
        Ok(Value::from(value))
    } else {
        number
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("number {number} has no JSON representation"))
    }
}

fn yaml_key(key: serde_yaml::Value) -> std::result::Result<String, String> {
    match key {
        serde_yaml::Value::String(text) => Ok(text),
        serde_yaml::Value::Number(number) => Ok(number.to_string()),
        serde_yaml::Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(format!("unsupported mapping key: {other:?}")),
    }
}

fn validate_schema_id(schema_id: &str) -> Result<()> {
    let valid = !schema_id.is_empty()
        && schema_id.len() <= 128
        && schema_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ContractError::InvalidInput(format!(
            "invalid schema id '{schema_id}': use letters, digits, '.', '_' or '-'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const V1: &str = include_str!("../../../schemas/calculator-api.json");
    const V2: &str = include_str!("../../../schemas/calculator-api-v2-breaking.json");
    const V1_YAML: &str = include_str!("../../../schemas/calculator-api.yaml");

    #[test]
    fn latest_is_last_registered() {
        let mut registry = SchemaRegistry::new();
        let (_, fresh) = registry.register("calculator-api", V1).unwrap();
        assert!(fresh);
        registry.register("calculator-api", V2).unwrap();

        assert_eq!(registry.versions("calculator-api"), vec!["1.0.0", "2.0.0"]);
        assert_eq!(registry.get("calculator-api", None).unwrap().version(), "2.0.0");
        assert_eq!(
            registry.get("calculator-api", Some("1.0.0")).unwrap().version(),
            "1.0.0"
        );
        assert_eq!(registry.schema_ids(), vec!["calculator-api"]);
    }

    #[test]
    fn identical_reregistration_is_idempotent() {
        let mut registry = SchemaRegistry::new();
        registry.register("calculator-api", V1).unwrap();
        let (schema, fresh) = registry.register("calculator-api", V1).unwrap();

        assert!(!fresh);
        assert_eq!(schema.version(), "1.0.0");
        assert_eq!(registry.versions("calculator-api").len(), 1);
    }

    #[test]
    fn changed_document_under_same_version_conflicts() {
        let mut registry = SchemaRegistry::new();
        registry.register("calculator-api", V1).unwrap();

        let mut altered: Value = serde_json::from_str(V1).unwrap();
        altered["info"]["title"] = Value::String("Renamed".to_string());
        assert!(matches!(
            registry.register_value("calculator-api", altered),
            Err(ContractError::VersionConflict { version, .. }) if version == "1.0.0"
        ));
    }

    #[test]
    fn unknown_schema_and_version_are_not_found() {
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.get("calculator-api", None),
            Err(ContractError::SchemaNotFound { version: None, .. })
        ));

        registry.register("calculator-api", V1).unwrap();
        assert!(matches!(
            registry.get("calculator-api", Some("9.9.9")),
            Err(ContractError::SchemaNotFound { version: Some(_), .. })
        ));
    }

    #[test]
    fn rejects_bad_schema_ids() {
        let mut registry = SchemaRegistry::new();
        for bad in ["", "has space", "slash/id", "../up"] {
            assert!(matches!(
                registry.register(bad, V1),
                Err(ContractError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn invalid_json_document_fails() {
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.register("calculator-api", "not-json"),
            Err(ContractError::InvalidJson(_))
        ));
    }

    #[test]
    fn register_file_reads_json_from_disk() {
        let dir = make_temp_dir("register-file");
        let path = dir.join("calculator-api.json");
        std::fs::write(&path, V1).unwrap();

        let mut registry = SchemaRegistry::new();
        let (schema, _) = registry.register_file("calculator-api", &path).unwrap();
        assert_eq!(schema.version(), "1.0.0");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = make_temp_dir("oversized");
        let path = dir.join("big.json");
        std::fs::write(&path, V1).unwrap();

        let mut registry = SchemaRegistry::with_config(RegistryConfig {
            max_schema_file_size: 64,
            ..RegistryConfig::default()
        });
        assert!(matches!(
            registry.register_file("calculator-api", &path),
            Err(ContractError::LoadFailed(message)) if message.contains("too large")
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn yaml_document_loads_like_its_json_twin() {
        let dir = make_temp_dir("yaml");
        let yaml = dir.join("calculator-api.yaml");
        std::fs::write(&yaml, V1_YAML).unwrap();

        let from_yaml = load_document(&yaml, 64 * 1024).unwrap();
        let from_json: Value = serde_json::from_str(V1).unwrap();
        assert_eq!(from_yaml, from_json);

        let mut registry = SchemaRegistry::new();
        let (schema, fresh) = registry.register_file("calculator-api", &yaml).unwrap();
        assert!(fresh);
        assert_eq!(schema.version(), "1.0.0");
        let (_, fresh) = registry.register("calculator-api", V1).unwrap();
        assert!(!fresh, "json twin should be the same document");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unquoted_status_keys_become_strings() {
        let value = parse_yaml("responses:\n  200:\n    description: ok\n").unwrap();
        assert_eq!(value["responses"]["200"]["description"], "ok");
    }

    #[test]
    fn malformed_yaml_and_missing_files_are_rejected() {
        let dir = make_temp_dir("bad-yaml");
        let yaml = dir.join("broken.yml");
        std::fs::write(&yaml, "openapi: [3.0.3\n").unwrap();

        assert!(matches!(
            load_document(&yaml, 1024),
            Err(ContractError::LoadFailed(message)) if message.contains("broken.yml")
        ));
        assert!(matches!(
            load_document(&dir.join("missing.json"), 1024),
            Err(ContractError::LoadFailed(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    fn make_temp_dir(label: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "cvtdemo-contract-{label}-{}-{nanos}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
