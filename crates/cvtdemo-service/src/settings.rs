use std::path::PathBuf;

use clap::Args;
use cvtdemo_contract::RegistryConfig;

/// Settings for the `cvt-server` process.
#[derive(Args, Debug, Clone)]
pub struct ServerSettings {
    /// Address to listen on.
    #[arg(long, env = "CVT_LISTEN_ADDR", default_value = "0.0.0.0:9550")]
    pub listen_addr: String,

    /// Schema to register at startup (repeatable).
    #[arg(long, value_name = "ID=PATH", value_parser = parse_preload)]
    pub preload: Vec<PreloadSchema>,

    /// Reject properties not declared by request/response body schemas.
    #[arg(long)]
    pub strict_schemas: bool,

    /// Maximum size of a schema file read from disk.
    #[arg(
        long,
        value_name = "BYTES",
        default_value_t = RegistryConfig::default().max_schema_file_size
    )]
    pub max_schema_bytes: usize,
}

impl ServerSettings {
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            strict_mode: self.strict_schemas,
            max_schema_file_size: self.max_schema_bytes,
            ..RegistryConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadSchema {
    pub schema_id: String,
    pub path: PathBuf,
}

fn parse_preload(raw: &str) -> Result<PreloadSchema, String> {
    let (schema_id, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=PATH, got '{raw}'"))?;
    if schema_id.trim().is_empty() || path.trim().is_empty() {
        return Err(format!("expected ID=PATH, got '{raw}'"));
    }
    Ok(PreloadSchema {
        schema_id: schema_id.trim().to_string(),
        path: PathBuf::from(path.trim()),
    })
}
