use std::path::PathBuf;

use clap::{ArgAction, Args};
use cvtdemo_adapters::ValidationMode;

/// Settings for the calculator process, from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct ProducerSettings {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 10001)]
    pub port: u16,

    /// Interface to bind.
    #[arg(long, env = "CALCULATOR_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Contract validator, as `host:port` or a URL.
    #[arg(long, env = "CVT_SERVER_ADDR", default_value = "localhost:9550")]
    pub cvt_server_addr: String,

    /// Schema registered with the validator at startup.
    #[arg(
        long,
        env = "SCHEMA_PATH",
        default_value = "./schemas/calculator-api.json"
    )]
    pub schema_path: PathBuf,

    #[arg(long, env = "CVT_SCHEMA_ID", default_value = "calculator-api")]
    pub schema_id: String,

    /// Wrap the routes in contract validation. Only `false` turns it off.
    #[arg(
        long,
        env = "CVT_ENABLED",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = parse_enabled
    )]
    pub cvt_enabled: bool,

    /// What to do with a contract violation: strict, warn or shadow.
    #[arg(long, env = "CVT_MODE", default_value_t = ValidationMode::Strict)]
    pub mode: ValidationMode,
}

impl ProducerSettings {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_enabled(raw: &str) -> Result<bool, String> {
    Ok(!raw.trim().eq_ignore_ascii_case("false"))
}
