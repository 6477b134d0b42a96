use std::path::PathBuf;

use clap::Args;

/// Where consumer4 finds the producer and the validator, and who it is.
#[derive(Args, Debug, Clone)]
pub struct ConsumerSettings {
    /// Calculator base URL.
    #[arg(
        long,
        env = "PRODUCER_URL",
        default_value = "http://localhost:10001",
        global = true
    )]
    pub producer_url: String,

    /// Contract validator, as `host:port` or a URL.
    #[arg(
        long,
        env = "CVT_SERVER_ADDR",
        default_value = "localhost:9550",
        global = true
    )]
    pub cvt_server_addr: String,

    /// Schema registered before validating or registering.
    #[arg(
        long,
        env = "SCHEMA_PATH",
        default_value = "./schemas/calculator-api.json",
        global = true
    )]
    pub schema_path: PathBuf,

    #[arg(long, env = "CVT_SCHEMA_ID", default_value = "calculator-api", global = true)]
    pub schema_id: String,

    #[arg(long, env = "CVT_ENVIRONMENT", default_value = "demo", global = true)]
    pub environment: String,

    #[arg(long, env = "CONSUMER_ID", default_value = "consumer-4", global = true)]
    pub consumer_id: String,

    #[arg(long, env = "CONSUMER_VERSION", default_value = "1.0.0", global = true)]
    pub consumer_version: String,
}
