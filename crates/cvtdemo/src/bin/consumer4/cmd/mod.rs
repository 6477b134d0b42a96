use clap::{Args, Subcommand};
use cvtdemo::calculator::Operation;
use cvtdemo::service::RemoteValidator;

use crate::exit::{contract_error, CliResult};
use crate::output::OutputFormat;
use crate::settings::ConsumerSettings;

pub mod calc;
pub mod consumers;
pub mod deploy;
pub mod register;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add two numbers.
    Add(CalcArgs),
    /// Subtract the second number from the first.
    Subtract(CalcArgs),
    /// Register this consumer's endpoint usage with the validator.
    Register(RegisterArgs),
    /// List consumers registered for the schema.
    Consumers(ConsumersArgs),
    /// Check whether a schema version is safe for the registered consumers.
    CanIDeploy(DeployArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(
    command: Command,
    settings: &ConsumerSettings,
    format: Option<OutputFormat>,
) -> CliResult<i32> {
    match command {
        Command::Add(args) => calc::run(Operation::Add, args, settings, format).await,
        Command::Subtract(args) => calc::run(Operation::Subtract, args, settings, format).await,
        Command::Register(_) => register::run(settings, format).await,
        Command::Consumers(_) => consumers::run(settings, format).await,
        Command::CanIDeploy(args) => deploy::run(args, settings, format).await,
        Command::Version(args) => version::run(args),
    }
}

/// Client for the validator named in `settings`.
pub fn connect(settings: &ConsumerSettings) -> CliResult<RemoteValidator> {
    RemoteValidator::connect(&settings.cvt_server_addr)
        .map_err(|err| contract_error("invalid validator address", err))
}

#[derive(Args, Debug)]
pub struct CalcArgs {
    /// First operand.
    #[arg(allow_negative_numbers = true)]
    pub x: String,
    /// Second operand.
    #[arg(allow_negative_numbers = true)]
    pub y: String,
    /// Check the exchange against the contract; a violation exits 1.
    #[arg(long)]
    pub validate: bool,
}

#[derive(Args, Debug, Default)]
pub struct RegisterArgs {}

#[derive(Args, Debug, Default)]
pub struct ConsumersArgs {}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Candidate schema version.
    #[arg(long, value_name = "VERSION")]
    pub schema_version: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build details.
    #[arg(long)]
    pub extended: bool,
}
