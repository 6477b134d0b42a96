use cvtdemo::contract::ContractValidator;

use crate::cmd::connect;
use crate::exit::{contract_error, CliResult, SUCCESS};
use crate::output::{print_consumers, OutputFormat};
use crate::settings::ConsumerSettings;

pub async fn run(settings: &ConsumerSettings, format: Option<OutputFormat>) -> CliResult<i32> {
    let consumers = connect(settings)?
        .list_consumers(&settings.schema_id, &settings.environment)
        .await
        .map_err(|err| contract_error("listing consumers failed", err))?;
    print_consumers(&consumers, OutputFormat::or_default(format));
    Ok(SUCCESS)
}
