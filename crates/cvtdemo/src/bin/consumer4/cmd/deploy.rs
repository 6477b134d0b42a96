use cvtdemo::contract::ContractValidator;

use crate::cmd::{connect, DeployArgs};
use crate::exit::{contract_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_deploy, OutputFormat};
use crate::settings::ConsumerSettings;

/// Exits 1 when the candidate would break a registered consumer.
pub async fn run(
    args: DeployArgs,
    settings: &ConsumerSettings,
    format: Option<OutputFormat>,
) -> CliResult<i32> {
    let verdict = connect(settings)?
        .can_i_deploy(
            &settings.schema_id,
            &args.schema_version,
            &settings.environment,
        )
        .await
        .map_err(|err| contract_error("deploy check failed", err))?;
    print_deploy(&verdict, OutputFormat::or_default(format));
    Ok(if verdict.safe_to_deploy {
        SUCCESS
    } else {
        FAILURE
    })
}
