use cvtdemo::calculator::Operation;
use cvtdemo::contract::{ContractValidator, EndpointUsage, RegisterConsumerOptions};

use crate::cmd::connect;
use crate::exit::{contract_error, CliResult, SUCCESS};
use crate::output::{print_consumers, OutputFormat};
use crate::settings::ConsumerSettings;

/// Operations this consumer calls, each reading only `result`.
const USED_OPERATIONS: [Operation; 2] = [Operation::Add, Operation::Subtract];

pub async fn run(settings: &ConsumerSettings, format: Option<OutputFormat>) -> CliResult<i32> {
    let validator = connect(settings)?;
    let schema = validator
        .register_schema(&settings.schema_id, &settings.schema_path)
        .await
        .map_err(|err| contract_error("schema registration failed", err))?;

    let options = RegisterConsumerOptions {
        consumer_id: settings.consumer_id.clone(),
        consumer_version: settings.consumer_version.clone(),
        schema_id: schema.schema_id,
        schema_version: schema.version,
        environment: settings.environment.clone(),
        used_endpoints: USED_OPERATIONS
            .iter()
            .map(|op| EndpointUsage::new("GET", op.path(), &["result"]))
            .collect(),
    };
    let consumer = validator
        .register_consumer(options)
        .await
        .map_err(|err| contract_error("consumer registration failed", err))?;
    tracing::info!(
        consumer_id = %consumer.consumer_id,
        schema_id = %consumer.schema_id,
        schema_version = %consumer.schema_version,
        environment = %consumer.environment,
        "consumer registered"
    );

    print_consumers(&[consumer], OutputFormat::or_default(format));
    Ok(SUCCESS)
}
