use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use cvtdemo::calculator::Operation;
use cvtdemo::contract::{CanIDeployResult, ConsumerInfo};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }

    pub fn or_default(format: Option<Self>) -> Self {
        format.unwrap_or_else(Self::default_for_stdout)
    }
}

#[derive(Serialize)]
pub struct Calculation {
    pub operation: Operation,
    pub x: f64,
    pub y: f64,
    pub result: f64,
}

/// The result line is the default whatever stdout is; JSON and tables only
/// when asked for.
pub fn print_calculation(calculation: &Calculation, format: Option<OutputFormat>) {
    match format {
        Some(OutputFormat::Json) => print_json(calculation),
        Some(OutputFormat::Table) => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OPERATION", "X", "Y", "RESULT"])
                .add_row(vec![
                    calculation.operation.to_string(),
                    format_number(calculation.x),
                    format_number(calculation.y),
                    format_number(calculation.result),
                ]);
            println!("{table}");
        }
        Some(OutputFormat::Pretty) | None => println!(
            "{} {} {} = {}",
            format_number(calculation.x),
            calculation.operation.symbol(),
            format_number(calculation.y),
            format_number(calculation.result)
        ),
    }
}

pub fn print_consumers(consumers: &[ConsumerInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&consumers),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "CONSUMER",
                    "VERSION",
                    "SCHEMA",
                    "ENVIRONMENT",
                    "ENDPOINTS",
                ]);
            for consumer in consumers {
                table.add_row(vec![
                    consumer.consumer_id.clone(),
                    consumer.consumer_version.clone(),
                    format!("{}@{}", consumer.schema_id, consumer.schema_version),
                    consumer.environment.clone(),
                    endpoint_summary(consumer),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if consumers.is_empty() {
                println!("no consumers registered");
            }
            for consumer in consumers {
                println!(
                    "consumer={} version={} schema={}@{} environment={} endpoints={}",
                    consumer.consumer_id,
                    consumer.consumer_version,
                    consumer.schema_id,
                    consumer.schema_version,
                    consumer.environment,
                    endpoint_summary(consumer)
                );
            }
        }
    }
}

pub fn print_deploy(result: &CanIDeployResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Table => {
            println!("{}", result.summary);
            if result.breaking_changes.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CONSUMER", "KIND", "ENDPOINT", "DESCRIPTION"]);
            for change in &result.breaking_changes {
                table.add_row(vec![
                    format!("{}@{}", change.consumer_id, change.consumer_version),
                    kind_label(change),
                    format!("{} {}", change.method, change.path),
                    change.description.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let verdict = if result.safe_to_deploy { "SAFE" } else { "UNSAFE" };
            println!("{verdict}: {}", result.summary);
            for change in &result.breaking_changes {
                println!("  - [{}] {}", change.consumer_id, change.description);
            }
        }
    }
}

/// Integral values print without a fraction; `-0` prints as `0`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn endpoint_summary(consumer: &ConsumerInfo) -> String {
    consumer
        .used_endpoints
        .iter()
        .map(|endpoint| {
            format!(
                "{} {} [{}]",
                endpoint.method,
                endpoint.path,
                endpoint.used_fields.join(",")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn kind_label(change: &cvtdemo::contract::BreakingChange) -> String {
    serde_json::to_value(change.kind)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", change.kind))
}
