mod cmd;
mod exit;
mod output;
mod settings;

use clap::Parser;
use cvtdemo::logging::LogArgs;

use crate::cmd::Command;
use crate::output::OutputFormat;
use crate::settings::ConsumerSettings;

#[derive(Parser, Debug)]
#[command(
    name = "consumer4",
    version,
    about = "Calculator client with consumer-driven contract checks"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    #[command(flatten)]
    log: LogArgs,

    #[command(flatten)]
    settings: ConsumerSettings,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit::FAILURE
            } else {
                exit::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    cli.log.init();

    match cmd::run(cli.command, &cli.settings, cli.format).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_calculation_with_validate_flag() {
        let cli = Cli::try_parse_from(["consumer4", "add", "5", "3", "--validate"])
            .expect("add args should parse");
        match cli.command {
            Command::Add(args) => {
                assert_eq!(args.x, "5");
                assert_eq!(args.y, "3");
                assert!(args.validate);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn accepts_negative_operands() {
        let cli = Cli::try_parse_from(["consumer4", "subtract", "-5", "-2.5"])
            .expect("negative operands should parse");
        assert!(matches!(cli.command, Command::Subtract(ref args) if args.x == "-5"));
    }

    #[test]
    fn rejects_unknown_operation() {
        let err = Cli::try_parse_from(["consumer4", "modulo", "5", "3"])
            .expect_err("unknown subcommand should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn parses_can_i_deploy() {
        let cli = Cli::try_parse_from([
            "consumer4",
            "can-i-deploy",
            "--schema-version",
            "2.0.0",
            "--format",
            "json",
        ])
        .expect("can-i-deploy args should parse");
        assert!(matches!(
            cli.command,
            Command::CanIDeploy(ref args) if args.schema_version == "2.0.0"
        ));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
