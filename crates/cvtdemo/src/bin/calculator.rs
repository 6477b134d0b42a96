use clap::Parser;
use cvtdemo::calculator::{serve, ProducerSettings};
use cvtdemo::logging::LogArgs;

#[derive(Parser, Debug)]
#[command(name = "calculator", version, about = "Calculator API (contract demo producer)")]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    #[command(flatten)]
    settings: ProducerSettings,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.log.init();

    if let Err(err) = serve(cli.settings).await {
        eprintln!("Error: calculator failed: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_producer_flags() {
        let cli = Cli::try_parse_from(["calculator", "--port", "0", "--cvt-enabled", "false"])
            .expect("calculator args should parse");
        assert_eq!(cli.settings.port, 0);
        assert!(!cli.settings.cvt_enabled);
    }
}
