use clap::Parser;
use cvtdemo::logging::LogArgs;
use cvtdemo::service::{prepare_validator, serve, ServerSettings};

#[derive(Parser, Debug)]
#[command(name = "cvt-server", version, about = "Contract validation service")]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    #[command(flatten)]
    settings: ServerSettings,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.log.init();

    if let Err(message) = run(cli.settings).await {
        eprintln!("Error: {message}");
        std::process::exit(1);
    }
}

async fn run(settings: ServerSettings) -> Result<(), String> {
    let validator = prepare_validator(&settings)
        .await
        .map_err(|err| format!("failed to preload schemas: {err}"))?;
    let listener = tokio::net::TcpListener::bind(&settings.listen_addr)
        .await
        .map_err(|err| format!("failed to bind {}: {err}", settings.listen_addr))?;
    serve(listener, validator)
        .await
        .map_err(|err| format!("server failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_flags() {
        let cli = Cli::try_parse_from([
            "cvt-server",
            "--listen-addr",
            "127.0.0.1:0",
            "--preload",
            "calculator-api=schemas/calculator-api.json",
            "--log-format",
            "json",
        ])
        .expect("server args should parse");
        assert_eq!(cli.settings.listen_addr, "127.0.0.1:0");
        assert_eq!(cli.settings.preload.len(), 1);
    }
}
