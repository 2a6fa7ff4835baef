use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gateguard::config::{load_config, GatewayConfig};
use gateguard::http::HttpServer;
use gateguard::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "gateguard")]
#[command(version, about = "Request defense gateway", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gateguard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limiting = config.rate_limit.enabled,
        csrf = config.csrf.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
