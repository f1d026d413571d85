//! SigV4 signing reverse proxy.
//!
//! ```text
//! client ─▶ http server ─▶ auth policy ─▶ route table ─▶ signing forwarder ─▶ AWS target
//!                                                              │
//!                                                credential manager (per route)
//!                                                default chain │ STS AssumeRole
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_sigv4::config::load_config;
use proxy_sigv4::lifecycle::{spawn_signal_handler, Shutdown};
use proxy_sigv4::observability::{init_logging, init_metrics};
use proxy_sigv4::{AwsProviderFactory, HttpServer};

#[derive(Debug, Parser)]
#[command(name = "proxy-sigv4", version, about = "Reverse proxy that signs requests with AWS SigV4")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "PROXY_SIGV4_CONFIG", default_value = "app-config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "proxy-sigv4 starting"
    );

    tracing::info!(
        bind_address = %config.server.bind_address,
        base_path = %config.server.base_path,
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let factory = AwsProviderFactory::new();
    let server = HttpServer::build(config.clone(), &factory).await?;
    if server.routes().is_empty() {
        tracing::warn!("No routes configured; every request will get 404");
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());
    server.run(listener, shutdown.listener()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
