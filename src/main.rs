use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gatekeeper::config::ConfigOverrides;
use api_gatekeeper::http::HttpServer;
use api_gatekeeper::lifecycle::{self, startup, Shutdown};
use api_gatekeeper::observability::{logging, metrics};

/// Request-admission gateway: rate limiting, authentication, authorization and CORS.
#[derive(Parser, Debug)]
#[command(name = "api-gatekeeper", version, about)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:4000.
    #[arg(long)]
    bind: Option<String>,

    /// Enable or disable the per-client rate limiter.
    #[arg(long)]
    limiter_enabled: Option<bool>,

    /// Sustained requests per second per client.
    #[arg(long)]
    limiter_rps: Option<f64>,

    /// Maximum burst per client.
    #[arg(long)]
    limiter_burst: Option<u32>,

    /// Trusted CORS origins, space separated.
    #[arg(long, value_delimiter = ' ', num_args = 1..)]
    cors_trusted_origins: Option<Vec<String>>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_address: self.bind.clone(),
            limiter_enabled: self.limiter_enabled,
            limiter_rps: self.limiter_rps,
            limiter_burst: self.limiter_burst,
            trusted_origins: self.cors_trusted_origins.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = startup::load(cli.config.as_deref(), cli.overrides())?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gatekeeper starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = %config.listener.environment,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let collaborators = startup::collaborators(&config.store)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    lifecycle::spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config, collaborators);
    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
