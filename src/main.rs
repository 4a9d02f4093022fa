//! Demo server for request-insights.
//!
//! Serves a few endpoints wrapped by the tracking middleware and submits the
//! resulting telemetry to the configured client.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use request_insights::config::{load_with_overrides, ClientKind, ConfigOverrides};
use request_insights::observability::{logging, metrics};
use request_insights::telemetry::{ChannelClient, LoggingClient, MemoryClient, TelemetryClient};
use request_insights::InsightsServer;

#[derive(Parser)]
#[command(name = "insights-demo")]
#[command(about = "Demo server with request telemetry", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Instrumentation key, overriding the configuration file.
    #[arg(short, long)]
    ikey: Option<String>,

    /// Bind address, overriding the configuration file.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        instrumentation_key: cli.ikey,
        bind_address: cli.bind,
    };
    let config = load_with_overrides(cli.config.as_deref(), overrides)?;

    logging::init_logging(&config.observability);
    tracing::info!("insights-demo v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        client = ?config.telemetry.client,
        transaction_header = %config.telemetry.transaction_header,
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

    let memory = Arc::new(MemoryClient::new());
    let client: Arc<dyn TelemetryClient> = match config.telemetry.client {
        ClientKind::Logging => Arc::new(LoggingClient::new()),
        ClientKind::Memory => memory.clone(),
        ClientKind::Channel => {
            let (client, mut rx) = ChannelClient::new(config.telemetry.channel_capacity);
            // Stand-in transport: drain the queue into the debug log.
            tokio::spawn(async move {
                while let Some(envelope) = rx.recv().await {
                    tracing::debug!(
                        ikey = %envelope.instrumentation_key,
                        kind = envelope.item.kind(),
                        "Telemetry delivered"
                    );
                }
            });
            Arc::new(client)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    InsightsServer::new(config, client).run(listener).await?;

    if !memory.is_empty() {
        tracing::info!(records = memory.len(), "Telemetry records kept in memory");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
