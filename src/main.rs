use std::sync::Arc;

use clap::Parser;

use helm_server::handlers::HandlerState;
use helm_server::{start, ServerConfig};
use helm_store::{MemoryMediaStore, MemoryStore, PrefixCodeGenerator};
use helm_telemetry::{init_telemetry, TelemetryConfig};

/// Operations console backend.
#[derive(Parser)]
#[command(name = "helm", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 9300)]
    port: u16,

    /// Emit JSON-formatted log lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_telemetry(&TelemetryConfig {
        json_output: args.json_logs,
        ..Default::default()
    });

    tracing::info!("starting helm console server");

    // Development wiring: in-memory reference implementations of the
    // document store, object storage, and code generator contracts.
    let handler_state = Arc::new(HandlerState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryMediaStore::new()),
        Arc::new(PrefixCodeGenerator::new()),
    ));

    let config = ServerConfig {
        port: args.port,
        ..Default::default()
    };
    let handle = start(config, handler_state)
        .await
        .expect("failed to start server");

    tracing::info!(port = handle.port, "helm console ready");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");

    tracing::info!("shutting down");
}
