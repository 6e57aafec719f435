//! Multi-room WebSocket Chat Relay - Entry Point
//!
//! Loads configuration, creates the default room and serves until Ctrl+C
//! or SIGTERM. Exits 0 after a clean shutdown and 1 if startup fails.

use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use room_hub::{serve, shutdown_signal, Cli, Config, Hub, StartupError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter())),
        )
        .with_file(config.log_caller)
        .with_line_number(config.log_caller)
        .init();

    match run(config).await {
        Ok(()) => {
            info!("Exit.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server exited with an error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let hub = Hub::new(config.hub_settings());
    hub.create_default_room(&config.default_room, config.default_room_capacity)
        .await?;

    let listener = TcpListener::bind(&config.listen_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listen_address.clone(),
            source,
        })?;
    info!("Chat relay listening on {}", config.listen_address);

    serve(listener, hub, shutdown_signal())
        .await
        .map_err(StartupError::Serve)
}
