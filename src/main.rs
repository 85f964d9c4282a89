mod command;
mod config;
mod daemon;
mod power;
mod program;
mod session;
mod streamer;
mod transport;

use config::ControlConfig;
use daemon::{CommandSink, DaemonClient};
use std::sync::Arc;
use streamer::StreamerProcess;
use tokio::net::TcpListener;
use transport::TcpConnector;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ControlConfig::from_env()?;

    info!("Tank control plane starting");
    info!("  Pin daemon: {}", config.daemon.address);
    info!("  Control: {}", config.control_address);
    info!("  Programs: {}", config.program_address);

    // One daemon connection shared by every session and program
    let daemon: Arc<dyn CommandSink> = Arc::new(DaemonClient::new(TcpConnector::new(
        config.daemon.address.clone(),
    )));

    let streamer = StreamerProcess::new(config.streamer.clone());
    if config.streamer_enabled {
        if streamer.is_running() {
            info!("[STREAMER] replacing instance left by a previous run");
        }
        match streamer.start(None, None).await {
            Ok(pid) => info!("[STREAMER] started with pid {}", pid),
            Err(e) => error!("[STREAMER] failed to start: {:#}", e),
        }
    }

    let control_listener = TcpListener::bind(&config.control_address).await?;
    let program_listener = TcpListener::bind(&config.program_address).await?;

    let control = tokio::spawn(session::serve_control(control_listener, daemon.clone()));
    let uploads = tokio::spawn(program::serve_uploads(program_listener, daemon.clone()));

    tokio::select! {
        result = control => {
            error!("[SERVER] control listener stopped: {:?}", result);
        }
        result = uploads => {
            error!("[SERVER] program listener stopped: {:?}", result);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    if config.streamer_enabled && streamer.is_running() {
        streamer.stop().await;
    }

    Ok(())
}
