use std::sync::Arc;

use anyhow::Result;

use drivesim::config::CONFIG;
use drivesim::routing::RouteManager;
use drivesim::session::SessionStore;
use drivesim::util::setup_logging;
use drivesim::web::{AppState, WebServer};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(&CONFIG.general.log_level);
    info!("Application starting...");

    info!(
        "Default origin: ({}, {}), max step {}s",
        CONFIG.simulation.default_lat,
        CONFIG.simulation.default_lng,
        CONFIG.simulation.max_delta_time
    );

    // Create a shutdown signal channel
    let (shutdown_tx, _) = broadcast::channel(1);

    // Initialize services
    let sessions = Arc::new(SessionStore::new(
        CONFIG.simulation.origin(),
        CONFIG.simulation.max_delta_time,
    ));
    let routes = RouteManager::new(&CONFIG.routing)?;
    let web_server = WebServer::new(&CONFIG.web, AppState::new(sessions, routes));

    let web_handle = spawn_web_server(web_server, shutdown_tx.subscribe()).await;

    let shutdown_signal = async {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping services...");
                if shutdown_tx.send(()).is_err() {
                    error!("No service was listening for the shutdown signal");
                }
            }
            Err(err) => {
                error!("Failed to listen for shutdown signal: {}", err);
            }
        }
    };

    let (web_result, _) = tokio::join!(web_handle, shutdown_signal);
    if let Err(e) = web_result {
        error!("Web server join error: {}", e);
    }

    info!("All services stopped, shutting down");

    Ok(())
}

async fn spawn_web_server(
    server: WebServer,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let stopper = server.clone();
    tokio::spawn(async move {
        if shutdown.recv().await.is_ok() {
            info!("Shutting down web server...");
            stopper.stop().await;
        }
    });

    tokio::spawn(async move {
        if let Err(e) = server.start().await {
            error!("Web server error: {:#}", e);
        }
    })
}
