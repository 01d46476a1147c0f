use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use tracing::info;

use super::handlers::{self, AppState};
use crate::config::WebConfig;

#[derive(Clone)]
pub struct WebServer {
    state: AppState,
    host: String,
    port: u16,
    running: Arc<AtomicBool>,
}

impl WebServer {
    pub fn new(config: &WebConfig, state: AppState) -> Self {
        Self {
            state,
            host: config.host.clone(),
            port: config.port,
            // set before start() so an early stop() is not overwritten
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Serve until [`WebServer::stop`] is called, letting in-flight requests
    /// finish.
    pub async fn start(&self) -> Result<()> {
        let app = handlers::routes(self.state.clone());

        let addr = format!("{}:{}", self.host, self.port);
        info!("Starting web server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .context(format!("Failed to bind to {}", addr))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(Self::shutdown_signal(self.running.clone()))
            .await
            .context("Failed to serve")?;

        info!("Web server stopped");
        Ok(())
    }

    async fn shutdown_signal(running: Arc<AtomicBool>) {
        while running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
