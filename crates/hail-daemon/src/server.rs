//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use hail_directory::PresenceDirectory;
use hail_dispatch::DispatchEngine;
use hail_ledger::TripLedger;
use hail_notify::Notifier;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Hail dispatch daemon server
pub struct Server {
    config: DaemonConfig,
    engine: Arc<DispatchEngine>,
}

impl Server {
    /// Wire the engine stack together from the given configuration.
    pub fn new(config: DaemonConfig) -> Self {
        let directory = Arc::new(PresenceDirectory::new());
        let ledger = Arc::new(TripLedger::new());
        let notifier = Arc::new(Notifier::with_history_capacity(
            directory.clone(),
            config.notify.history_capacity,
        ));
        let engine = Arc::new(DispatchEngine::new(ledger, directory, notifier));

        Self { config, engine }
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState::new(self.engine.clone(), shutdown_tx);
        let app = create_router(state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("hail daemon listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown_rx))
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("hail daemon shutting down");

        Ok(())
    }
}

/// Resolves on Ctrl+C, SIGTERM or an API shutdown request.
async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
        _ = shutdown_rx.changed() => {
            tracing::info!("Shutdown requested over the API");
        }
    }
}
