//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use fanledger_service::FanLedger;
use fanledger_storage::memory::InMemoryLedgerStore;
use fanledger_storage::postgres::PostgresLedgerStore;
use fanledger_storage::LedgerStore;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Fanledger Daemon Server
pub struct Server {
    config: DaemonConfig,
    ledger: FanLedger,
}

impl Server {
    /// Create a new server, connecting the configured storage backend
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let store = connect_store(&config.storage).await?;
        let ledger = FanLedger::with_storage(store, config.economy);

        Ok(Self { config, ledger })
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.ledger, self.config.storage.backend_name());
        let app = create_router(state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            %addr,
            storage = self.config.storage.backend_name(),
            vote_cost = self.config.economy.vote_cost,
            alliance_cost = self.config.economy.alliance_cost,
            "fanledger daemon listening"
        );

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("fanledger daemon shutting down");
        Ok(())
    }
}

async fn connect_store(config: &StorageConfig) -> DaemonResult<Arc<dyn LedgerStore>> {
    match config {
        StorageConfig::Memory => {
            tracing::warn!("using in-memory storage; ledger state is lost on restart");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
            statement_timeout_ms,
        } => {
            let store = PostgresLedgerStore::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
                *statement_timeout_ms,
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
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
    }
}
