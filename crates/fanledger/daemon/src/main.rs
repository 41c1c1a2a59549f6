//! Fanledger Daemon - JSON API for the fan-engagement points ledger
//!
//! The daemon provides:
//! - vote, alliance and donation endpoints backed by the transaction coordinator
//! - home, participant and playground read models
//! - administrative seeding and a ledger reconciliation report

use clap::Parser;
use fanledger_daemon::config::StorageConfig;
use fanledger_daemon::error::{DaemonError, DaemonResult};
use fanledger_daemon::{DaemonConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fanledger Daemon CLI
#[derive(Parser)]
#[command(name = "fanledgerd")]
#[command(about = "Fanledger Daemon - fan-engagement points ledger API", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FANLEDGER_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "FANLEDGER_LISTEN_ADDR")]
    listen: Option<String>,

    /// PostgreSQL URL; selects the postgres backend when set
    #[arg(long, env = "FANLEDGER_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "FANLEDGER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "FANLEDGER_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(url) = cli.database_url {
        config.storage = match config.storage {
            StorageConfig::Postgres {
                max_connections,
                connect_timeout_secs,
                statement_timeout_ms,
                ..
            } => StorageConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
                statement_timeout_ms,
            },
            StorageConfig::Memory => StorageConfig::Postgres {
                url,
                max_connections: 10,
                connect_timeout_secs: 5,
                statement_timeout_ms: 5_000,
            },
        };
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        storage = config.storage.backend_name(),
        "starting fanledgerd"
    );

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await
}
