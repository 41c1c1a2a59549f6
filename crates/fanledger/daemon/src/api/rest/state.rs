//! Application state for API handlers

use fanledger_service::FanLedger;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Ledger facade
    pub ledger: FanLedger,

    /// Storage backend name
    pub storage_backend: &'static str,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(ledger: FanLedger, storage_backend: &'static str) -> Self {
        Self {
            ledger,
            storage_backend,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        }
    }
}
