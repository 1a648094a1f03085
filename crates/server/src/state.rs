// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use adscope_db::Database;

use crate::config::ServerConfig;
use crate::jobs::AdsFetcher;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Configuration read once at startup.
    pub config: ServerConfig,
    /// Database handle; the only shared mutable resource of the job
    /// subsystem.
    pub db: Database,
    /// The fetch capability chosen at startup. `DisabledFetcher` when no
    /// fetch program is configured.
    pub fetcher: Arc<dyn AdsFetcher>,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(db: Database, config: ServerConfig, fetcher: Arc<dyn AdsFetcher>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            config,
            db,
            fetcher,
        })
    }

    /// Test state: in-memory DB, test config, disabled fetcher.
    pub async fn for_tests() -> Arc<Self> {
        let db = Database::new_in_memory().await.expect("in-memory DB");
        Self::new(
            db,
            ServerConfig::for_tests(),
            Arc::new(crate::jobs::DisabledFetcher),
        )
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_new() {
        let state = AppState::for_tests().await;
        assert!(state.uptime_secs() < 1);
        assert!(!state.fetcher.available());
    }

    #[tokio::test]
    async fn test_app_state_shared_clone() {
        let state = AppState::for_tests().await;
        let cloned = state.clone();
        assert_eq!(state.uptime_secs(), cloned.uptime_secs());
    }
}
