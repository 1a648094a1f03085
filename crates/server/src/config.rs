// crates/server/src/config.rs
//! Server configuration, read once from the environment in `main` and
//! injected into `AppState`. Nothing in here is consulted as a global.

use std::time::Duration;

/// Default port for the server.
const DEFAULT_PORT: u16 = 5020;

/// Default bound on a single adapter invocation.
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

/// Days until an issued token expires.
const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to bind.
    pub port: u16,
    /// HS256 signing secret for issued tokens.
    pub jwt_secret: String,
    /// Token lifetime in days.
    pub token_ttl_days: i64,
    /// External fetch program. `None` means the fetch capability was never
    /// configured; every job then fails fast with a fixed diagnostic.
    pub fetch_command: Option<String>,
    /// Upper bound on one adapter invocation; elapsed timeouts finalize the
    /// job as failed.
    pub fetch_timeout: Duration,
}

impl ServerConfig {
    /// Read configuration from the environment.
    ///
    /// - `ADSCOPE_PORT` (or `PORT`)
    /// - `ADSCOPE_JWT_SECRET` — required for production; a fixed development
    ///   fallback is used when unset so local runs work out of the box.
    /// - `ADSCOPE_FETCH_COMMAND` — path to the external fetch program;
    ///   unset means the fetcher is unavailable.
    /// - `ADSCOPE_FETCH_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let port = std::env::var("ADSCOPE_PORT")
            .ok()
            .or_else(|| std::env::var("PORT").ok())
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let jwt_secret = std::env::var("ADSCOPE_JWT_SECRET")
            .unwrap_or_else(|_| "adscope-dev-secret-change-in-production".to_string());

        let fetch_command = std::env::var("ADSCOPE_FETCH_COMMAND")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let fetch_timeout = std::env::var("ADSCOPE_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS));

        Self {
            port,
            jwt_secret,
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            fetch_command,
            fetch_timeout,
        }
    }

    /// A fixed configuration for tests: no external fetcher, short timeout.
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            jwt_secret: "test-secret".to_string(),
            token_ttl_days: 1,
            fetch_command: None,
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::for_tests();
        assert_eq!(config.jwt_secret, "test-secret");
        assert!(config.fetch_command.is_none());
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
    }
}
