// crates/server/src/jobs/fetcher.rs
//! The Fetch Worker Adapter: boundary trait over the external ads-fetch
//! capability, plus its two implementations.
//!
//! Availability is decided once at startup — `main` constructs either a
//! `CommandFetcher` (a fetch program is configured) or a `DisabledFetcher`
//! (it is not) and injects it as `Arc<dyn AdsFetcher>`. Nothing re-probes
//! availability per call.

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;

/// Result of one external fetch run.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub success: bool,
    pub log: String,
    pub ads_count: i64,
}

/// Boundary over the opaque external fetch capability.
#[async_trait]
pub trait AdsFetcher: Send + Sync {
    /// Run a fetch for the user's competitors on the given platform scope.
    ///
    /// Never returns an error: any failure mode is expressed as
    /// `success = false` with diagnostic log text, so the executor has a
    /// single finalization path.
    async fn run_for_user(&self, user_id: &str, platform: &str) -> FetchOutcome;

    /// Whether the underlying capability is configured at all.
    fn available(&self) -> bool {
        true
    }
}

/// Spawns the configured external fetch program.
///
/// Contract with the program: argv is `<user_id> <platform>`, combined
/// stdout+stderr is the job log, exit status 0 means success, and the ads
/// count is reported on a trailing stdout line `ads_fetched=<n>` (0 when
/// the line is absent).
pub struct CommandFetcher {
    program: String,
}

impl CommandFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn parse_ads_count(stdout: &str) -> i64 {
        stdout
            .lines()
            .rev()
            .find_map(|line| line.trim().strip_prefix("ads_fetched="))
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(0)
    }
}

#[async_trait]
impl AdsFetcher for CommandFetcher {
    async fn run_for_user(&self, user_id: &str, platform: &str) -> FetchOutcome {
        tracing::info!(program = %self.program, user_id, platform, "spawning fetch program");

        let output = Command::new(&self.program)
            .arg(user_id)
            .arg(platform)
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let mut log = stdout.to_string();
                if !stderr.is_empty() {
                    log.push_str("\n--- stderr ---\n");
                    log.push_str(&stderr);
                }
                FetchOutcome {
                    success: output.status.success(),
                    ads_count: Self::parse_ads_count(&stdout),
                    log,
                }
            }
            Err(e) => {
                tracing::error!(program = %self.program, error = %e, "failed to spawn fetch program");
                FetchOutcome {
                    success: false,
                    log: format!("Failed to spawn fetch program {}: {}", self.program, e),
                    ads_count: 0,
                }
            }
        }
    }
}

/// Stand-in used when no fetch program was configured at startup.
///
/// Fails fast with a fixed diagnostic log and `ads_count = 0`, without
/// invoking anything. This is a dependency-presence gate, not a retry path.
pub struct DisabledFetcher;

#[async_trait]
impl AdsFetcher for DisabledFetcher {
    async fn run_for_user(&self, user_id: &str, platform: &str) -> FetchOutcome {
        let log = format!(
            "=== ADS FETCHING DISABLED ===\n\
             User ID: {}\n\
             Platform: {}\n\
             Error: Ads fetcher not properly configured\n\
             Timestamp: {}\n\
             \n\
             To fix: set ADSCOPE_FETCH_COMMAND to the fetch program path and restart the service.\n",
            user_id,
            platform,
            Utc::now().to_rfc3339(),
        );
        FetchOutcome {
            success: false,
            log,
            ads_count: 0,
        }
    }

    fn available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_fetcher_fails_fast() {
        let fetcher = DisabledFetcher;
        assert!(!fetcher.available());

        let outcome = fetcher.run_for_user("user-1", "all").await;
        assert!(!outcome.success);
        assert_eq!(outcome.ads_count, 0);
        assert!(outcome.log.contains("ADS FETCHING DISABLED"));
        assert!(outcome.log.contains("user-1"));
    }

    #[test]
    fn test_parse_ads_count_trailing_line() {
        let stdout = "fetching meta\nfetching google\nads_fetched=42\n";
        assert_eq!(CommandFetcher::parse_ads_count(stdout), 42);
    }

    #[test]
    fn test_parse_ads_count_absent() {
        assert_eq!(CommandFetcher::parse_ads_count("no counter here"), 0);
        assert_eq!(CommandFetcher::parse_ads_count("ads_fetched=junk"), 0);
    }

    #[tokio::test]
    async fn test_command_fetcher_spawn_failure_is_outcome() {
        let fetcher = CommandFetcher::new("/nonexistent/fetch-program");
        let outcome = fetcher.run_for_user("user-1", "meta").await;
        assert!(!outcome.success);
        assert_eq!(outcome.ads_count, 0);
        assert!(outcome.log.contains("Failed to spawn"));
    }
}
