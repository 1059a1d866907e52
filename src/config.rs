//! Dashboard configuration.

use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the status backend, no trailing slash.
    pub base_url: String,
    /// Poll interval applied to every status resource.
    pub poll_interval: Duration,
    /// Per-request timeout; a hung request becomes an Error panel
    /// instead of an indefinite loading state.
    pub request_timeout: Duration,
    /// Cap on the exponential backoff applied after consecutive failures.
    pub max_backoff: Duration,
    /// Process whose health drives the overall processes badge.
    pub primary_process: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let base_url = std::env::var("DASHBOARD_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());

        let poll_interval = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let request_timeout = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);

        let max_backoff = std::env::var("MAX_BACKOFF_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let primary_process = std::env::var("PRIMARY_PROCESS")
            .unwrap_or_else(|_| "run_stack_handler".to_string());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(poll_interval),
            request_timeout: Duration::from_secs(request_timeout),
            max_backoff: Duration::from_secs(max_backoff),
            primary_process,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(15),
            max_backoff: Duration::from_secs(300),
            primary_process: "run_stack_handler".to_string(),
        }
    }
}
