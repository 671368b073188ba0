use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub gate: GateConfig,
}

/// Waiting-room gate configuration.
///
/// The endpoint differs per protected API server, so it has no default.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GateConfig {
    /// Gate endpoint URL (e.g., "https://nf.example.com/ts.wseq")
    pub endpoint: String,
    /// Delay between status checks while queued, in milliseconds (default: 1000)
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u32,
    /// Upper bound on the time spent queued, in seconds. Unbounded when absent.
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
    /// Service id sent with ticket requests and dispatches
    #[serde(default = "default_service_id")]
    pub service_id: String,
    /// Action id sent with ticket requests and dispatches
    #[serde(default = "default_action_id")]
    pub action_id: String,
}

impl GateConfig {
    /// Create a gate config for the given endpoint with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            retry_interval_ms: default_retry_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_wait_secs: None,
            service_id: default_service_id(),
            action_id: default_action_id(),
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs as u64)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u32 {
    30
}

fn default_service_id() -> String {
    "service_1".to_string()
}

fn default_action_id() -> String {
    "act_1".to_string()
}
