//! OpenAI-compatible client configuration with sensible defaults.
//!
//! The same client construction serves both the hosted API and a local
//! OpenAI-compatible server (e.g. Ollama) when an `api_base` is configured.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;
use tracing::info;

/// Default timeout for LLM API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create a client against the hosted API with the configured timeout.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with_base(None)
}

/// Create a client, optionally pointed at a local OpenAI-compatible server.
pub fn create_client_with_base(api_base: Option<&str>) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .expect("Failed to create HTTP client");

    let config = match api_base {
        Some(base) => OpenAIConfig::default().with_api_base(base),
        None => OpenAIConfig::default(),
    };

    Client::with_config(config).with_http_client(http_client)
}

/// Local request counter that pauses after a fixed number of remote calls.
///
/// Each rate-limited component keeps its own pacer; there is no cross-process
/// budget. Disabled when the pipeline targets a local server.
pub struct RequestPacer {
    count: u32,
    requests_per_pause: u32,
    pause: Duration,
    enabled: bool,
}

impl RequestPacer {
    pub fn new(requests_per_pause: u32, pause_seconds: u64, enabled: bool) -> Self {
        Self {
            count: 0,
            requests_per_pause,
            pause: Duration::from_secs(pause_seconds),
            enabled,
        }
    }

    /// Record one request; sleeps when the threshold is reached.
    pub async fn tick(&mut self) {
        if !self.enabled || self.requests_per_pause == 0 {
            return;
        }

        self.count += 1;
        if self.count % self.requests_per_pause == 0 {
            info!(
                "Pausing {}s after {} requests",
                self.pause.as_secs(),
                self.count
            );
            tokio::time::sleep(self.pause).await;
        }
    }
}
