//! Environment-driven service configuration.

use std::time::Duration;

/// Maximum entries forwarded to the model backend per request.
///
/// Independent of the caller-supplied batch size; bounds model cost. Entries
/// beyond the cap are never represented in the stream for that run.
pub const REMOTE_BATCH_CAP: usize = 50;

/// Maximum entries processed per request in rule-engine fallback mode.
pub const FALLBACK_BATCH_CAP: usize = 200;

/// SignalTrace API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Socket address the server binds to
    pub listen_addr: String,

    /// Model backend API key; absence selects rule-engine fallback mode
    pub model_api_key: Option<String>,

    /// Model name sent to the backend
    pub model: String,

    /// Model backend base URL (OpenAI-compatible chat completions API)
    pub model_base_url: String,

    /// Artificial per-entry delay in fallback mode, emulating incremental
    /// arrival
    pub fallback_delay: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8088".to_string(),
            model_api_key: None,
            model: "gpt-4o-mini".to_string(),
            model_base_url: "https://api.openai.com/v1".to_string(),
            fallback_delay: Duration::from_millis(50),
        }
    }
}

impl ApiConfig {
    /// Load configuration from the environment.
    ///
    /// Recognized variables: `LISTEN_ADDR`, `OPENAI_API_KEY`, `OPENAI_MODEL`,
    /// `OPENAI_BASE_URL`, `FALLBACK_DELAY_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            model_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            model_base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.model_base_url),
            fallback_delay: std::env::var("FALLBACK_DELAY_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.fallback_delay),
        }
    }
}
