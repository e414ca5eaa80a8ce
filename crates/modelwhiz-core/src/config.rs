use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_ASSET_ORIGIN: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWhizConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poller: PollerConfig,
}

impl Default for ModelWhizConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            poller: PollerConfig::default(),
        }
    }
}

impl ModelWhizConfig {
    /// Defaults overridden by `MODELWHIZ_API_BASE`, `MODELWHIZ_ASSET_ORIGIN`
    /// and `MODELWHIZ_POLL_INTERVAL_MS` where set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base) = std::env::var("MODELWHIZ_API_BASE") {
            config.api.base_url = base;
        }
        if let Ok(origin) = std::env::var("MODELWHIZ_ASSET_ORIGIN") {
            config.api.asset_origin = origin;
        }
        if let Some(interval) = std::env::var("MODELWHIZ_POLL_INTERVAL_MS")
            .ok()
            .and_then(|raw| raw.parse().ok())
        {
            config.poller.interval_ms = interval;
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the evaluation API.
    pub base_url: String,
    /// Origin that serves uploaded files and generated plots.
    pub asset_origin: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            asset_origin: DEFAULT_ASSET_ORIGIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Fixed delay between job status queries.
    pub interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}
