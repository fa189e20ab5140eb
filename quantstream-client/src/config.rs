//! Client and polling configuration.
//!
//! Defaults reproduce the cadences of the QuantStream web dashboard. Environment variables
//! override the connection settings so the terminal can point at a remote service.

use std::time::Duration;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Default analytics service address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Every request is bounded by this timeout and never retried.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the analytics service
    pub base_url: String,
    /// Upper bound for a single request, connect included
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with custom base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Build from `QUANTSTREAM_API_URL` and `QUANTSTREAM_TIMEOUT_SECS`, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_str("QUANTSTREAM_API_URL") {
            config.base_url = url;
        }

        if let Some(secs) = env_str("QUANTSTREAM_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }

        config
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn env_str(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// User-selectable refresh rate of the live data view.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize, Serialize,
)]
pub enum RefreshRate {
    #[default]
    #[display("1s")]
    OneSecond,
    #[display("5s")]
    FiveSeconds,
    #[display("10s")]
    TenSeconds,
}

impl RefreshRate {
    pub const ALL: [RefreshRate; 3] = [
        RefreshRate::OneSecond,
        RefreshRate::FiveSeconds,
        RefreshRate::TenSeconds,
    ];

    pub fn interval(&self) -> Duration {
        match self {
            RefreshRate::OneSecond => Duration::from_secs(1),
            RefreshRate::FiveSeconds => Duration::from_secs(5),
            RefreshRate::TenSeconds => Duration::from_secs(10),
        }
    }

    /// Next rate in the cycle 1s -> 5s -> 10s -> 1s
    pub fn next(&self) -> Self {
        match self {
            RefreshRate::OneSecond => RefreshRate::FiveSeconds,
            RefreshRate::FiveSeconds => RefreshRate::TenSeconds,
            RefreshRate::TenSeconds => RefreshRate::OneSecond,
        }
    }
}

/// Fixed per-view polling cadences.
///
/// Price ticks refresh fastest, correlation and stationarity slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub health: Duration,
    pub ingestion_status: Duration,
    pub statistics: Duration,
    pub statistics_zscore: Duration,
    pub analytics_summary: Duration,
    pub price_chart: Duration,
    pub zscore: Duration,
    pub correlation: Duration,
    pub pairs: Duration,
    pub adf: Duration,
    pub alerts: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(5),
            ingestion_status: Duration::from_secs(3),
            statistics: Duration::from_secs(2),
            statistics_zscore: Duration::from_secs(2),
            analytics_summary: Duration::from_secs(5),
            price_chart: Duration::from_secs(2),
            zscore: Duration::from_secs(1),
            correlation: Duration::from_secs(5),
            pairs: Duration::from_secs(2),
            adf: Duration::from_secs(5),
            alerts: Duration::from_secs(3),
        }
    }
}

/// Request sizes and display caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub tick_buffer: usize,
    pub tick_display: usize,
    pub ohlcv: usize,
    pub alerts_feed: usize,
    pub alerts_display: usize,
    pub alerts_export: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            tick_buffer: 50,
            tick_display: 20,
            ohlcv: 100,
            alerts_feed: 50,
            alerts_display: 20,
            alerts_export: 1000,
        }
    }
}

/// Everything a dashboard needs to construct its views.
#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    pub client: ClientConfig,
    pub intervals: PollIntervals,
    pub limits: FetchLimits,
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self {
            client: ClientConfig::from_env(),
            ..Default::default()
        }
    }
}
