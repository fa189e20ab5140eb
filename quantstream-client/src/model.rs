//! Snapshot types returned by the analytics service
//!
//! Every type here is an immutable value that a poll replaces wholesale. Field names match
//! the JSON produced by the service endpoints.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use derive_more::{Constructor, Display};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;

/// Opaque ticker identifier (e.g. "BTCUSDT")
pub type Symbol = SmolStr;

/// Ordered pair of symbols used by the pairs-trading analysis
#[derive(Debug, Clone, PartialEq, Eq, Hash, Constructor, Deserialize, Serialize)]
pub struct SymbolPair {
    /// Dependent leg (regression y, spread symbol1)
    pub first: Symbol,
    /// Hedge leg (regression x, spread symbol2)
    pub second: Symbol,
}

impl SymbolPair {
    /// A pair of identical symbols has no spread to analyse
    pub fn is_degenerate(&self) -> bool {
        self.first.eq_ignore_ascii_case(&self.second)
    }

    /// Check if a snapshot tagged `(symbol1, symbol2)` belongs to this pair
    pub fn matches(&self, symbol1: &str, symbol2: &str) -> bool {
        self.first.eq_ignore_ascii_case(symbol1) && self.second.eq_ignore_ascii_case(symbol2)
    }
}

impl fmt::Display for SymbolPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.first, self.second)
    }
}

/// Candle aggregation period
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize, Serialize,
)]
pub enum Timeframe {
    #[serde(rename = "1s")]
    #[display("1s")]
    OneSecond,
    #[default]
    #[serde(rename = "1m")]
    #[display("1m")]
    OneMinute,
    #[serde(rename = "5m")]
    #[display("5m")]
    FiveMinutes,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [
        Timeframe::OneSecond,
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
    ];

    pub fn next(&self) -> Self {
        match self {
            Timeframe::OneSecond => Timeframe::OneMinute,
            Timeframe::OneMinute => Timeframe::FiveMinutes,
            Timeframe::FiveMinutes => Timeframe::OneSecond,
        }
    }
}

/// Alert severity, ordered from least to most severe
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[display("low")]
    Low,
    #[display("medium")]
    Medium,
    #[display("high")]
    High,
    #[display("critical")]
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];
}

/// Z-score outlier classification
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutlierLevel {
    #[default]
    #[display("normal")]
    Normal,
    #[display("moderate")]
    Moderate,
    #[display("high")]
    High,
    #[display("extreme")]
    Extreme,
}

impl OutlierLevel {
    /// Classify by |z|: >3 extreme, >2 high, >1 moderate
    pub fn from_zscore(zscore: f64) -> Self {
        let abs = zscore.abs();
        if abs > 3.0 {
            OutlierLevel::Extreme
        } else if abs > 2.0 {
            OutlierLevel::High
        } else if abs > 1.0 {
            OutlierLevel::Moderate
        } else {
            OutlierLevel::Normal
        }
    }
}

/// Single trade from the service's ring buffer
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tick {
    pub symbol: Symbol,
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
}

/// `GET /ingestion/buffer?symbol&limit`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TickBuffer {
    pub symbol: Symbol,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub ticks: Vec<Tick>,
}

/// `GET /ingestion/latest_prices`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct LatestPrices {
    /// Latest price per symbol, in the order the service reports them
    #[serde(default)]
    pub prices: IndexMap<Symbol, f64>,
    #[serde(default)]
    pub count: usize,
}

impl LatestPrices {
    pub fn symbols(&self) -> Vec<Symbol> {
        self.prices.keys().cloned().collect()
    }
}

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// `GET /export/ohlcv?symbol&timeframe&limit`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CandleSeries {
    pub symbol: Symbol,
    pub timeframe: String,
    #[serde(default, rename = "ohlcv")]
    pub candles: Vec<Candle>,
}

/// Rolling price statistics for one symbol
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsSnapshot {
    pub symbol: Symbol,
    pub current_price: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub count: usize,
    pub total_volume: f64,
    pub avg_volume: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub vwap: f64,
    pub volatility: Option<f64>,
}

/// `GET /analytics/stats`
pub type AllStats = IndexMap<Symbol, StatsSnapshot>;

/// Z-score of the latest price against the rolling window
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ZScoreSnapshot {
    pub symbol: Symbol,
    pub current_price: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub zscore: f64,
    pub outlier_level: OutlierLevel,
}

/// Correlation between two symbols' price windows
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CorrelationEntry {
    pub symbol1: Symbol,
    pub symbol2: Symbol,
    pub correlation: f64,
    #[serde(default)]
    pub p_value: Option<f64>,
    #[serde(default)]
    pub sample_size: usize,
    #[serde(default)]
    pub method: String,
}

/// `GET /analytics/correlation` without a symbol pair
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct CorrelationList {
    #[serde(default)]
    pub correlations: Vec<CorrelationEntry>,
}

/// `GET /analytics/correlation/matrix`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct CorrelationMatrix {
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    #[serde(default)]
    pub matrix: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// A heatmap needs at least two symbols with data
    pub fn is_renderable(&self) -> bool {
        self.symbols.len() >= 2 && !self.matrix.is_empty()
    }
}

/// Correlation method requested from the service
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationKind {
    #[default]
    #[display("pearson")]
    Pearson,
    #[display("spearman")]
    Spearman,
}

/// OLS regression of `symbol_y` on `symbol_x`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RegressionResult {
    pub symbol_x: Symbol,
    pub symbol_y: Symbol,
    pub beta: Option<f64>,
    pub alpha: Option<f64>,
    pub r_squared: Option<f64>,
    pub p_value: Option<f64>,
    pub sample_size: usize,
}

impl RegressionResult {
    /// Hedge ratio to request the spread with; 1.0 when the regression produced no usable beta
    pub fn hedge_ratio(&self) -> f64 {
        self.beta
            .filter(|beta| beta.is_finite() && *beta != 0.0)
            .unwrap_or(1.0)
    }
}

/// Hedged spread `symbol1 - hedge_ratio * symbol2`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SpreadSnapshot {
    pub symbol1: Symbol,
    pub symbol2: Symbol,
    pub hedge_ratio: f64,
    pub current_spread: f64,
    pub spread_mean: f64,
    pub spread_std: f64,
    pub spread_zscore: f64,
    pub sample_size: usize,
}

/// Mean-reversion signal read off the spread z-score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSignal {
    /// Spread rich: short symbol1, long hedge_ratio x symbol2
    ShortSpread,
    /// Spread cheap: long symbol1, short hedge_ratio x symbol2
    LongSpread,
    /// |z| within the band
    Wait,
}

impl SpreadSnapshot {
    pub const ENTRY_ZSCORE: f64 = 2.0;

    pub fn signal(&self) -> PairSignal {
        if self.spread_zscore > Self::ENTRY_ZSCORE {
            PairSignal::ShortSpread
        } else if self.spread_zscore < -Self::ENTRY_ZSCORE {
            PairSignal::LongSpread
        } else {
            PairSignal::Wait
        }
    }
}

/// Augmented Dickey-Fuller stationarity test
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AdfResult {
    pub series_name: String,
    pub adf_statistic: f64,
    pub p_value: f64,
    pub is_stationary: bool,
    pub used_lag: i64,
    pub num_observations: i64,
    pub critical_1pct: f64,
    pub critical_5pct: f64,
    pub critical_10pct: f64,
    pub sample_size: usize,
}

/// Triggered alert rule
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Alert {
    pub symbol: Symbol,
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub rule_type: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default)]
    pub triggered_value: Option<f64>,
}

/// `GET /analytics/alerts?limit`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct AlertFeed {
    /// Most recent alerts, newest generally first
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub count: usize,
    /// Alerts raised since the service started, independent of `limit`
    #[serde(default)]
    pub total_alerts: usize,
}

/// `GET /analytics/summary`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Summary {
    /// Active symbols, in the service's order
    pub symbols: Vec<Symbol>,
    pub symbol_count: usize,
    pub window_size: usize,
    pub stats_available: usize,
    pub latest_prices: IndexMap<Symbol, f64>,
}

/// `GET /ingestion/status`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionStatus {
    pub running: bool,
    pub symbols: Vec<Symbol>,
    pub connected_symbols: Vec<Symbol>,
    pub tick_count: u64,
    pub buffer_stats: Option<serde_json::Value>,
}

/// `POST /ingestion/start` and `POST /ingestion/stop`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct IngestionAck {
    pub status: String,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub ws_client_running: bool,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Accept RFC 3339 timestamps as well as the naive ISO form the service stores in SQLite
fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_pair() {
        let pair = SymbolPair::new("BTCUSDT".into(), "ETHUSDT".into());
        assert!(!pair.is_degenerate());
        assert!(pair.matches("btcusdt", "ETHUSDT"));
        assert!(!pair.matches("ETHUSDT", "BTCUSDT"));
        assert_eq!(pair.to_string(), "BTCUSDT/ETHUSDT");

        let same = SymbolPair::new("BTCUSDT".into(), "btcusdt".into());
        assert!(same.is_degenerate());
    }

    #[test]
    fn test_hedge_ratio_defaults() {
        struct TestCase {
            beta: Option<f64>,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: beta present
                beta: Some(0.42),
                expected: 0.42,
            },
            TestCase {
                // TC1: beta absent
                beta: None,
                expected: 1.0,
            },
            TestCase {
                // TC2: zero beta is unusable
                beta: Some(0.0),
                expected: 1.0,
            },
            TestCase {
                // TC3: NaN beta is unusable
                beta: Some(f64::NAN),
                expected: 1.0,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let regression = RegressionResult {
                beta: test.beta,
                ..Default::default()
            };
            assert_eq!(regression.hedge_ratio(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_outlier_level_from_zscore() {
        assert_eq!(OutlierLevel::from_zscore(0.5), OutlierLevel::Normal);
        assert_eq!(OutlierLevel::from_zscore(-1.5), OutlierLevel::Moderate);
        assert_eq!(OutlierLevel::from_zscore(2.5), OutlierLevel::High);
        assert_eq!(OutlierLevel::from_zscore(-3.1), OutlierLevel::Extreme);
    }

    #[test]
    fn test_spread_signal() {
        let mut spread = SpreadSnapshot {
            spread_zscore: 2.4,
            ..Default::default()
        };
        assert_eq!(spread.signal(), PairSignal::ShortSpread);
        spread.spread_zscore = -2.4;
        assert_eq!(spread.signal(), PairSignal::LongSpread);
        spread.spread_zscore = 1.9;
        assert_eq!(spread.signal(), PairSignal::Wait);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-05-01T12:00:00.250+00:00").unwrap();
        let naive = parse_timestamp("2024-05-01T12:00:00.250").unwrap();
        let spaced = parse_timestamp("2024-05-01 12:00:00.250").unwrap();
        assert_eq!(rfc, naive);
        assert_eq!(naive, spaced);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_deserialize_alert_feed() {
        let json = r#"{
            "alerts": [
                {
                    "symbol": "BTCUSDT",
                    "timestamp": "2024-05-01T12:00:00+00:00",
                    "rule_type": "zscore",
                    "message": "Z-score 3.2 exceeds threshold",
                    "severity": "high",
                    "triggered_value": 3.2
                }
            ],
            "count": 1,
            "total_alerts": 17
        }"#;

        let feed: AlertFeed = serde_json::from_str(json).unwrap();
        assert_eq!(feed.total_alerts, 17);
        assert_eq!(feed.alerts[0].severity, Severity::High);
        assert_eq!(feed.alerts[0].triggered_value, Some(3.2));
    }

    #[test]
    fn test_latest_prices_preserve_order() {
        let json = r#"{"prices": {"SOLUSDT": 150.0, "BTCUSDT": 65000.0}, "count": 2}"#;
        let prices: LatestPrices = serde_json::from_str(json).unwrap();
        assert_eq!(
            prices.symbols(),
            vec![Symbol::from("SOLUSDT"), Symbol::from("BTCUSDT")]
        );
    }
}
