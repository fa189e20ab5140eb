//! Typed description of every remote call the dashboard issues.

use serde_json::json;

use crate::model::{CorrelationKind, Symbol, Timeframe};

/// HTTP method of an [`Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Export artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// One remote call, with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    IngestionStart { symbols: Vec<Symbol> },
    IngestionStop,
    IngestionStatus,
    LatestPrices,
    TickBuffer { symbol: Symbol, limit: usize },
    Summary,
    AllStats,
    Stats { symbol: Symbol },
    AllZScores,
    ZScore { symbol: Symbol },
    Correlation {
        symbol1: Symbol,
        symbol2: Symbol,
        kind: CorrelationKind,
    },
    AllCorrelations { kind: CorrelationKind },
    CorrelationMatrix,
    Spread {
        symbol1: Symbol,
        symbol2: Symbol,
        hedge_ratio: f64,
    },
    Regression { symbol_x: Symbol, symbol_y: Symbol },
    Adf { symbol: Symbol },
    Alerts { limit: usize },
    ExportOhlcv {
        symbol: Symbol,
        timeframe: Timeframe,
        limit: usize,
    },
    ExportAlerts { format: ExportFormat, limit: usize },
    Health,
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::IngestionStart { .. } | Endpoint::IngestionStop => Method::Post,
            _ => Method::Get,
        }
    }

    /// Path relative to the service base URL
    pub fn path(&self) -> String {
        match self {
            Endpoint::IngestionStart { .. } => "/ingestion/start".to_string(),
            Endpoint::IngestionStop => "/ingestion/stop".to_string(),
            Endpoint::IngestionStatus => "/ingestion/status".to_string(),
            Endpoint::LatestPrices => "/ingestion/latest_prices".to_string(),
            Endpoint::TickBuffer { .. } => "/ingestion/buffer".to_string(),
            Endpoint::Summary => "/analytics/summary".to_string(),
            Endpoint::AllStats => "/analytics/stats".to_string(),
            Endpoint::Stats { symbol } => format!("/analytics/stats/{symbol}"),
            Endpoint::AllZScores => "/analytics/zscores".to_string(),
            Endpoint::ZScore { symbol } => format!("/analytics/zscore/{symbol}"),
            Endpoint::Correlation { .. } | Endpoint::AllCorrelations { .. } => {
                "/analytics/correlation".to_string()
            }
            Endpoint::CorrelationMatrix => "/analytics/correlation/matrix".to_string(),
            Endpoint::Spread { .. } => "/analytics/spread".to_string(),
            Endpoint::Regression { .. } => "/analytics/regression".to_string(),
            Endpoint::Adf { symbol } => format!("/analytics/adf/{symbol}"),
            Endpoint::Alerts { .. } => "/analytics/alerts".to_string(),
            Endpoint::ExportOhlcv { .. } => "/export/ohlcv".to_string(),
            Endpoint::ExportAlerts { .. } => "/export/alerts".to_string(),
            Endpoint::Health => "/health".to_string(),
        }
    }

    /// Query string parameters, in a stable order
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Endpoint::TickBuffer { symbol, limit } => {
                vec![("symbol", symbol.to_string()), ("limit", limit.to_string())]
            }
            Endpoint::Correlation {
                symbol1,
                symbol2,
                kind,
            } => vec![
                ("symbol1", symbol1.to_string()),
                ("symbol2", symbol2.to_string()),
                ("corr_type", kind.to_string()),
            ],
            Endpoint::AllCorrelations { kind } => vec![("corr_type", kind.to_string())],
            Endpoint::Spread {
                symbol1,
                symbol2,
                hedge_ratio,
            } => vec![
                ("symbol1", symbol1.to_string()),
                ("symbol2", symbol2.to_string()),
                ("hedge_ratio", hedge_ratio.to_string()),
            ],
            Endpoint::Regression { symbol_x, symbol_y } => vec![
                ("symbol_x", symbol_x.to_string()),
                ("symbol_y", symbol_y.to_string()),
            ],
            Endpoint::Alerts { limit } => vec![("limit", limit.to_string())],
            Endpoint::ExportOhlcv {
                symbol,
                timeframe,
                limit,
            } => vec![
                ("symbol", symbol.to_string()),
                ("timeframe", timeframe.to_string()),
                ("limit", limit.to_string()),
            ],
            Endpoint::ExportAlerts { format, limit } => vec![
                ("format", format.as_str().to_string()),
                ("limit", limit.to_string()),
            ],
            _ => Vec::new(),
        }
    }

    /// JSON request body, if any
    pub fn body(&self) -> Option<serde_json::Value> {
        match self {
            Endpoint::IngestionStart { symbols } => Some(json!({ "symbols": symbols })),
            _ => None,
        }
    }

    /// Path plus query, used to label log lines and errors
    pub fn label(&self) -> String {
        let query = self.query();
        if query.is_empty() {
            return self.path();
        }

        let params = query
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path(), params)
    }
}
