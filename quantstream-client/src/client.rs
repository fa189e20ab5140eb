//! Remote client facade.
//!
//! [`RemoteClient`] issues bounded-timeout requests to named [`Endpoint`]s and decodes the
//! JSON payloads into snapshot types. It never retries and never caches: a failure is
//! reported once as a [`ClientError`] and the caller treats it as "no update this cycle".

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{
    config::ClientConfig,
    endpoint::{Endpoint, ExportFormat, Method},
    error::{ClientError, TransportReason},
    model::{
        AdfResult, AlertFeed, AllStats, CandleSeries, CorrelationEntry, CorrelationKind,
        CorrelationList, CorrelationMatrix, Health, IngestionAck, IngestionStatus, LatestPrices,
        RegressionResult, SpreadSnapshot, StatsSnapshot, Summary, Symbol, TickBuffer, Timeframe,
        ZScoreSnapshot,
    },
};

/// Moves one request to the service and returns the raw body of a 2xx response.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, endpoint: &Endpoint) -> Result<Bytes, ClientError>;
}

/// [`Transport`] over HTTP using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Url::parse(&config.base_url).map_err(|error| ClientError::Build(error.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| ClientError::Build(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &Endpoint) -> Result<Url, ClientError> {
        Url::parse(&format!("{}{}", self.base_url, endpoint.path())).map_err(|error| {
            ClientError::transport(endpoint.label(), TransportReason::Other(error.to_string()))
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: &Endpoint) -> Result<Bytes, ClientError> {
        let url = self.url(endpoint)?;

        let mut request = match endpoint.method() {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
        };

        let query = endpoint.query();
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = endpoint.body() {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|error| ClientError::transport(endpoint.label(), error.into()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::from_status(endpoint.label(), status.as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|error| ClientError::transport(endpoint.label(), error.into()))
    }
}

/// Typed wrapper around a [`Transport`]. Cheap to clone; every view holds its own handle.
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient").finish_non_exhaustive()
    }
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Construct a client talking HTTP to `config.base_url`
    pub fn http(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    /// Issue one request and return the raw payload
    pub async fn call(&self, endpoint: Endpoint) -> Result<Bytes, ClientError> {
        let result = self.transport.send(&endpoint).await;
        if let Err(error) = &result {
            debug!(endpoint = %endpoint.label(), %error, "request failed");
        }
        result
    }

    /// Issue one request and decode the JSON payload
    pub async fn call_json<T>(&self, endpoint: Endpoint) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let label = endpoint.label();
        let body = self.call(endpoint).await?;
        serde_json::from_slice(&body).map_err(|error| {
            debug!(endpoint = %label, %error, "failed to decode response");
            ClientError::transport(label, TransportReason::Decode(error.to_string()))
        })
    }

    pub async fn start_ingestion(&self, symbols: Vec<Symbol>) -> Result<IngestionAck, ClientError> {
        self.call_json(Endpoint::IngestionStart { symbols }).await
    }

    pub async fn stop_ingestion(&self) -> Result<IngestionAck, ClientError> {
        self.call_json(Endpoint::IngestionStop).await
    }

    pub async fn ingestion_status(&self) -> Result<IngestionStatus, ClientError> {
        self.call_json(Endpoint::IngestionStatus).await
    }

    pub async fn latest_prices(&self) -> Result<LatestPrices, ClientError> {
        self.call_json(Endpoint::LatestPrices).await
    }

    pub async fn tick_buffer(&self, symbol: Symbol, limit: usize) -> Result<TickBuffer, ClientError> {
        self.call_json(Endpoint::TickBuffer { symbol, limit }).await
    }

    pub async fn summary(&self) -> Result<Summary, ClientError> {
        self.call_json(Endpoint::Summary).await
    }

    pub async fn all_stats(&self) -> Result<AllStats, ClientError> {
        self.call_json(Endpoint::AllStats).await
    }

    pub async fn stats(&self, symbol: Symbol) -> Result<StatsSnapshot, ClientError> {
        self.call_json(Endpoint::Stats { symbol }).await
    }

    pub async fn all_zscores(&self) -> Result<IndexMap<Symbol, ZScoreSnapshot>, ClientError> {
        self.call_json(Endpoint::AllZScores).await
    }

    pub async fn zscore(&self, symbol: Symbol) -> Result<ZScoreSnapshot, ClientError> {
        self.call_json(Endpoint::ZScore { symbol }).await
    }

    pub async fn correlation(
        &self,
        symbol1: Symbol,
        symbol2: Symbol,
        kind: CorrelationKind,
    ) -> Result<CorrelationEntry, ClientError> {
        self.call_json(Endpoint::Correlation {
            symbol1,
            symbol2,
            kind,
        })
        .await
    }

    pub async fn all_correlations(
        &self,
        kind: CorrelationKind,
    ) -> Result<CorrelationList, ClientError> {
        self.call_json(Endpoint::AllCorrelations { kind }).await
    }

    pub async fn correlation_matrix(&self) -> Result<CorrelationMatrix, ClientError> {
        self.call_json(Endpoint::CorrelationMatrix).await
    }

    pub async fn spread(
        &self,
        symbol1: Symbol,
        symbol2: Symbol,
        hedge_ratio: f64,
    ) -> Result<SpreadSnapshot, ClientError> {
        self.call_json(Endpoint::Spread {
            symbol1,
            symbol2,
            hedge_ratio,
        })
        .await
    }

    pub async fn regression(
        &self,
        symbol_x: Symbol,
        symbol_y: Symbol,
    ) -> Result<RegressionResult, ClientError> {
        self.call_json(Endpoint::Regression { symbol_x, symbol_y })
            .await
    }

    pub async fn adf(&self, symbol: Symbol) -> Result<AdfResult, ClientError> {
        self.call_json(Endpoint::Adf { symbol }).await
    }

    pub async fn alerts(&self, limit: usize) -> Result<AlertFeed, ClientError> {
        self.call_json(Endpoint::Alerts { limit }).await
    }

    pub async fn candles(
        &self,
        symbol: Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<CandleSeries, ClientError> {
        self.call_json(Endpoint::ExportOhlcv {
            symbol,
            timeframe,
            limit,
        })
        .await
    }

    /// Raw export artifact; the body is passed through untouched
    pub async fn export_alerts(
        &self,
        format: ExportFormat,
        limit: usize,
    ) -> Result<Bytes, ClientError> {
        self.call(Endpoint::ExportAlerts { format, limit }).await
    }

    pub async fn health(&self) -> Result<Health, ClientError> {
        self.call_json(Endpoint::Health).await
    }
}
