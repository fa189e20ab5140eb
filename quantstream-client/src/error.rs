use thiserror::Error;

/// All errors generated in `quantstream-client`.
///
/// Every variant is recoverable: a view that receives one renders an "offline" or
/// "insufficient data" affordance and keeps polling.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Error)]
pub enum ClientError {
    #[error("transport failure for {endpoint}: {reason}")]
    Transport {
        endpoint: String,
        reason: TransportReason,
    },

    #[error("no data available yet for {endpoint}")]
    Empty { endpoint: String },

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// Why a request never produced a usable payload.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Error)]
pub enum TransportReason {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    pub fn transport(endpoint: impl Into<String>, reason: TransportReason) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            reason,
        }
    }

    pub fn empty(endpoint: impl Into<String>) -> Self {
        Self::Empty {
            endpoint: endpoint.into(),
        }
    }

    /// Classify a non-2xx status. The analytics service answers 404 while it has not yet
    /// accumulated enough observations, which is an empty result rather than a failure.
    pub fn from_status(endpoint: impl Into<String>, status: u16) -> Self {
        match status {
            404 => Self::empty(endpoint),
            other => Self::transport(endpoint, TransportReason::Status(other)),
        }
    }

    /// Determine if the error means "valid response, no data yet".
    pub fn is_empty(&self) -> bool {
        matches!(self, ClientError::Empty { .. })
    }

    /// Determine if the error means the service could not be reached or understood.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transport(&self) -> bool {
        match self {
            ClientError::Transport { .. } | ClientError::Build(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for TransportReason {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportReason::Timeout
        } else if error.is_connect() {
            TransportReason::Connect(error.to_string())
        } else if let Some(status) = error.status() {
            TransportReason::Status(status.as_u16())
        } else if error.is_decode() {
            TransportReason::Decode(error.to_string())
        } else {
            TransportReason::Other(error.to_string())
        }
    }
}
