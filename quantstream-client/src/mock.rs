//! Scripted [`Transport`] for tests.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    client::{RemoteClient, Transport},
    endpoint::Endpoint,
    error::ClientError,
};

type Handler = dyn Fn(&Endpoint) -> Result<serde_json::Value, ClientError> + Send + Sync;

/// Answers every request from a closure and records the endpoints it was asked for.
#[derive(Clone)]
pub(crate) struct MockTransport {
    handler: Arc<Handler>,
    raw: Arc<Mutex<HashMap<String, Bytes>>>,
    latency: Arc<Mutex<HashMap<String, Duration>>>,
    calls: Arc<Mutex<Vec<Endpoint>>>,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&Endpoint) -> Result<serde_json::Value, ClientError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            raw: Arc::default(),
            latency: Arc::default(),
            calls: Arc::default(),
        }
    }

    /// Serve `body` verbatim for every request to `path`
    pub(crate) fn with_raw(self, path: &str, body: Bytes) -> Self {
        self.raw.lock().insert(path.to_string(), body);
        self
    }

    /// Delay every response for `path` by `delay`
    pub(crate) fn with_latency(self, path: &str, delay: Duration) -> Self {
        self.set_latency(path, delay);
        self
    }

    pub(crate) fn set_latency(&self, path: &str, delay: Duration) {
        self.latency.lock().insert(path.to_string(), delay);
    }

    pub(crate) fn client(&self) -> RemoteClient {
        RemoteClient::new(Arc::new(self.clone()))
    }

    pub(crate) fn calls(&self) -> Vec<Endpoint> {
        self.calls.lock().clone()
    }

    /// Recorded requests whose path equals `path`
    pub(crate) fn calls_to(&self, path: &str) -> Vec<Endpoint> {
        self.calls
            .lock()
            .iter()
            .filter(|endpoint| endpoint.path() == path)
            .cloned()
            .collect()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.calls_to(path).len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, endpoint: &Endpoint) -> Result<Bytes, ClientError> {
        self.calls.lock().push(endpoint.clone());

        let path = endpoint.path();
        let delay = self.latency.lock().get(&path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(body) = self.raw.lock().get(&path).cloned() {
            return Ok(body);
        }

        let value = (self.handler)(endpoint)?;
        Ok(Bytes::from(value.to_string()))
    }
}
