use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use super::{Mount, ViewContext};
use crate::{client::RemoteClient, model::Health};

/// Result of the most recent health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthStatus {
    pub service_reachable: bool,
    pub ingestion_active: bool,
    pub checked_at: Option<DateTime<Utc>>,
}

impl HealthStatus {
    /// Map a probe outcome. Any failure reports both flags down, regardless of history.
    pub fn from_probe<E>(outcome: Result<Health, E>) -> Self {
        let checked_at = Some(Utc::now());
        match outcome {
            Ok(health) => Self {
                service_reachable: health.is_healthy(),
                ingestion_active: health.ws_client_running,
                checked_at,
            },
            Err(_) => Self {
                service_reachable: false,
                ingestion_active: false,
                checked_at,
            },
        }
    }
}

/// Periodic `/health` probe.
#[derive(Debug)]
pub struct HealthMonitor {
    _mount: Mount,
    status: watch::Receiver<HealthStatus>,
}

impl HealthMonitor {
    pub fn mount(context: &ViewContext) -> Self {
        let mut mount = Mount::new("health");
        let (tx, status) = watch::channel(HealthStatus::default());
        let tx = Arc::new(tx);

        let client = context.client.clone();
        mount.poll("health", context.intervals.health, move |generation| {
            let client = client.clone();
            let tx = Arc::clone(&tx);
            async move {
                let status = probe(&client).await;
                generation.commit(|| tx.send_replace(status));
            }
        });

        Self {
            _mount: mount,
            status,
        }
    }

    pub fn status(&self) -> HealthStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.status.clone()
    }
}

/// Issue one probe
pub async fn probe(client: &RemoteClient) -> HealthStatus {
    let outcome = client.health().await;
    if let Err(error) = &outcome {
        debug!(%error, "health probe failed");
    }
    HealthStatus::from_probe(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DashboardConfig,
        error::{ClientError, TransportReason},
        mock::MockTransport,
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_health_status_from_probe() {
        struct TestCase {
            input: Result<Health, ClientError>,
            expected: (bool, bool),
        }

        let tests = vec![
            TestCase {
                // TC0: healthy with ingestion running
                input: Ok(Health {
                    status: "healthy".to_string(),
                    ws_client_running: true,
                }),
                expected: (true, true),
            },
            TestCase {
                // TC1: healthy, ingestion idle
                input: Ok(Health {
                    status: "healthy".to_string(),
                    ws_client_running: false,
                }),
                expected: (true, false),
            },
            TestCase {
                // TC2: degraded service
                input: Ok(Health {
                    status: "degraded".to_string(),
                    ws_client_running: true,
                }),
                expected: (false, true),
            },
            TestCase {
                // TC3: transport failure is fail-closed
                input: Err(ClientError::transport("/health", TransportReason::Timeout)),
                expected: (false, false),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let status = HealthStatus::from_probe(test.input);
            assert_eq!(
                (status.service_reachable, status.ingestion_active),
                test.expected,
                "TC{} failed",
                index
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_fails_closed_within_one_cycle() {
        let up = Arc::new(Mutex::new(true));
        let mock = MockTransport::new({
            let up = Arc::clone(&up);
            move |endpoint| {
                if *up.lock() {
                    Ok(json!({"status": "healthy", "ws_client_running": true}))
                } else {
                    Err(ClientError::transport(
                        endpoint.label(),
                        TransportReason::Connect("connection refused".to_string()),
                    ))
                }
            }
        });
        let context = ViewContext::new(mock.client(), &DashboardConfig::default());
        let monitor = HealthMonitor::mount(&context);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let status = monitor.status();
        assert!(status.service_reachable && status.ingestion_active);

        *up.lock() = false;
        tokio::time::sleep(context.intervals.health).await;
        let status = monitor.status();
        assert!(!status.service_reachable);
        assert!(!status.ingestion_active);
    }
}
