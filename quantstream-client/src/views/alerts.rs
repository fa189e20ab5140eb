use std::{collections::BTreeSet, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{info, warn};

use super::{Mount, SingleFlight, ViewContext};
use crate::{
    client::RemoteClient,
    endpoint::ExportFormat,
    error::ClientError,
    model::{Alert, AlertFeed, Severity},
    slot::Slot,
};

/// Severities shown when the view is first opened.
pub const DEFAULT_SEVERITIES: [Severity; 3] = [Severity::Medium, Severity::High, Severity::Critical];

/// Set of severities to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityFilter {
    included: BTreeSet<Severity>,
}

impl Default for SeverityFilter {
    fn default() -> Self {
        Self {
            included: DEFAULT_SEVERITIES.into_iter().collect(),
        }
    }
}

impl SeverityFilter {
    pub fn includes(&self, severity: Severity) -> bool {
        self.included.contains(&severity)
    }

    /// Add `severity` if absent, remove it if present
    pub fn toggle(&mut self, severity: Severity) {
        if !self.included.remove(&severity) {
            self.included.insert(severity);
        }
    }

    pub fn included(&self) -> impl Iterator<Item = Severity> + '_ {
        self.included.iter().copied()
    }

    /// Alerts whose severity is included, in feed order, at most `cap` of them
    pub fn apply(&self, alerts: &[Alert], cap: usize) -> Vec<Alert> {
        alerts
            .iter()
            .filter(|alert| self.includes(alert.severity))
            .take(cap)
            .cloned()
            .collect()
    }
}

/// Downloadable export built verbatim from the response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

impl ExportArtifact {
    fn new(format: ExportFormat, bytes: Bytes) -> Self {
        let content_type = match format {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        };

        Self {
            file_name: format!("alerts.{}", format.as_str()),
            content_type,
            bytes,
        }
    }
}

/// Recent alert feed with a client-side severity filter, plus alert export.
#[derive(Debug)]
pub struct AlertsView {
    _mount: Mount,
    feed: Slot<AlertFeed>,
    filter: Arc<Mutex<SeverityFilter>>,
    exporter: AlertExporter,
    display_cap: usize,
}

impl AlertsView {
    pub fn mount(context: &ViewContext) -> Self {
        let mut mount = Mount::new("alerts");
        let feed = Slot::new();

        let client = context.client.clone();
        let slot = feed.clone();
        let limit = context.limits.alerts_feed;
        mount.poll("alerts", context.intervals.alerts, move |generation| {
            let client = client.clone();
            let slot = slot.clone();
            async move {
                generation.apply(&slot, client.alerts(limit).await);
            }
        });

        Self {
            _mount: mount,
            feed,
            filter: Arc::default(),
            exporter: AlertExporter {
                client: context.client.clone(),
                flight: SingleFlight::default(),
                limit: context.limits.alerts_export,
            },
            display_cap: context.limits.alerts_display,
        }
    }

    pub fn feed(&self) -> &Slot<AlertFeed> {
        &self.feed
    }

    pub fn filter(&self) -> SeverityFilter {
        self.filter.lock().clone()
    }

    pub fn toggle_severity(&self, severity: Severity) {
        self.filter.lock().toggle(severity);
    }

    /// Included alerts of the latest feed, capped for display
    pub fn filtered_alerts(&self) -> Vec<Alert> {
        let filter = self.filter();
        self.feed.with(|snapshot| {
            snapshot
                .as_ready()
                .map(|feed| filter.apply(&feed.alerts, self.display_cap))
                .unwrap_or_default()
        })
    }

    /// Alerts raised since the service started
    pub fn total_alerts(&self) -> usize {
        self.feed.ready().map(|feed| feed.total_alerts).unwrap_or(0)
    }

    /// Size of the recent feed, unfiltered
    pub fn recent_count(&self) -> usize {
        self.feed.with(|snapshot| snapshot.as_ready().map_or(0, |feed| feed.alerts.len()))
    }

    pub fn is_exporting(&self) -> bool {
        self.exporter.is_busy()
    }

    /// Handle for exporting detached from the view. It does not keep the view mounted.
    pub fn exporter(&self) -> AlertExporter {
        self.exporter.clone()
    }

    pub async fn export(&self) -> Option<Result<ExportArtifact, ClientError>> {
        self.exporter.export().await
    }
}

/// Single-flight alert export, independent of the polled feed.
#[derive(Debug, Clone)]
pub struct AlertExporter {
    client: RemoteClient,
    flight: SingleFlight,
    limit: usize,
}

impl AlertExporter {
    pub fn is_busy(&self) -> bool {
        self.flight.is_busy()
    }

    /// Fetch a fresh, larger alert set as CSV. Returns `None` without issuing a request if
    /// an export is already in flight.
    pub async fn export(&self) -> Option<Result<ExportArtifact, ClientError>> {
        let _flight = self.flight.try_begin()?;

        let format = ExportFormat::Csv;
        let result = self
            .client
            .export_alerts(format, self.limit)
            .await
            .map(|bytes| ExportArtifact::new(format, bytes));

        match &result {
            Ok(artifact) => info!(bytes = artifact.bytes.len(), "alerts exported"),
            Err(error) => warn!(%error, "failed to export alerts"),
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::DashboardConfig, endpoint::Endpoint, mock::MockTransport};
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn alert(severity: Severity) -> Alert {
        Alert {
            symbol: "BTCUSDT".into(),
            timestamp: Utc::now(),
            rule_type: "zscore".to_string(),
            message: format!("{severity} alert"),
            severity,
            triggered_value: None,
        }
    }

    fn alerts_service() -> MockTransport {
        MockTransport::new(|endpoint| match endpoint {
            Endpoint::Alerts { limit } => {
                let severities = ["low", "medium", "high", "critical"];
                let alerts = (0..*limit)
                    .map(|index| {
                        json!({
                            "symbol": "BTCUSDT",
                            "timestamp": "2024-05-01T12:00:00",
                            "rule_type": "zscore",
                            "message": format!("alert {index}"),
                            "severity": severities[index % severities.len()]
                        })
                    })
                    .collect::<Vec<_>>();
                Ok(json!({"alerts": alerts, "count": limit, "total_alerts": 1234}))
            }
            other => Err(ClientError::empty(other.label())),
        })
        .with_raw(
            "/export/alerts",
            Bytes::from_static(b"timestamp,symbol,severity\n2024-05-01T12:00:00,BTCUSDT,high\n"),
        )
    }

    fn view(mock: &MockTransport) -> AlertsView {
        AlertsView::mount(&ViewContext::new(mock.client(), &DashboardConfig::default()))
    }

    #[test]
    fn test_severity_filter_toggle_is_symmetric() {
        let original = SeverityFilter::default();
        assert!(!original.includes(Severity::Low));

        for severity in Severity::ALL {
            let mut filter = original.clone();
            filter.toggle(severity);
            assert_ne!(filter, original);
            filter.toggle(severity);
            assert_eq!(filter, original);
        }
    }

    #[test]
    fn test_severity_filter_apply() {
        struct TestCase {
            input: Vec<Severity>,
            cap: usize,
            expected: Vec<Severity>,
        }

        let tests = vec![
            TestCase {
                // TC0: low filtered out by default
                input: vec![Severity::Low, Severity::High, Severity::Low, Severity::Medium],
                cap: 20,
                expected: vec![Severity::High, Severity::Medium],
            },
            TestCase {
                // TC1: cap applies after filtering
                input: vec![Severity::Critical, Severity::Low, Severity::High, Severity::Medium],
                cap: 2,
                expected: vec![Severity::Critical, Severity::High],
            },
            TestCase {
                // TC2: empty feed
                input: vec![],
                cap: 20,
                expected: vec![],
            },
        ];

        let filter = SeverityFilter::default();
        for (index, test) in tests.into_iter().enumerate() {
            let alerts = test.input.into_iter().map(alert).collect::<Vec<_>>();
            let actual = filter
                .apply(&alerts, test.cap)
                .into_iter()
                .map(|alert| alert.severity)
                .collect::<Vec<_>>();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_filtered_alerts_are_a_capped_subset() {
        let mock = alerts_service();
        let view = view(&mock);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let filtered = view.filtered_alerts();
        assert_eq!(filtered.len(), 20);
        assert!(filtered.iter().all(|alert| alert.severity != Severity::Low));
        assert_eq!(view.recent_count(), 50);
        assert_eq!(view.total_alerts(), 1234);

        view.toggle_severity(Severity::Low);
        let feed = view.feed().ready().unwrap();
        assert!(
            view.filtered_alerts()
                .iter()
                .all(|alert| feed.alerts.contains(alert))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_is_single_flight() {
        let mock = alerts_service().with_latency("/export/alerts", Duration::from_secs(2));
        let view = view(&mock);

        let (first, second) = tokio::join!(view.export(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(view.is_exporting());
            view.export().await
        });

        assert!(second.is_none());
        let artifact = first.unwrap().unwrap();
        assert_eq!(artifact.file_name, "alerts.csv");
        assert_eq!(artifact.content_type, "text/csv");
        assert!(artifact.bytes.starts_with(b"timestamp,symbol,severity\n"));
        assert_eq!(
            mock.calls_to("/export/alerts"),
            vec![Endpoint::ExportAlerts {
                format: ExportFormat::Csv,
                limit: 1000
            }]
        );

        assert!(!view.is_exporting());
        assert!(view.export().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_in_flight_does_not_keep_view_polling() {
        let mock = alerts_service().with_latency("/export/alerts", Duration::from_secs(10));
        let view = view(&mock);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let exporter = view.exporter();
        let export = tokio::spawn(async move { exporter.export().await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        drop(view);
        let polls = mock.count("/analytics/alerts");
        assert_eq!(polls, 1);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(mock.count("/analytics/alerts"), polls);

        let artifact = export.await.unwrap().unwrap().unwrap();
        assert_eq!(artifact.file_name, "alerts.csv");
        assert_eq!(mock.count("/analytics/alerts"), polls);
    }
}
