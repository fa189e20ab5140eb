//! QuantStream Client - Dashboard Polling Core
//!
//! Client side of the QuantStream analytics service. Every dashboard view schedules its own
//! periodic refreshes, keeps user selections stable across them and composes dependent
//! queries, without any central scheduler.
//!
//! The library includes:
//! - A typed remote client over the service's HTTP endpoints
//! - Race-free selection cells with one-time default reconciliation
//! - Generation-fenced poll tasks keyed on the current selection
//! - Derived query pipelines (parallel fetch, regression then spread)
//! - Mountable views: controls, live data, statistics, analytics, alerts and health

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod poll;
pub mod selection;
pub mod slot;
pub mod views;

#[cfg(test)]
mod mock;

// Re-export commonly used types for convenience
pub use client::{HttpTransport, RemoteClient, Transport};
pub use config::{ClientConfig, DashboardConfig, FetchLimits, PollIntervals, RefreshRate};
pub use error::{ClientError, TransportReason};
pub use model::{Severity, Symbol, SymbolPair, Timeframe};
pub use selection::SelectionCell;
pub use slot::{Slot, Snapshot};

pub use views::{
    ViewContext,
    alerts::{AlertExporter, AlertsView, ExportArtifact, SeverityFilter},
    analytics::{AnalyticsTab, AnalyticsView, TabPanel},
    controls::{ActionOutcome, Banner, BannerKind, ControlsView, IngestionActions},
    health::{HealthMonitor, HealthStatus},
    live::LiveView,
    statistics::StatisticsView,
};
