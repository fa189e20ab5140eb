//! Dashboard views.
//!
//! A view is mounted by constructing it and unmounted by dropping it. Mounting spawns the
//! view's poll tasks immediately; dropping closes the view's [`Fence`] before any task is
//! torn down, so no late response can touch the instance afterwards.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tracing::info;

use crate::{
    client::RemoteClient,
    config::{DashboardConfig, FetchLimits, PollIntervals},
    poll::{Fence, Follower, Generation, KeySource, KeyedPoller, Lane, PollTask},
};

/// Ingestion start/stop.
pub mod controls;

/// Latest prices and tick buffer.
pub mod live;

/// Rolling statistics and z-score.
pub mod statistics;

/// Price chart, z-score, correlation, pairs and stationarity tabs.
pub mod analytics;

/// Severity-filtered alert feed and export.
pub mod alerts;

/// Service reachability probe consumed by the outer shell.
pub mod health;

/// Shared dependencies handed to every view on mount.
#[derive(Debug, Clone)]
pub struct ViewContext {
    pub client: RemoteClient,
    pub intervals: PollIntervals,
    pub limits: FetchLimits,
}

impl ViewContext {
    pub fn new(client: RemoteClient, config: &DashboardConfig) -> Self {
        Self {
            client,
            intervals: config.intervals,
            limits: config.limits,
        }
    }
}

/// Poll tasks of one mounted view instance.
#[derive(Debug)]
pub struct Mount {
    name: &'static str,
    fence: Fence,
    tasks: Vec<PollTask>,
    followers: Vec<Follower>,
}

impl Mount {
    pub fn new(name: &'static str) -> Self {
        info!(view = name, "view mounted");
        Self {
            name,
            fence: Fence::new(),
            tasks: Vec::new(),
            followers: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Fresh lane on this view's fence
    pub fn lane(&self) -> Lane {
        self.fence.lane()
    }

    /// Unkeyed recurring fetch, active for as long as the view is mounted
    pub fn poll<F, Fut>(&mut self, name: &'static str, period: Duration, fetch: F)
    where
        F: Fn(Generation) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.fence.lane().advance();
        self.tasks
            .push(PollTask::spawn(name, period, generation, fetch));
    }

    /// Recurring fetch restarted on every change of `source`
    pub fn follow<S>(&mut self, source: S, poller: KeyedPoller<S::Key>)
    where
        S: KeySource,
    {
        self.followers.push(Follower::spawn(source, poller));
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.fence.close();
        info!(view = self.name, "view unmounted");
    }
}

/// Allows one operation at a time; re-invocation while in flight is rejected.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    /// Claim the flight. `None` while another claim is alive.
    pub fn try_begin(&self) -> Option<FlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases its [`SingleFlight`] on drop.
#[derive(Debug)]
pub struct FlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let flight = SingleFlight::default();

        let guard = flight.try_begin();
        assert!(guard.is_some());
        assert!(flight.is_busy());
        assert!(flight.clone().try_begin().is_none());

        drop(guard);
        assert!(!flight.is_busy());
        assert!(flight.try_begin().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_mount_closes_fence() {
        let mut mount = Mount::new("test");
        let fence = mount.fence().clone();
        mount.poll("noop", Duration::from_secs(1), |_| async {});
        assert!(!fence.is_closed());

        drop(mount);
        assert!(fence.is_closed());
    }
}
