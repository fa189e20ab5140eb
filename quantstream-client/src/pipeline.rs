//! Derived analytics pipeline.
//!
//! Two composition patterns over [`RemoteClient`] calls, both committing through a
//! [`Generation`]:
//! - [`join_into`]: two independent fetches issued concurrently, each committing its own
//!   slot as soon as it completes. A failure in one never blocks the other.
//! - [`run_pairs_cycle`]: regression then spread. The spread is requested with the hedge
//!   ratio of the regression that just completed for the same pair, or skipped entirely for
//!   this cycle if the regression failed.

use std::future::Future;

use tracing::debug;

use crate::{
    client::RemoteClient,
    error::ClientError,
    model::{RegressionResult, SpreadSnapshot, SymbolPair},
    poll::Generation,
    slot::Slot,
};

/// Issue both fetches concurrently and commit each result independently.
///
/// Returns which of the two results were committed.
pub async fn join_into<A, B, FutA, FutB>(
    generation: &Generation,
    (slot_a, fetch_a): (&Slot<A>, FutA),
    (slot_b, fetch_b): (&Slot<B>, FutB),
) -> (bool, bool)
where
    A: Clone,
    B: Clone,
    FutA: Future<Output = Result<A, ClientError>>,
    FutB: Future<Output = Result<B, ClientError>>,
{
    tokio::join!(
        async { generation.apply(slot_a, fetch_a.await) },
        async { generation.apply(slot_b, fetch_b.await) },
    )
}

/// Slots written by the pairs pipeline.
#[derive(Debug, Clone, Default)]
pub struct PairsSlots {
    pub regression: Slot<RegressionResult>,
    pub spread: Slot<SpreadSnapshot>,
}

impl PairsSlots {
    pub fn reset(&self) {
        self.regression.reset();
        self.spread.reset();
    }

    /// Spread snapshot, but only if it was computed for `pair`
    pub fn spread_for(&self, pair: &SymbolPair) -> Option<SpreadSnapshot> {
        self.spread
            .ready()
            .filter(|spread| pair.matches(&spread.symbol1, &spread.symbol2))
    }
}

/// How one pairs cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairsCycle {
    /// Both legs are the same symbol; nothing was fetched
    Degenerate,
    /// Regression failed; spread skipped and the previous spread left displayed
    RegressionFailed,
    /// The generation was cancelled while the cycle was running
    Cancelled,
    /// Spread requested with the fresh hedge ratio
    Completed { spread_committed: bool },
}

/// Run one regression -> spread cycle for `pair`.
///
/// The regression is of `pair.first` (y) on `pair.second` (x); the spread is
/// `pair.first - beta * pair.second`.
pub async fn run_pairs_cycle(
    client: &RemoteClient,
    pair: &SymbolPair,
    generation: &Generation,
    slots: &PairsSlots,
) -> PairsCycle {
    if pair.is_degenerate() {
        return PairsCycle::Degenerate;
    }

    let regression = match client
        .regression(pair.second.clone(), pair.first.clone())
        .await
    {
        Ok(regression) => regression,
        Err(error) => {
            debug!(%pair, %error, "regression failed, skipping spread");
            generation.apply(&slots.regression, Err(error));
            return PairsCycle::RegressionFailed;
        }
    };

    let hedge_ratio = regression.hedge_ratio();
    if !generation.apply(&slots.regression, Ok(regression)) {
        return PairsCycle::Cancelled;
    }

    let spread = client
        .spread(pair.first.clone(), pair.second.clone(), hedge_ratio)
        .await;
    let spread_committed = generation.apply(&slots.spread, spread);

    PairsCycle::Completed { spread_committed }
}
