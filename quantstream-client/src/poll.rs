//! Polling scheduler.
//!
//! Every view owns a [`Fence`]. Each recurring fetch runs on its own [`Lane`] of that fence
//! and every activation of a lane draws a fresh [`Generation`]. A fetch may only commit its
//! result while holding the fence lock, and only if its generation is still the lane's
//! current one and the fence has not been closed. This gives the scheduler its cancellation
//! guarantees:
//! - replacing a task (dependency key change) revokes the old generation, so a late
//!   response for the old key is dropped
//! - unmounting a view closes its fence, so nothing can mutate the torn-down instance, and a
//!   freshly mounted instance has its own fence and slots
//!
//! [`PollTask`] fetches immediately and then at a fixed interval without waiting for the
//! previous response, so responses may complete out of order (last completed wins).
//! [`KeyedPoller`] keeps at most one [`PollTask`] alive per dependency key, and a
//! [`Follower`] drives a [`KeyedPoller`] from any [`KeySource`].

use std::{fmt, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{FutureExt, future::BoxFuture};
use parking_lot::Mutex;
use tokio::{
    sync::watch,
    task::{JoinHandle, JoinSet},
    time::MissedTickBehavior,
};
use tracing::{debug, trace};

use crate::{error::ClientError, slot::Slot};

#[derive(Debug, Default)]
struct FenceState {
    closed: bool,
    lanes: Vec<u64>,
}

/// Commit barrier shared by every poll task of one view instance.
#[derive(Debug, Clone, Default)]
pub struct Fence {
    state: Arc<Mutex<FenceState>>,
}

impl Fence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an independent lane of generations
    pub fn lane(&self) -> Lane {
        let mut state = self.state.lock();
        state.lanes.push(0);
        Lane {
            fence: self.clone(),
            index: state.lanes.len() - 1,
        }
    }

    /// Reject every commit from now on. Idempotent.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Sequence of generations for one recurring fetch.
#[derive(Debug, Clone)]
pub struct Lane {
    fence: Fence,
    index: usize,
}

impl Lane {
    /// Start a new generation, invalidating every earlier one on this lane
    pub fn advance(&self) -> Generation {
        let mut state = self.fence.state.lock();
        let current = &mut state.lanes[self.index];
        *current += 1;
        Generation {
            fence: self.fence.clone(),
            lane: self.index,
            id: *current,
        }
    }

    /// Invalidate the current generation without starting a new one
    pub fn revoke(&self) {
        self.fence.state.lock().lanes[self.index] += 1;
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }
}

/// Identity of one activation of a poll task.
#[derive(Clone)]
pub struct Generation {
    fence: Fence,
    lane: usize,
    id: u64,
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generation")
            .field("lane", &self.lane)
            .field("id", &self.id)
            .finish()
    }
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        let state = self.fence.state.lock();
        !state.closed && state.lanes[self.lane] == self.id
    }

    /// Run `commit` if, and only if, this generation is still current. The fence stays
    /// locked while `commit` runs, so a concurrent cancel either happens-before (and the
    /// commit is dropped) or happens-after the whole commit.
    ///
    /// `commit` must not touch the fence itself.
    pub fn commit<R>(&self, commit: impl FnOnce() -> R) -> Option<R> {
        let state = self.fence.state.lock();
        if state.closed || state.lanes[self.lane] != self.id {
            trace!(lane = self.lane, generation = self.id, "dropped stale response");
            return None;
        }
        Some(commit())
    }

    /// Fold `outcome` into `slot` under this generation
    pub fn apply<T>(&self, slot: &Slot<T>, outcome: Result<T, ClientError>) -> bool
    where
        T: Clone,
    {
        self.commit(|| slot.apply(outcome)).is_some()
    }

    /// Invalidate this generation if it is still the lane's current one
    fn expire(&self) {
        let mut state = self.fence.state.lock();
        let current = &mut state.lanes[self.lane];
        if *current == self.id {
            *current += 1;
        }
    }
}

/// Recurring fetch bound to one [`Generation`]. Dropping it cancels the timer, aborts
/// in-flight fetches and expires the generation.
#[derive(Debug)]
pub struct PollTask {
    name: &'static str,
    generation: Generation,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Fetch once now, then every `period`.
    pub fn spawn<F, Fut>(
        name: &'static str,
        period: Duration,
        generation: Generation,
        fetch: F,
    ) -> Self
    where
        F: Fn(Generation) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, ?period, generation = generation.id(), "poll task started");

        let task_generation = generation.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut in_flight = JoinSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !task_generation.is_current() {
                            break;
                        }
                        in_flight.spawn(fetch(task_generation.clone()));
                    }
                    Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                }
            }
        });

        Self {
            name,
            generation,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.generation.expire();
        self.handle.abort();
        debug!(task = self.name, generation = self.generation.id(), "poll task stopped");
    }
}

type KeyedFetch<K> = Arc<dyn Fn(K, Generation) -> BoxFuture<'static, ()> + Send + Sync>;
type Period<K> = Arc<dyn Fn(&K) -> Duration + Send + Sync>;
type RekeyHook<K> = Arc<dyn Fn(Option<&K>) + Send + Sync>;

/// At most one [`PollTask`] per dependency key.
///
/// `Inactive` while the key is `None`. A key change cancels the running task before the
/// task for the new key is installed.
pub struct KeyedPoller<K> {
    name: &'static str,
    lane: Lane,
    period: Period<K>,
    fetch: KeyedFetch<K>,
    on_rekey: Option<RekeyHook<K>>,
    active: Option<(K, PollTask)>,
}

impl<K> fmt::Debug for KeyedPoller<K>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedPoller")
            .field("name", &self.name)
            .field("key", &self.active.as_ref().map(|(key, _)| key))
            .finish_non_exhaustive()
    }
}

impl<K> KeyedPoller<K>
where
    K: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    pub fn new<P, F, Fut>(name: &'static str, lane: Lane, period: P, fetch: F) -> Self
    where
        P: Fn(&K) -> Duration + Send + Sync + 'static,
        F: Fn(K, Generation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            lane,
            period: Arc::new(period),
            fetch: Arc::new(move |key, generation| fetch(key, generation).boxed()),
            on_rekey: None,
            active: None,
        }
    }

    /// Run `hook` with the new key whenever the key changes, after the old task has been
    /// cancelled and before the new one fetches.
    pub fn on_rekey<H>(mut self, hook: H) -> Self
    where
        H: Fn(Option<&K>) + Send + Sync + 'static,
    {
        self.on_rekey = Some(Arc::new(hook));
        self
    }

    pub fn key(&self) -> Option<&K> {
        self.active.as_ref().map(|(key, _)| key)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Follow `key`. Returns `true` if the running task was replaced or stopped.
    pub fn set_key(&mut self, key: Option<K>) -> bool {
        if self.key() == key.as_ref() {
            return false;
        }

        // Cancel first so two timers never race on different keys
        if let Some((previous, task)) = self.active.take() {
            debug!(poller = self.name, key = ?previous, "dependency key released");
            drop(task);
        }
        self.lane.revoke();

        if let Some(hook) = &self.on_rekey {
            hook(key.as_ref());
        }

        if let Some(key) = key {
            debug!(poller = self.name, key = ?key, "dependency key bound");
            let period = (self.period)(&key);
            let fetch = Arc::clone(&self.fetch);
            let task_key = key.clone();
            let task = PollTask::spawn(self.name, period, self.lane.advance(), move |generation| {
                fetch(task_key.clone(), generation)
            });
            self.active = Some((key, task));
        }

        true
    }

    pub fn stop(&mut self) {
        self.set_key(None);
    }

    pub fn lane(&self) -> &Lane {
        &self.lane
    }
}

/// Observable dependency key.
#[async_trait]
pub trait KeySource: Send + 'static {
    type Key: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Key as it is right now; marks the current value as seen
    fn current(&mut self) -> Option<Self::Key>;

    /// Wait for the key to change. Returns `false` once the source is gone.
    async fn changed(&mut self) -> bool;
}

#[async_trait]
impl<K> KeySource for watch::Receiver<Option<K>>
where
    K: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    type Key = K;

    fn current(&mut self) -> Option<K> {
        self.borrow_and_update().clone()
    }

    async fn changed(&mut self) -> bool {
        watch::Receiver::changed(self).await.is_ok()
    }
}

/// Combinators over [`KeySource`]s.
pub trait KeySourceExt: KeySource + Sized {
    /// Key that is present only while both sources have one
    fn zip<Other>(self, other: Other) -> Zip<Self, Other>
    where
        Other: KeySource,
    {
        Zip {
            left: self,
            right: other,
        }
    }

    /// Treat keys rejected by `keep` as absent
    fn filter<F>(self, keep: F) -> Filter<Self, F>
    where
        F: Fn(&Self::Key) -> bool + Send + Sync + 'static,
    {
        Filter { inner: self, keep }
    }
}

impl<S> KeySourceExt for S where S: KeySource {}

#[derive(Debug)]
pub struct Zip<A, B> {
    left: A,
    right: B,
}

#[async_trait]
impl<A, B> KeySource for Zip<A, B>
where
    A: KeySource,
    B: KeySource,
{
    type Key = (A::Key, B::Key);

    fn current(&mut self) -> Option<Self::Key> {
        let left = self.left.current();
        let right = self.right.current();
        left.zip(right)
    }

    async fn changed(&mut self) -> bool {
        tokio::select! {
            alive = self.left.changed() => alive,
            alive = self.right.changed() => alive,
        }
    }
}

pub struct Filter<S, F> {
    inner: S,
    keep: F,
}

#[async_trait]
impl<S, F> KeySource for Filter<S, F>
where
    S: KeySource,
    F: Fn(&S::Key) -> bool + Send + Sync + 'static,
{
    type Key = S::Key;

    fn current(&mut self) -> Option<Self::Key> {
        self.inner.current().filter(|key| (self.keep)(key))
    }

    async fn changed(&mut self) -> bool {
        self.inner.changed().await
    }
}

/// Task that re-keys a [`KeyedPoller`] every time its [`KeySource`] changes. Dropping it
/// stops the poller.
#[derive(Debug)]
pub struct Follower {
    lane: Lane,
    handle: JoinHandle<()>,
}

impl Follower {
    pub fn spawn<S>(mut source: S, mut poller: KeyedPoller<S::Key>) -> Self
    where
        S: KeySource,
    {
        let lane = poller.lane().clone();
        let handle = tokio::spawn(async move {
            loop {
                poller.set_key(source.current());
                if !source.changed().await {
                    break;
                }
            }
            poller.stop();
        });

        Self { lane, handle }
    }
}

impl Drop for Follower {
    fn drop(&mut self) {
        self.lane.revoke();
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Symbol, selection::SelectionCell, slot::Snapshot};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(lane: &Lane, period: Duration) -> (PollTask, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let task = PollTask::spawn("count", period, lane.advance(), {
            let count = Arc::clone(&count);
            move |generation: Generation| {
                let count = Arc::clone(&count);
                async move {
                    generation.commit(|| count.fetch_add(1, Ordering::SeqCst));
                }
            }
        });
        (task, count)
    }

    fn recording_poller(
        lane: Lane,
        period: Duration,
        latency: Duration,
    ) -> (KeyedPoller<Symbol>, Arc<Mutex<Vec<Symbol>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let poller = KeyedPoller::new("record", lane, move |_| period, {
            let log = Arc::clone(&log);
            move |key: Symbol, generation: Generation| {
                let log = Arc::clone(&log);
                async move {
                    tokio::time::sleep(latency).await;
                    generation.commit(|| log.lock().push(key));
                }
            }
        });
        (poller, log)
    }

    #[test]
    fn test_generation_fencing() {
        let fence = Fence::new();
        let lane = fence.lane();
        let other = fence.lane();

        let first = lane.advance();
        let second = lane.advance();
        let independent = other.advance();

        assert_eq!(first.commit(|| ()), None);
        assert_eq!(second.commit(|| 1), Some(1));
        assert!(independent.is_current());

        lane.revoke();
        assert!(!second.is_current());

        fence.close();
        assert!(!independent.is_current());
        assert!(lane.advance().commit(|| ()).is_none());
    }

    #[test]
    fn test_generation_apply_into_slot() {
        let fence = Fence::new();
        let lane = fence.lane();
        let slot = Slot::<u32>::new();

        let stale = lane.advance();
        let live = lane.advance();
        assert!(!stale.apply(&slot, Ok(1)));
        assert!(live.apply(&slot, Ok(2)));
        assert_eq!(slot.snapshot(), Snapshot::Ready(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_task_fetches_immediately_then_at_interval() {
        let fence = Fence::new();
        let (_task, count) = counting_task(&fence.lane(), Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_poll_task_never_fetches_again() {
        let fence = Fence::new();
        let (task, count) = counting_task(&fence.lane(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        drop(task);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_fence_drops_in_flight_response() {
        let fence = Fence::new();
        let slot = Slot::<u32>::new();
        let _task = PollTask::spawn("slow", Duration::from_secs(5), fence.lane().advance(), {
            let slot = slot.clone();
            move |generation: Generation| {
                let slot = slot.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    generation.apply(&slot, Ok(7));
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        fence.close();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(slot.snapshot(), Snapshot::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyed_poller_rekey_keeps_a_single_timer() {
        let fence = Fence::new();
        let (mut poller, log) =
            recording_poller(fence.lane(), Duration::from_secs(2), Duration::ZERO);

        assert!(poller.set_key(Some(Symbol::from("BTCUSDT"))));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(log.lock().len(), 2);

        // Re-selecting the same key keeps the running task
        assert!(!poller.set_key(Some(Symbol::from("BTCUSDT"))));

        assert!(poller.set_key(Some(Symbol::from("ETHUSDT"))));
        log.lock().clear();

        // One immediate fetch plus one per period: a second timer would double this
        tokio::time::sleep(Duration::from_millis(6500)).await;
        let fetched = log.lock().clone();
        assert_eq!(fetched.len(), 4);
        assert!(fetched.iter().all(|key| key == "ETHUSDT"));

        poller.set_key(None);
        assert!(!poller.is_active());
        log.lock().clear();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_for_previous_key_is_dropped() {
        let fence = Fence::new();
        let (mut poller, log) =
            recording_poller(fence.lane(), Duration::from_secs(5), Duration::from_secs(1));

        poller.set_key(Some(Symbol::from("BTCUSDT")));
        tokio::time::sleep(Duration::from_millis(500)).await;
        poller.set_key(Some(Symbol::from("ETHUSDT")));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*log.lock(), vec![Symbol::from("ETHUSDT")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rekey_hook_runs_on_change() {
        let fence = Fence::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (poller, _log) =
            recording_poller(fence.lane(), Duration::from_secs(2), Duration::ZERO);
        let mut poller = poller.on_rekey({
            let seen = Arc::clone(&seen);
            move |key: Option<&Symbol>| seen.lock().push(key.cloned())
        });

        poller.set_key(Some(Symbol::from("BTCUSDT")));
        poller.set_key(Some(Symbol::from("BTCUSDT")));
        poller.set_key(None);

        assert_eq!(*seen.lock(), vec![Some(Symbol::from("BTCUSDT")), None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follower_tracks_selection() {
        let fence = Fence::new();
        let cell = SelectionCell::<Symbol>::default();
        let (poller, log) =
            recording_poller(fence.lane(), Duration::from_secs(1), Duration::ZERO);
        let follower = Follower::spawn(cell.subscribe(), poller);

        // Inactive while nothing is selected
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(log.lock().is_empty());

        cell.set_user_selection(Symbol::from("SOLUSDT"));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(log.lock().len(), 2);

        drop(follower);
        log.lock().clear();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zip_and_filter_sources() {
        let symbol = SelectionCell::new(Some(Symbol::from("BTCUSDT")));
        let peer = SelectionCell::<Symbol>::default();

        let mut source = symbol
            .subscribe()
            .zip(peer.subscribe())
            .filter(|(first, second): &(Symbol, Symbol)| first != second);
        assert_eq!(source.current(), None);

        peer.set_user_selection(Symbol::from("BTCUSDT"));
        assert!(source.changed().await);
        assert_eq!(source.current(), None);

        peer.set_user_selection(Symbol::from("ETHUSDT"));
        assert!(source.changed().await);
        assert_eq!(
            source.current(),
            Some((Symbol::from("BTCUSDT"), Symbol::from("ETHUSDT")))
        );
    }
}
