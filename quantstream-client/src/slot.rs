//! Snapshot slots.
//!
//! A [`Slot`] holds the latest result of one remote query. Each successful poll replaces it
//! wholesale; a transport failure leaves the previous snapshot displayed and only marks the
//! slot stale.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::ClientError;

/// What a view can render for one query.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Snapshot<T> {
    /// Nothing received yet
    #[default]
    Pending,
    /// The service answered but has no data yet ("insufficient data")
    Empty,
    Ready(T),
}

impl<T> Snapshot<T> {
    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Snapshot::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            Snapshot::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Snapshot::Ready(_))
    }
}

#[derive(Debug)]
struct SlotState<T> {
    snapshot: Snapshot<T>,
    updated_at: Option<DateTime<Utc>>,
    last_error: Option<ClientError>,
}

impl<T> Default for SlotState<T> {
    fn default() -> Self {
        Self {
            snapshot: Snapshot::Pending,
            updated_at: None,
            last_error: None,
        }
    }
}

/// Shared, lock-protected snapshot of one remote query.
#[derive(Debug)]
pub struct Slot<T> {
    state: Arc<RwLock<SlotState<T>>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            state: Arc::default(),
        }
    }
}

impl<T> Slot<T>
where
    T: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one poll outcome into the slot.
    ///
    /// - `Ok` replaces the snapshot
    /// - `Empty` replaces it with [`Snapshot::Empty`]
    /// - transport failures keep the previous snapshot and record the error
    pub fn apply(&self, outcome: Result<T, ClientError>) {
        match outcome {
            Ok(value) => self.replace(value),
            Err(error) if error.is_empty() => {
                let mut state = self.state.write();
                state.snapshot = Snapshot::Empty;
                state.updated_at = Some(Utc::now());
                state.last_error = None;
            }
            Err(error) => {
                self.state.write().last_error = Some(error);
            }
        }
    }

    pub fn replace(&self, value: T) {
        let mut state = self.state.write();
        state.snapshot = Snapshot::Ready(value);
        state.updated_at = Some(Utc::now());
        state.last_error = None;
    }

    /// Forget everything, e.g. when the selection the slot was filled for changes
    pub fn reset(&self) {
        *self.state.write() = SlotState::default();
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.state.read().snapshot.clone()
    }

    pub fn ready(&self) -> Option<T> {
        self.state.read().snapshot.as_ready().cloned()
    }

    /// Borrow the current snapshot without cloning it
    pub fn with<R>(&self, read: impl FnOnce(&Snapshot<T>) -> R) -> R {
        read(&self.state.read().snapshot)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().updated_at
    }

    pub fn last_error(&self) -> Option<ClientError> {
        self.state.read().last_error.clone()
    }

    /// The most recent refresh failed; what is displayed may be outdated
    pub fn is_stale(&self) -> bool {
        self.state.read().last_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportReason;

    #[test]
    fn test_slot_apply_policy() {
        let slot = Slot::<u32>::new();
        assert_eq!(slot.snapshot(), Snapshot::Pending);

        slot.apply(Ok(7));
        assert_eq!(slot.ready(), Some(7));
        assert!(!slot.is_stale());

        // Transport failure keeps the last good value
        slot.apply(Err(ClientError::transport("/x", TransportReason::Timeout)));
        assert_eq!(slot.ready(), Some(7));
        assert!(slot.is_stale());

        // Next success clears the stale flag
        slot.apply(Ok(9));
        assert_eq!(slot.ready(), Some(9));
        assert!(slot.last_error().is_none());

        // Empty result replaces the snapshot
        slot.apply(Err(ClientError::empty("/x")));
        assert_eq!(slot.snapshot(), Snapshot::Empty);
        assert!(!slot.is_stale());
    }

    #[test]
    fn test_slot_reset() {
        let slot = Slot::<u32>::new();
        slot.apply(Ok(1));
        slot.reset();
        assert_eq!(slot.snapshot(), Snapshot::Pending);
        assert!(slot.updated_at().is_none());
    }

    #[test]
    fn test_slot_clones_share_state() {
        let slot = Slot::<String>::new();
        let view = slot.clone();
        slot.replace("BTCUSDT".to_string());
        assert_eq!(view.with(|snapshot| snapshot.is_ready()), true);
    }
}
