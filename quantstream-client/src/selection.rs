//! Selection stability guard.
//!
//! A [`SelectionCell`] holds a view's current selection (a symbol, a symbol pair, a symbol
//! plus timeframe...). Users overwrite it unconditionally; periodic polls may only fill it
//! in while it is empty. Both paths go through the same `watch` channel, so the "is it
//! empty?" decision always reads the value as it is at that instant, never a copy captured
//! when the poll task was scheduled.

use std::{fmt, sync::Arc};

use tokio::sync::watch;
use tracing::debug;

/// Mutable, observable selection owned by one view.
#[derive(Clone)]
pub struct SelectionCell<K> {
    tx: Arc<watch::Sender<Option<K>>>,
}

impl<K> fmt::Debug for SelectionCell<K>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SelectionCell")
            .field(&*self.tx.borrow())
            .finish()
    }
}

impl<K> Default for SelectionCell<K>
where
    K: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(None)
    }
}

impl<K> SelectionCell<K>
where
    K: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(initial: Option<K>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Current selection, read at call time
    pub fn current(&self) -> Option<K> {
        self.tx.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_none()
    }

    /// Overwrite the selection with a user choice. Subscribers are notified only when the
    /// value actually changes, so re-selecting the same key keeps the running poll task.
    pub fn set_user_selection(&self, key: K) {
        let changed = self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&key) {
                return false;
            }
            *current = Some(key.clone());
            true
        });

        if changed {
            debug!(selection = ?key, "user selection applied");
        }
    }

    /// Apply a modification to the current selection in place (e.g. change one leg of a
    /// pair). The closure sees the freshest value.
    pub fn update<F>(&self, modify: F) -> bool
    where
        F: FnOnce(&mut Option<K>),
    {
        self.tx.send_if_modified(|current| {
            let before = current.clone();
            modify(current);
            *current != before
        })
    }

    /// Fill in a default from `available` if, and only if, nothing is selected right now.
    ///
    /// Returns `true` when the default was applied.
    pub fn reconcile_default(&self, available: &[K]) -> bool {
        self.reconcile_with(|| available.first().cloned())
    }

    /// Like [`Self::reconcile_default`] but derives the default lazily. The closure runs
    /// only while the cell is observed empty.
    pub fn reconcile_with<F>(&self, default: F) -> bool
    where
        F: FnOnce() -> Option<K>,
    {
        let applied = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            match default() {
                Some(key) => {
                    *current = Some(key);
                    true
                }
                None => false,
            }
        });

        if applied {
            debug!(selection = ?self.current(), "default selection applied");
        }
        applied
    }

    /// Receiver that observes every change of the selection
    pub fn subscribe(&self) -> watch::Receiver<Option<K>> {
        self.tx.subscribe()
    }
}
