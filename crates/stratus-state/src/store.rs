//! StateStore: publishes immutable snapshots of [`State`].
//!
//! Backed by a `tokio::sync::watch` channel: `dispatch` reduces an action
//! into a new snapshot and notifies subscribers, `snapshot` never blocks
//! and always returns the latest value.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::action::Action;
use crate::state::State;

/// Shared handle to the controller state. `Clone` + `Send` + `Sync`.
#[derive(Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<Arc<State>>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(State::new())
    }
}

impl StateStore {
    pub fn new(initial: State) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Reduce an action into a new snapshot.
    ///
    /// Readers holding an earlier snapshot keep seeing it unchanged.
    pub fn dispatch(&self, action: Action) {
        debug!(action = %action.label(), "dispatch");
        self.tx.send_modify(|state| Arc::make_mut(state).reduce(action));
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Arc<State> {
        self.tx.borrow().clone()
    }

    /// Receiver notified after every dispatch.
    pub fn subscribe(&self) -> watch::Receiver<Arc<State>> {
        self.tx.subscribe()
    }
}
