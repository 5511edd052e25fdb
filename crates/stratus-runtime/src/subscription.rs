//! Reference-counted subscriptions to one upstream feed.
//!
//! Many parts of the controller may want the tenant/config feed, but only
//! one upstream stream should ever be open. [`SubscriptionManager`] keeps
//! the set of interested subscribers and opens the feed on the first
//! subscribe, closing it again when the set becomes empty.
//!
//! ```text
//!  subscribe(A) ──┐                 ┌──────────┐   Action   ┌────────────┐
//!  subscribe(B) ──┼─► interest set ─► Feed::open ├──────────► StateStore │
//!  unsubscribe ───┘   (one mutex)   └──────────┘  forward   └────────────┘
//! ```
//!
//! Membership changes and the open/close they trigger happen under a single
//! lock, so a concurrent "last unsubscribe" and "first subscribe" can never
//! leave two streams open or none open while the set is non-empty.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use stratus_state::{Action, StateStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Opaque handle identifying one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closes an upstream stream. Called exactly once.
pub type Teardown = Box<dyn FnOnce() + Send>;

/// An open upstream stream: its events and the callback that closes it.
pub struct Upstream {
    pub events: mpsc::Receiver<Action>,
    pub teardown: Teardown,
}

/// A source of store actions that can be opened and closed on demand.
pub trait Feed: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Open a fresh stream. Must be called from within a tokio runtime.
    fn open(&self) -> Upstream;
}

struct ActiveStream {
    forward: JoinHandle<()>,
    teardown: Teardown,
}

impl ActiveStream {
    fn close(self) {
        (self.teardown)();
        self.forward.abort();
    }
}

#[derive(Default)]
struct Interest {
    subscribers: HashSet<SubscriptionId>,
    active: Option<ActiveStream>,
    opened: u64,
}

pub struct SubscriptionManager<F: Feed> {
    feed: F,
    store: StateStore,
    interest: Mutex<Interest>,
}

impl<F: Feed> SubscriptionManager<F> {
    pub fn new(feed: F, store: StateStore) -> Self {
        Self {
            feed,
            store,
            interest: Mutex::new(Interest::default()),
        }
    }

    /// Register interest. Opens the upstream if this is the first
    /// subscriber; subscribing twice with the same id is a no-op.
    pub fn subscribe(&self, id: impl Into<SubscriptionId>) {
        let id = id.into();
        let mut interest = self.lock();
        if !interest.subscribers.insert(id.clone()) {
            debug!(feed = self.feed.name(), %id, "already subscribed");
            return;
        }
        debug!(feed = self.feed.name(), %id, subscribers = interest.subscribers.len(), "subscribed");

        if interest.active.is_none() {
            interest.active = Some(self.open());
            interest.opened += 1;
            info!(feed = self.feed.name(), "upstream opened");
        }
    }

    /// Drop interest. Closes the upstream when no subscriber is left.
    pub fn unsubscribe(&self, id: impl Into<SubscriptionId>) {
        let id = id.into();
        let mut interest = self.lock();
        if !interest.subscribers.remove(&id) {
            return;
        }
        debug!(feed = self.feed.name(), %id, subscribers = interest.subscribers.len(), "unsubscribed");

        if interest.subscribers.is_empty() {
            if let Some(stream) = interest.active.take() {
                stream.close();
                info!(feed = self.feed.name(), "upstream closed");
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// How many times the upstream has been opened since creation.
    pub fn times_opened(&self) -> u64 {
        self.lock().opened
    }

    fn open(&self) -> ActiveStream {
        let Upstream { events, teardown } = self.feed.open();
        let forward = tokio::spawn(forward(
            self.feed.name().to_string(),
            events,
            self.store.clone(),
        ));
        ActiveStream { forward, teardown }
    }

    fn lock(&self) -> MutexGuard<'_, Interest> {
        // State behind the lock stays consistent even if a holder panicked.
        self.interest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F: Feed> Drop for SubscriptionManager<F> {
    fn drop(&mut self) {
        let interest = self
            .interest
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(stream) = interest.active.take() {
            stream.close();
        }
    }
}

async fn forward(feed: String, mut events: mpsc::Receiver<Action>, store: StateStore) {
    while let Some(action) = events.recv().await {
        store.dispatch(action);
    }
    debug!(%feed, "upstream ended");
}
