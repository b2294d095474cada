// ── Listener dispatch ──
//
// Ordered fan-out with per-listener fault isolation. Listeners are
// registered against a key or against every key, and are invoked
// synchronously in registration order. A panicking listener is logged and
// skipped; delivery to the remaining listeners continues.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::warn;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Which events a listener receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Key(String),
    Any,
}

impl Topic {
    fn matches(&self, key: &str) -> bool {
        match self {
            Self::Key(k) => k == key,
            Self::Any => true,
        }
    }
}

struct Entry<E> {
    id: u64,
    topic: Topic,
    listener: Listener<E>,
}

pub(crate) trait Unregister: Send + Sync {
    fn unregister(&self, id: u64);
}

pub(crate) struct Dispatcher<E> {
    entries: RwLock<Vec<Entry<E>>>,
    next_id: AtomicU64,
}

impl<E: 'static> Dispatcher<E> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        topic: Topic,
        listener: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push(Entry {
            id,
            topic,
            listener: Arc::new(listener),
        });
        let owner: Weak<dyn Unregister> = Arc::downgrade(self) as Weak<dyn Unregister>;
        Subscription {
            id,
            owner: Some(owner),
        }
    }

    /// Deliver `event` to every listener whose topic matches `key`.
    ///
    /// The registry lock is released before any listener runs, so
    /// listeners may subscribe, unsubscribe or trigger nested dispatches.
    pub(crate) fn dispatch(&self, key: &str, event: &E) {
        let targets: Vec<Listener<E>> = self
            .entries
            .read()
            .iter()
            .filter(|entry| entry.topic.matches(key))
            .map(|entry| Arc::clone(&entry.listener))
            .collect();

        for listener in targets {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(key, "state listener panicked; continuing dispatch");
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl<E: 'static> Unregister for Dispatcher<E> {
    fn unregister(&self, id: u64) {
        self.entries.write().retain(|entry| entry.id != id);
    }
}

/// Handle to a registered listener. Dropping it unregisters the listener.
#[must_use = "dropping a Subscription immediately unregisters the listener"]
pub struct Subscription {
    id: u64,
    owner: Option<Weak<dyn Unregister>>,
}

impl Subscription {
    /// Unregister now. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the listener registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.owner = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take().and_then(|weak| weak.upgrade()) {
            owner.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.owner.is_some())
            .finish()
    }
}
