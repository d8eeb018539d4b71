//! Listener registry: observers notified after every engine mutation.
//!
//! Callbacks run synchronously, in registration order. The list is copied
//! before dispatch so a callback may remove itself (or any other listener)
//! while being invoked.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::scheduler::SchedulerSnapshot;

type Callback = Arc<dyn Fn(&SchedulerSnapshot) + Send + Sync>;

#[derive(Default)]
struct Entries {
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

/// Registry of snapshot observers for one scheduler.
#[derive(Clone, Default)]
pub struct Listeners {
    entries: Arc<Mutex<Entries>>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}

impl Listeners {
    /// Register `callback`; it stays registered until the returned handle's
    /// [`remove`](ListenerHandle::remove) is called.
    pub fn add<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&SchedulerSnapshot) + Send + Sync + 'static,
    {
        let mut entries = lock(&self.entries);
        let id = entries.next_id;
        entries.next_id += 1;
        entries.callbacks.push((id, Arc::new(callback)));
        ListenerHandle {
            id,
            entries: Arc::downgrade(&self.entries),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every registered callback with `snapshot`.
    pub fn notify(&self, snapshot: &SchedulerSnapshot) {
        let callbacks: Vec<Callback> = lock(&self.entries)
            .callbacks
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(snapshot);
        }
    }
}

/// Removes one listener. Dropping the handle keeps the listener registered.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: u64,
    entries: Weak<Mutex<Entries>>,
}

impl ListenerHandle {
    /// Unregister the listener. Calling it twice, or after the registry is
    /// gone, does nothing.
    pub fn remove(&self) {
        if let Some(entries) = self.entries.upgrade() {
            lock(&entries).callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(entries: &Mutex<Entries>) -> MutexGuard<'_, Entries> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
