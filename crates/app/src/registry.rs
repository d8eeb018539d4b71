//! Registry of scheduler instances, keyed by name.
//!
//! Each instance sits behind its own async mutex so that ticks, door events
//! and commands for one device never interleave. Every instance also
//! forwards its snapshots to a shared broadcast feed.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use offpeak_domain::error::{NotFoundError, OffpeakError};

use crate::ports::{Actuator, Clock, StateReader};
use crate::scheduler::{Scheduler, SchedulerSnapshot};

pub type SharedScheduler<R, A, C> = Arc<Mutex<Scheduler<R, A, C>>>;

pub struct SchedulerRegistry<R, A, C> {
    schedulers: BTreeMap<String, SharedScheduler<R, A, C>>,
    feed: broadcast::Sender<SchedulerSnapshot>,
}

impl<R, A, C> SchedulerRegistry<R, A, C>
where
    R: StateReader,
    A: Actuator,
    C: Clock,
{
    /// Create an empty registry whose snapshot feed buffers `capacity`
    /// snapshots per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        Self {
            schedulers: BTreeMap::new(),
            feed,
        }
    }

    /// Take ownership of `scheduler`, replacing any instance with the same name.
    pub fn insert(&mut self, scheduler: Scheduler<R, A, C>) -> SharedScheduler<R, A, C> {
        let feed = self.feed.clone();
        let _ = scheduler.add_listener(move |snapshot| {
            // Only fails without subscribers.
            let _ = feed.send(snapshot.clone());
        });
        let name = scheduler.name().to_string();
        let shared = Arc::new(Mutex::new(scheduler));
        self.schedulers.insert(name, Arc::clone(&shared));
        shared
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<SharedScheduler<R, A, C>> {
        self.schedulers.get(name).cloned()
    }

    /// Like [`get`](Self::get), as an error when missing.
    ///
    /// # Errors
    ///
    /// Returns [`OffpeakError::NotFound`] for unknown names.
    pub fn require(&self, name: &str) -> Result<SharedScheduler<R, A, C>, OffpeakError> {
        self.get(name).ok_or_else(|| {
            NotFoundError {
                entity: "Scheduler",
                id: name.to_string(),
            }
            .into()
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedScheduler<R, A, C>)> {
        self.schedulers
            .iter()
            .map(|(name, scheduler)| (name.as_str(), scheduler))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schedulers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schedulers.is_empty()
    }

    /// Snapshots of every scheduler, ordered by name.
    pub async fn snapshots(&self) -> Vec<SchedulerSnapshot> {
        let mut snapshots = Vec::with_capacity(self.schedulers.len());
        for scheduler in self.schedulers.values() {
            snapshots.push(scheduler.lock().await.snapshot());
        }
        snapshots
    }

    /// Receive every snapshot emitted after this call, from all schedulers.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerSnapshot> {
        self.feed.subscribe()
    }
}
