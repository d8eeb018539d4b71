//! Control service: commands and queries against named schedulers.

use std::sync::Arc;

use tokio::sync::broadcast;

use offpeak_domain::error::OffpeakError;
use offpeak_domain::options::OptionUpdate;

use crate::ports::{Actuator, Clock, OptionsStore, StateReader};
use crate::registry::SchedulerRegistry;
use crate::scheduler::{PriceScheduleRequest, SchedulerSnapshot};

/// Entry point for everything outside the engine: the HTTP API and start-up.
pub struct ControlService<R, A, C, St> {
    registry: Arc<SchedulerRegistry<R, A, C>>,
    store: St,
}

impl<R, A, C, St> ControlService<R, A, C, St>
where
    R: StateReader,
    A: Actuator,
    C: Clock,
    St: OptionsStore,
{
    /// Create a new service over `registry`, persisting option changes to `store`.
    pub fn new(registry: Arc<SchedulerRegistry<R, A, C>>, store: St) -> Self {
        Self { registry, store }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SchedulerRegistry<R, A, C>> {
        &self.registry
    }

    /// Snapshots of all schedulers, ordered by name.
    pub async fn list(&self) -> Vec<SchedulerSnapshot> {
        self.registry.snapshots().await
    }

    /// # Errors
    ///
    /// Returns [`OffpeakError::NotFound`] for unknown names.
    pub async fn get(&self, name: &str) -> Result<SchedulerSnapshot, OffpeakError> {
        let scheduler = self.registry.require(name)?;
        let snapshot = scheduler.lock().await.snapshot();
        Ok(snapshot)
    }

    /// # Errors
    ///
    /// Returns [`OffpeakError::NotFound`] for unknown names.
    #[tracing::instrument(skip(self))]
    pub async fn set_armed(
        &self,
        name: &str,
        armed: bool,
    ) -> Result<SchedulerSnapshot, OffpeakError> {
        let scheduler = self.registry.require(name)?;
        let mut scheduler = scheduler.lock().await;
        scheduler.set_armed(armed).await;
        Ok(scheduler.snapshot())
    }

    /// # Errors
    ///
    /// Returns [`OffpeakError::NotFound`] for unknown names.
    #[tracing::instrument(skip(self))]
    pub async fn recompute(&self, name: &str) -> Result<SchedulerSnapshot, OffpeakError> {
        let scheduler = self.registry.require(name)?;
        let mut scheduler = scheduler.lock().await;
        scheduler.recompute().await;
        Ok(scheduler.snapshot())
    }

    /// Planning failures are not errors: they show up as an absent plan in
    /// the returned snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`OffpeakError::NotFound`] for unknown names.
    #[tracing::instrument(skip(self))]
    pub async fn schedule_from_prices(
        &self,
        name: &str,
        request: PriceScheduleRequest,
    ) -> Result<SchedulerSnapshot, OffpeakError> {
        let scheduler = self.registry.require(name)?;
        let mut scheduler = scheduler.lock().await;
        scheduler.schedule_from_prices(request).await;
        Ok(scheduler.snapshot())
    }

    /// Validate, persist, then apply an option change.
    ///
    /// # Errors
    ///
    /// - [`OffpeakError::NotFound`] for unknown names
    /// - [`OffpeakError::Validation`] for rejected values (nothing is stored)
    /// - a storage error from the options store (nothing is applied)
    #[tracing::instrument(skip(self))]
    pub async fn update_option(
        &self,
        name: &str,
        update: OptionUpdate,
    ) -> Result<SchedulerSnapshot, OffpeakError> {
        let scheduler = self.registry.require(name)?;
        update.validate()?;
        self.store.save(name, &update).await?;
        let mut scheduler = scheduler.lock().await;
        scheduler.apply_option(&update).await?;
        Ok(scheduler.snapshot())
    }

    /// Re-apply persisted option changes to every scheduler. Stored values
    /// that no longer validate are skipped. Returns how many were applied.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the options store.
    #[tracing::instrument(skip(self))]
    pub async fn restore_options(&self) -> Result<usize, OffpeakError> {
        let mut applied = 0;
        for (name, scheduler) in self.registry.iter() {
            let updates = self.store.load(name).await?;
            let mut scheduler = scheduler.lock().await;
            for update in updates {
                match scheduler.apply_option(&update).await {
                    Ok(()) => applied += 1,
                    Err(err) => {
                        tracing::warn!(scheduler = %name, key = update.key(), error = %err, "skipping stored option");
                    }
                }
            }
        }
        tracing::info!(applied, "restored stored options");
        Ok(applied)
    }

    /// Snapshots emitted by any scheduler from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerSnapshot> {
        self.registry.subscribe()
    }
}
