//! Options store port: persistence of user option changes.

use std::future::Future;

use offpeak_domain::error::OffpeakError;
use offpeak_domain::options::OptionUpdate;

/// Persists the latest value of each option, per scheduler.
pub trait OptionsStore: Send + Sync {
    /// Store `update`, replacing any previous value for the same key.
    fn save(
        &self,
        scheduler: &str,
        update: &OptionUpdate,
    ) -> impl Future<Output = Result<(), OffpeakError>> + Send;

    /// All stored updates for `scheduler`, ordered by key.
    fn load(
        &self,
        scheduler: &str,
    ) -> impl Future<Output = Result<Vec<OptionUpdate>, OffpeakError>> + Send;
}

impl<T: OptionsStore> OptionsStore for std::sync::Arc<T> {
    fn save(
        &self,
        scheduler: &str,
        update: &OptionUpdate,
    ) -> impl Future<Output = Result<(), OffpeakError>> + Send {
        (**self).save(scheduler, update)
    }

    fn load(
        &self,
        scheduler: &str,
    ) -> impl Future<Output = Result<Vec<OptionUpdate>, OffpeakError>> + Send {
        (**self).load(scheduler)
    }
}
