//! Shared application state for axum handlers.

use std::sync::Arc;

use offpeak_app::services::control_service::ControlService;

/// Application state shared across all axum handlers.
///
/// Generic over the scheduler ports and the options store to avoid dynamic
/// dispatch. `Clone` is implemented manually so the underlying types do not
/// need to be `Clone`.
pub struct AppState<R, A, C, St> {
    pub control: Arc<ControlService<R, A, C, St>>,
}

impl<R, A, C, St> Clone for AppState<R, A, C, St> {
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
        }
    }
}

impl<R, A, C, St> AppState<R, A, C, St> {
    pub fn new(control: ControlService<R, A, C, St>) -> Self {
        Self {
            control: Arc::new(control),
        }
    }

    /// Use a service already shared with background tasks.
    pub fn from_arc(control: Arc<ControlService<R, A, C, St>>) -> Self {
        Self { control }
    }
}
