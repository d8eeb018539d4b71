//! # offpeak-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a JSON API over the schedulers (`/api/schedulers`, `/api/log`)
//! - Stream scheduler snapshots as Server-Sent Events
//! - Map HTTP requests into [`ControlService`](offpeak_app::services::control_service::ControlService)
//!   calls and its results into HTTP responses
//!
//! ## Dependency rule
//! Depends on `offpeak-app` (for port traits and services) and `offpeak-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
