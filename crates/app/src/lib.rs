//! # offpeak-app
//!
//! Application layer: the **scheduling engine**, **port definitions** (traits)
//! and the background tasks that drive the engine.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `StateReader`: current value of an external signal
//!   - `Actuator`: press the start button, turn the power on
//!   - `OptionsStore`: persist user option changes
//!   - `EventPublisher`: publish signal transitions
//!   - `Clock`: current instant
//! - Own the **scheduling engine** (`Scheduler`) and its listener registry
//! - Provide **in-process infrastructure** (event bus, minute ticker, door
//!   watcher) that doesn't need IO
//! - Expose **driving/inbound ports** as services (`ControlService`)
//!
//! ## Dependency rule
//! Depends on `offpeak-domain` only (plus `tokio::sync`/`tokio::time`).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod listeners;
pub mod ports;
pub mod registry;
pub mod scheduler;
pub mod services;
pub mod tasks;
