//! Schedule: what the engine intends to do and what it last did.
//!
//! - [`Plan`]: a planned start, its duration and where it came from
//! - [`RuntimeState`]: armed flag, current plan and attempt bookkeeping

pub mod plan;
pub mod runtime;

pub use plan::{Plan, PlanSource, PlanningMode};
pub use runtime::{Phase, RunResult, RuntimeState};
