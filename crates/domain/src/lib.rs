//! # offpeak-domain
//!
//! Pure domain model for the offpeak appliance scheduler.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, timestamps, times of day
//! - Decide whether an instant or a run fits an **allowed window**
//! - Parse heterogeneous **signals** (cheapest hour, device status) into canonical values
//! - Normalise **price curves** and search them for the cheapest contiguous run
//! - Define the scheduler's **runtime state**, plans and user-facing **options**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod options;
pub mod price;
pub mod schedule;
pub mod signal;
pub mod window;
