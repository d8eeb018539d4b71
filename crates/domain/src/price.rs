//! Price curves and the cheapest-window search.
//!
//! A curve arrives as two loosely-typed record lists (`raw_today` and
//! `raw_tomorrow`). Records are normalised into [`PriceSlot`]s, then
//! [`find_cheapest_window`] slides a run of contiguous slots across them and
//! keeps the lowest total that fits the [`AllowedWindow`].

use chrono::{Duration, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::signal::parse_timestamp;
use crate::time::Timestamp;
use crate::window::AllowedWindow;

/// Attribute keys holding the two halves of a curve.
pub const CURVE_KEYS: [&str; 2] = ["raw_today", "raw_tomorrow"];

const START_FIELDS: [&str; 2] = ["start", "hour"];
const VALUE_FIELDS: [&str; 2] = ["value", "price"];

/// Assumed slot width when the curve is too short to infer one.
pub const DEFAULT_SLOT_MINUTES: i64 = 30;

/// One block of forecast cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSlot {
    pub start: Timestamp,
    pub price: f64,
}

impl PriceSlot {
    #[must_use]
    pub fn new(start: Timestamp, price: f64) -> Self {
        Self { start, price }
    }
}

/// Price records parsed from a signal's attributes, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceCurve {
    slots: Vec<PriceSlot>,
}

impl PriceCurve {
    /// Read `raw_today` and `raw_tomorrow`, skipping records whose start or
    /// price cannot be parsed. Offset-less timestamps are read in `tz`.
    #[must_use]
    pub fn from_attributes<Tz: TimeZone>(attributes: &serde_json::Value, tz: &Tz) -> Self {
        let slots = CURVE_KEYS
            .iter()
            .filter_map(|key| attributes.get(key))
            .filter_map(serde_json::Value::as_array)
            .flatten()
            .filter_map(|record| parse_record(record, tz))
            .collect();
        Self { slots }
    }

    #[must_use]
    pub fn from_slots(slots: Vec<PriceSlot>) -> Self {
        Self { slots }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Sort ascending by start and drop slots that started before `now`.
    #[must_use]
    pub fn normalize(mut self, now: Timestamp) -> Vec<PriceSlot> {
        self.slots.sort_by_key(|slot| slot.start);
        self.slots.retain(|slot| slot.start >= now);
        self.slots
    }
}

fn parse_record<Tz: TimeZone>(record: &serde_json::Value, tz: &Tz) -> Option<PriceSlot> {
    let start = START_FIELDS
        .iter()
        .find_map(|field| record.get(field))
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| parse_timestamp(raw, tz))?;
    let price = VALUE_FIELDS
        .iter()
        .find_map(|field| record.get(field))
        .and_then(parse_price)?;
    Some(PriceSlot { start, price })
}

fn parse_price(value: &serde_json::Value) -> Option<f64> {
    let price = match value {
        serde_json::Value::Number(number) => number.as_f64()?,
        serde_json::Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    price.is_finite().then_some(price)
}

/// The cheapest contiguous run found by [`find_cheapest_window`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceWindow {
    pub start: Timestamp,
    pub end: Timestamp,
    pub slots: usize,
    pub total_cost: f64,
}

impl PriceWindow {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_price(&self) -> f64 {
        if self.slots == 0 {
            return 0.0;
        }
        self.total_cost / self.slots as f64
    }
}

/// Smallest positive gap between consecutive (sorted) slots, in minutes.
#[must_use]
pub fn infer_slot_minutes(slots: &[PriceSlot]) -> i64 {
    slots
        .windows(2)
        .map(|pair| (pair[1].start - pair[0].start).num_minutes())
        .filter(|gap| *gap > 0)
        .min()
        .unwrap_or(DEFAULT_SLOT_MINUTES)
}

/// Number of slots of `slot_minutes` needed to cover `duration_minutes`.
#[must_use]
pub fn required_slots(duration_minutes: i64, slot_minutes: i64) -> usize {
    if duration_minutes <= 0 || slot_minutes <= 0 {
        return 1;
    }
    let count = (duration_minutes + slot_minutes - 1) / slot_minutes;
    usize::try_from(count).unwrap_or(usize::MAX)
}

/// Find the lowest-cost run of contiguous slots covering `duration_minutes`
/// that fits `window` in `tz`.
///
/// `slots` must already be normalised (sorted, future only). Ties keep the
/// earliest start.
///
/// # Errors
///
/// - [`PlanError::InsufficientData`] when there are fewer slots than the run needs
/// - [`PlanError::WindowViolation`] when no candidate fits the window
pub fn find_cheapest_window<Tz: TimeZone>(
    slots: &[PriceSlot],
    duration_minutes: i64,
    window: &AllowedWindow,
    tz: &Tz,
) -> Result<PriceWindow, PlanError> {
    let slot_minutes = infer_slot_minutes(slots);
    let required = required_slots(duration_minutes, slot_minutes);
    if slots.len() < required {
        return Err(PlanError::InsufficientData {
            available: slots.len(),
            required,
        });
    }

    let mut best: Option<PriceWindow> = None;
    for run in slots.windows(required) {
        if !is_contiguous(run, slot_minutes) {
            continue;
        }
        let start = run[0].start;
        if !window.contains_span(start, duration_minutes, tz) {
            continue;
        }
        let total_cost: f64 = run.iter().map(|slot| slot.price).sum();
        if best.as_ref().is_none_or(|b| total_cost < b.total_cost) {
            best = Some(PriceWindow {
                start,
                end: start + Duration::minutes(duration_minutes),
                slots: required,
                total_cost,
            });
        }
    }
    best.ok_or(PlanError::WindowViolation)
}

fn is_contiguous(run: &[PriceSlot], slot_minutes: i64) -> bool {
    run.windows(2)
        .all(|pair| (pair[1].start - pair[0].start).num_minutes() == slot_minutes)
}
