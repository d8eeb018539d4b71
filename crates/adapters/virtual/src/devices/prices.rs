//! Virtual electricity price feed.
//!
//! Prices follow a fixed daily shape of 48 half-hour slots: cheapest around
//! 02:30 local time, rising towards midday, with an evening peak between
//! 17:00 and 20:00.

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

use offpeak_domain::price::{PriceCurve, PriceSlot};
use offpeak_domain::signal::SignalState;
use offpeak_domain::time::Timestamp;

const SLOTS_PER_DAY: u32 = 48;
const CHEAPEST_SLOT: u32 = 5;
const EVENING_PEAK: std::ops::Range<u32> = 34..40;

/// Price of the `index`-th half-hour slot of a day, in currency units per kWh.
#[must_use]
pub fn slot_price(index: u32) -> f64 {
    let index = index % SLOTS_PER_DAY;
    let distance = index.abs_diff(CHEAPEST_SLOT);
    let distance = distance.min(SLOTS_PER_DAY - distance);
    let peak = if EVENING_PEAK.contains(&index) { 100 } else { 0 };
    f64::from(80 + 10 * distance + peak) / 1000.0
}

/// Entity ids exposed by the price feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFeedEntities {
    /// Current price, with the `raw_today`/`raw_tomorrow` curve as attributes.
    pub price: String,
    /// Local hour of the cheapest upcoming slot.
    pub cheapest_hour: String,
}

impl Default for PriceFeedEntities {
    fn default() -> Self {
        Self {
            price: "sensor.electricity_price".to_string(),
            cheapest_hour: "sensor.cheapest_hour".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct VirtualPriceFeed {
    entities: PriceFeedEntities,
    timezone: Tz,
}

impl VirtualPriceFeed {
    #[must_use]
    pub fn new(timezone: Tz) -> Self {
        Self {
            entities: PriceFeedEntities::default(),
            timezone,
        }
    }

    #[must_use]
    pub fn entities(&self) -> &PriceFeedEntities {
        &self.entities
    }

    #[must_use]
    pub fn owns(&self, entity_id: &str) -> bool {
        entity_id == self.entities.price || entity_id == self.entities.cheapest_hour
    }

    /// The slots of one local day. Slots falling into a DST gap are skipped.
    #[must_use]
    pub fn day_slots(&self, date: NaiveDate) -> Vec<PriceSlot> {
        (0..SLOTS_PER_DAY)
            .filter_map(|index| {
                let time = NaiveTime::from_hms_opt(index / 2, (index % 2) * 30, 0)?;
                let start = self
                    .timezone
                    .from_local_datetime(&date.and_time(time))
                    .earliest()?;
                Some(PriceSlot::new(start.to_utc(), slot_price(index)))
            })
            .collect()
    }

    #[must_use]
    pub fn read(&self, entity_id: &str, now: Timestamp) -> Option<SignalState> {
        let today = now.with_timezone(&self.timezone).date_naive();
        let tomorrow = today.succ_opt()?;
        let raw_today = self.day_slots(today);
        let raw_tomorrow = self.day_slots(tomorrow);

        if entity_id == self.entities.price {
            let current = raw_today
                .iter()
                .rev()
                .find(|slot| slot.start <= now)
                .map_or_else(|| "unknown".to_string(), |slot| format!("{:.3}", slot.price));
            let attributes = serde_json::json!({
                "raw_today": self.records(&raw_today),
                "raw_tomorrow": self.records(&raw_tomorrow),
                "unit_of_measurement": "EUR/kWh",
            });
            Some(SignalState::new(current).with_attributes(attributes))
        } else if entity_id == self.entities.cheapest_hour {
            let horizon = now + Duration::hours(24);
            let upcoming = PriceCurve::from_slots([raw_today, raw_tomorrow].concat())
                .normalize(now)
                .into_iter()
                .filter(|slot| slot.start < horizon);
            let cheapest = upcoming.fold(None::<PriceSlot>, |best, slot| match best {
                Some(best) if best.price <= slot.price => Some(best),
                _ => Some(slot),
            });
            let state = cheapest.map_or_else(
                || "unknown".to_string(),
                |slot| slot.start.with_timezone(&self.timezone).hour().to_string(),
            );
            Some(SignalState::new(state))
        } else {
            None
        }
    }

    fn records(&self, slots: &[PriceSlot]) -> serde_json::Value {
        slots
            .iter()
            .map(|slot| {
                serde_json::json!({
                    "start": slot.start.with_timezone(&self.timezone).to_rfc3339(),
                    "value": slot.price,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use offpeak_domain::price::find_cheapest_window;
    use offpeak_domain::window::{AllowedWindow, TimeOfDay};

    fn noon() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn should_be_cheapest_at_half_past_two() {
        let cheapest = (0..SLOTS_PER_DAY)
            .min_by(|a, b| slot_price(*a).total_cmp(&slot_price(*b)))
            .unwrap();
        assert_eq!(cheapest, CHEAPEST_SLOT);
        assert!(slot_price(36) > slot_price(24));
    }

    #[test]
    fn should_generate_full_day_of_slots() {
        let feed = VirtualPriceFeed::new(Tz::UTC);
        let slots = feed.day_slots(noon().date_naive());
        assert_eq!(slots.len(), 48);
        assert_eq!(slots[1].start - slots[0].start, Duration::minutes(30));
    }

    #[test]
    fn should_skip_slots_in_spring_forward_gap() {
        let feed = VirtualPriceFeed::new(Tz::Europe__Paris);
        let date = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
        assert_eq!(feed.day_slots(date).len(), 46);
    }

    #[test]
    fn should_report_current_price_with_curve_attributes() {
        let feed = VirtualPriceFeed::new(Tz::UTC);

        let signal = feed.read("sensor.electricity_price", noon()).unwrap();

        assert_eq!(signal.state, "0.270");
        let curve = PriceCurve::from_attributes(&signal.attributes, &Tz::UTC);
        assert_eq!(curve.len(), 96);
    }

    #[test]
    fn should_report_cheapest_upcoming_hour() {
        let feed = VirtualPriceFeed::new(Tz::UTC);
        let signal = feed.read("sensor.cheapest_hour", noon()).unwrap();
        assert_eq!(signal.state, "2");
    }

    #[test]
    fn should_place_cheapest_window_around_the_night_minimum() {
        let feed = VirtualPriceFeed::new(Tz::UTC);
        let signal = feed.read("sensor.electricity_price", noon()).unwrap();
        let slots = PriceCurve::from_attributes(&signal.attributes, &Tz::UTC).normalize(noon());

        let window = find_cheapest_window(
            &slots,
            120,
            &AllowedWindow::new(TimeOfDay::from_hour(21), TimeOfDay::from_hour(5)),
            &Tz::UTC,
        )
        .unwrap();

        let minimum = Utc.with_ymd_and_hms(2025, 1, 11, 2, 30, 0).unwrap();
        assert!(window.start <= minimum && minimum < window.end);
    }

    #[test]
    fn should_ignore_foreign_entities() {
        let feed = VirtualPriceFeed::new(Tz::UTC);
        assert!(feed.read("sensor.dishwasher_status", noon()).is_none());
        assert!(!feed.owns("sensor.dishwasher_status"));
    }
}
