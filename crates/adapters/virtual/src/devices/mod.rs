//! Simulated devices: a dishwasher and an electricity price feed.
//!
//! Entity ids are derived from the device name so that several virtual
//! dishwashers can live side by side.

mod dishwasher;
mod prices;

pub use dishwasher::{DishwasherEntities, VirtualDishwasher};
pub use prices::{PriceFeedEntities, VirtualPriceFeed, slot_price};
