pub mod fleet_store;

pub use fleet_store::{FleetSnapshot, FleetStore, FleetWatch, DEFAULT_FEED_BUFFER};
