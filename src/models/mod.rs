pub mod position;
pub mod vehicle;

pub use position::{Position, PositionSample};
pub use vehicle::Vehicle;
