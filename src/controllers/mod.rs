pub mod presence_controller;
pub mod vehicle_controller;
