pub mod presence_dto;
pub mod vehicle_dto;
