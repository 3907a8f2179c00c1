//! DTOs de Vehicle
//!
//! Requests y responses de los endpoints administrativos de flota.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Position, Vehicle};

// Request para dar de alta un vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(min = 1, max = 50))]
    pub route_label: String,

    #[validate(range(min = 1))]
    pub capacity: Option<u32>,
}

// Request para la actualización administrativa
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub route_label: Option<String>,

    #[validate(range(min = 1))]
    pub capacity: Option<u32>,
}

/// Última posición conocida dentro de la response
#[derive(Debug, Serialize)]
pub struct PositionResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
    pub driver_id: Uuid,
}

impl From<Position> for PositionResponse {
    fn from(position: Position) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            speed: position.speed,
            accuracy: position.accuracy,
            timestamp: position.timestamp,
            driver_id: position.driver_id,
        }
    }
}

/// Response de vehículo para la API
#[derive(Debug, Serialize)]
pub struct VehicleResponse {
    pub id: Uuid,
    pub name: String,
    pub route_label: String,
    pub capacity: Option<u32>,
    pub is_active: bool,
    pub active_driver_id: Option<Uuid>,
    pub last_location: Option<PositionResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        let is_active = vehicle.is_active();
        Self {
            id: vehicle.id,
            name: vehicle.name,
            route_label: vehicle.route_label,
            capacity: vehicle.capacity,
            is_active,
            active_driver_id: vehicle.active_driver_id,
            last_location: vehicle.last_location.map(PositionResponse::from),
            created_at: vehicle.created_at,
        }
    }
}

// Response genérica
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }
}
