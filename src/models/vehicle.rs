//! Modelo de Vehicle
//!
//! Este módulo contiene el struct Vehicle del registro de flota.
//! El campo `active_driver_id` materializa el claim exclusivo de
//! publicación; `is_active` se calcula siempre a partir de él.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::position::Position;

/// Vehículo registrado en la flota, con su última posición conocida
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub name: String,
    pub route_label: String,
    pub capacity: Option<u32>,
    /// Presente si y solo si una sesión de presencia tiene el claim
    pub active_driver_id: Option<Uuid>,
    pub last_location: Option<Position>,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(name: String, route_label: String, capacity: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            route_label,
            capacity,
            active_driver_id: None,
            last_location: None,
            created_at: Utc::now(),
        }
    }

    /// Un vehículo está activo exactamente cuando alguien tiene el claim.
    /// Nunca se almacena aparte para que no pueda divergir del claim.
    pub fn is_active(&self) -> bool {
        self.active_driver_id.is_some()
    }
}
