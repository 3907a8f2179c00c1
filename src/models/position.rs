//! Modelo de Position
//!
//! Este módulo contiene el registro de posición que viaja del dispositivo
//! del conductor hasta el vehículo, y la muestra cruda que produce el sensor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Posición aceptada de un vehículo, sellada con el conductor que la publicó
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Velocidad en metros/segundo, siempre >= 0
    pub speed: f64,
    /// Precisión del sensor en metros, siempre >= 0
    pub accuracy: f64,
    /// Momento de captura de la muestra, monótono por vehículo
    pub timestamp: DateTime<Utc>,
    /// Dueño del claim en el momento de la escritura
    pub driver_id: Uuid,
}

/// Muestra cruda del sensor: todavía sin conductor asignado.
/// La sesión de presencia la sella antes de propagarla.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    /// Sellar la muestra con el conductor que la publica
    pub fn stamped(self, driver_id: Uuid) -> Position {
        Position {
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            accuracy: self.accuracy,
            timestamp: self.timestamp,
            driver_id,
        }
    }
}
