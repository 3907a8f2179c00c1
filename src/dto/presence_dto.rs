//! DTOs de presencia
//!
//! Requests y responses de los endpoints de sesión de conductor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::PositionSample;
use crate::services::SessionStatus;

fn default_true() -> bool {
    true
}

// Request para arrancar una sesión de presencia
#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    /// Estado de consentimiento que reporta el dispositivo; el prompt de
    /// permisos del sistema operativo ocurre en el cliente
    #[serde(default = "default_true")]
    pub permission_granted: bool,
}

// Request para detener la sesión
#[derive(Debug, Deserialize)]
pub struct StopSessionRequest {
    pub driver_id: Uuid,
}

// Una muestra de posición empujada desde el dispositivo del conductor
#[derive(Debug, Deserialize, Validate)]
pub struct PushPositionRequest {
    pub driver_id: Uuid,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[validate(range(min = 0.0))]
    pub speed: f64,

    #[validate(range(min = 0.0))]
    pub accuracy: f64,

    /// Momento de captura en el dispositivo; si falta se usa la hora de
    /// recepción
    pub timestamp: Option<DateTime<Utc>>,
}

impl PushPositionRequest {
    pub fn into_sample(self) -> PositionSample {
        PositionSample {
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            accuracy: self.accuracy,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// Response con el estado de la sesión
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub driver_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub state: String,
    pub last_fault: Option<String>,
}

impl From<SessionStatus> for SessionResponse {
    fn from(status: SessionStatus) -> Self {
        Self {
            driver_id: status.driver_id,
            vehicle_id: status.vehicle_id,
            state: status.state.as_str().to_string(),
            last_fault: status.last_fault.map(|fault| fault.to_string()),
        }
    }
}
