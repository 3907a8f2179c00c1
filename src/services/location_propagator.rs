//! Propagador de posiciones
//!
//! Valida cada muestra entrante, la sella con el conductor que la publica
//! y la confía al FleetStore. El rechazo por claim ajeno o por timestamp
//! viejo ocurre dentro del check-then-write atómico del store, así que una
//! muestra en vuelo de un conductor superado nunca aterriza después del
//! claim de uno nuevo.

use uuid::Uuid;

use crate::models::{PositionSample, Vehicle};
use crate::store::FleetStore;
use crate::utils::errors::{validation_error, AppResult};
use crate::utils::validation::{validate_coordinates, validate_non_negative};

#[derive(Clone)]
pub struct LocationPropagator {
    store: FleetStore,
}

impl LocationPropagator {
    pub fn new(store: FleetStore) -> Self {
        Self { store }
    }

    /// Enviar una muestra en nombre de `driver_id`.
    ///
    /// Rechazos, en orden: rangos inválidos (`Validation`), claim ajeno
    /// (`NotOwner`), timestamp no estrictamente más nuevo (`StalePosition`,
    /// los empates conservan el registro existente).
    pub async fn submit(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
        sample: PositionSample,
    ) -> AppResult<Vehicle> {
        validate_coordinates(sample.latitude, sample.longitude)
            .map_err(|_| validation_error("position", "coordinates out of range"))?;
        validate_non_negative("speed", sample.speed)
            .map_err(|_| validation_error("speed", "speed must be >= 0"))?;
        validate_non_negative("accuracy", sample.accuracy)
            .map_err(|_| validation_error("accuracy", "accuracy must be >= 0"))?;

        self.store
            .apply_location(vehicle_id, sample.stamped(driver_id))
            .await
    }
}
