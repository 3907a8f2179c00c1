//! Registro de asignaciones conductor-vehículo
//!
//! Este servicio es el único punto de entrada para adquirir y liberar el
//! claim exclusivo de publicación de un vehículo. La exclusividad está
//! garantizada por el mutex por vehículo del FleetStore: ante N intentos
//! concurrentes sobre el mismo vehículo gana exactamente uno.

use uuid::Uuid;

use crate::models::Vehicle;
use crate::store::FleetStore;
use crate::utils::errors::AppResult;

#[derive(Clone)]
pub struct AssignmentRegistry {
    store: FleetStore,
}

impl AssignmentRegistry {
    pub fn new(store: FleetStore) -> Self {
        Self { store }
    }

    /// Adquirir el claim del vehículo. Falla con `VehicleBusy` si otro
    /// conductor lo sostiene; volver a reclamar el propio claim es idempotente.
    pub async fn claim(&self, vehicle_id: Uuid, driver_id: Uuid) -> AppResult<Vehicle> {
        self.store.apply_claim(vehicle_id, driver_id).await
    }

    /// Liberar el claim. Falla con `NotOwner`, sin efecto alguno, si el
    /// claim pertenece a otro conductor o ya no existe.
    pub async fn release(&self, vehicle_id: Uuid, driver_id: Uuid) -> AppResult<Vehicle> {
        self.store.apply_release(vehicle_id, driver_id).await
    }
}
