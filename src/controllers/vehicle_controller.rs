use validator::Validate;
use uuid::Uuid;

use crate::dto::vehicle_dto::{
    ApiResponse, CreateVehicleRequest, UpdateVehicleRequest, VehicleResponse,
};
use crate::store::FleetStore;
use crate::utils::errors::{AppError, AppResult};

pub struct VehicleController {
    store: FleetStore,
}

impl VehicleController {
    pub fn new(store: FleetStore) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        request: CreateVehicleRequest,
    ) -> AppResult<ApiResponse<VehicleResponse>> {
        request.validate()?;

        let vehicle = self
            .store
            .create_vehicle(request.name, request.route_label, request.capacity)
            .await?;

        Ok(ApiResponse::success_with_message(
            VehicleResponse::from(vehicle),
            "Vehículo creado exitosamente".to_string(),
        ))
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<VehicleResponse> {
        let vehicle = self
            .store
            .get_vehicle(id)
            .await
            .ok_or_else(|| AppError::NotFound("Vehículo no encontrado".to_string()))?;

        Ok(VehicleResponse::from(vehicle))
    }

    pub async fn list(&self) -> AppResult<Vec<VehicleResponse>> {
        let vehicles = self.store.get_all().await;
        Ok(vehicles.into_iter().map(VehicleResponse::from).collect())
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateVehicleRequest,
    ) -> AppResult<ApiResponse<VehicleResponse>> {
        request.validate()?;

        let vehicle = self
            .store
            .update_vehicle(id, request.name, request.route_label, request.capacity)
            .await?;

        Ok(ApiResponse::success_with_message(
            VehicleResponse::from(vehicle),
            "Vehículo actualizado exitosamente".to_string(),
        ))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.store.remove_vehicle(id).await
    }
}
