use uuid::Uuid;
use validator::Validate;

use crate::dto::presence_dto::{
    PushPositionRequest, SessionResponse, StartSessionRequest, StopSessionRequest,
};
use crate::dto::vehicle_dto::ApiResponse;
use crate::services::position_source::ChannelPositionSource;
use crate::services::SessionManager;
use crate::utils::errors::AppResult;

pub struct PresenceController {
    sessions: SessionManager,
}

impl PresenceController {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    /// Arrancar una sesión alimentada por la red: las muestras llegan
    /// después por el endpoint de ingesta
    pub async fn start(
        &self,
        request: StartSessionRequest,
    ) -> AppResult<ApiResponse<SessionResponse>> {
        request.validate()?;

        let (source, sender) = ChannelPositionSource::channel(request.permission_granted);
        let status = self
            .sessions
            .start(request.vehicle_id, request.driver_id, source, Some(sender))
            .await?;

        Ok(ApiResponse::success_with_message(
            SessionResponse::from(status),
            "Sesión de presencia iniciada".to_string(),
        ))
    }

    pub async fn push_position(&self, request: PushPositionRequest) -> AppResult<()> {
        request.validate()?;

        let driver_id = request.driver_id;
        self.sessions
            .push_sample(driver_id, request.into_sample())
            .await
    }

    pub async fn stop(
        &self,
        request: StopSessionRequest,
    ) -> AppResult<ApiResponse<SessionResponse>> {
        let status = self.sessions.stop(request.driver_id).await?;

        Ok(ApiResponse::success_with_message(
            SessionResponse::from(status),
            "Sesión de presencia detenida".to_string(),
        ))
    }

    pub async fn status(&self, driver_id: Uuid) -> AppResult<SessionResponse> {
        Ok(SessionResponse::from(self.sessions.status(driver_id).await))
    }
}
