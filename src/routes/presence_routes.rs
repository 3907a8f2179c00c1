use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::presence_controller::PresenceController;
use crate::dto::presence_dto::{
    PushPositionRequest, SessionResponse, StartSessionRequest, StopSessionRequest,
};
use crate::dto::vehicle_dto::ApiResponse;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_presence_router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_session))
        .route("/stop", post(stop_session))
        .route("/position", post(push_position))
        .route("/:driver_id", get(session_status))
}

async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, AppError> {
    let controller = PresenceController::new(state.sessions.clone());
    let response = controller.start(request).await?;
    Ok(Json(response))
}

async fn stop_session(
    State(state): State<AppState>,
    Json(request): Json<StopSessionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, AppError> {
    let controller = PresenceController::new(state.sessions.clone());
    let response = controller.stop(request).await?;
    Ok(Json(response))
}

async fn push_position(
    State(state): State<AppState>,
    Json(request): Json<PushPositionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let controller = PresenceController::new(state.sessions.clone());
    controller.push_position(request).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Posición encolada"
    })))
}

async fn session_status(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let controller = PresenceController::new(state.sessions.clone());
    let response = controller.status(driver_id).await?;
    Ok(Json(response))
}
