//! Bus Presence - motor de presencia y sincronización de ubicación
//!
//! Backend que deja a la administración registrar vehículos, a exactamente
//! un conductor a la vez publicar la posición en vivo de cada vehículo, y
//! a cualquier número de observadores seguir el estado completo de la
//! flota en tiempo casi real.

pub mod config;
pub mod controllers;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

use axum::{response::Json, routing::get, Router};
use serde_json::json;

use middleware::cors::cors_middleware;
use state::AppState;

/// Construir el router completo de la API
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_endpoint))
        .nest("/api/vehicle", routes::vehicle_routes::create_vehicle_router())
        .nest("/api/fleet", routes::fleet_routes::create_fleet_router())
        .nest("/api/presence", routes::presence_routes::create_presence_router())
        .layer(cors_middleware())
        .with_state(app_state)
}

/// Probe de liveness
async fn health_endpoint() -> Json<serde_json::Value> {
    Json(json!({
        "service": "bus-presence",
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
