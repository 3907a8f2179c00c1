//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum: el registro de flota, el registro de
//! asignaciones, el propagador y el manager de sesiones.

use crate::config::environment::EnvironmentConfig;
use crate::services::{AssignmentRegistry, LocationPropagator, SessionManager};
use crate::store::FleetStore;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub store: FleetStore,
    pub registry: AssignmentRegistry,
    pub propagator: LocationPropagator,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(config: EnvironmentConfig) -> Self {
        let store = FleetStore::new(config.feed_buffer);
        let registry = AssignmentRegistry::new(store.clone());
        let propagator = LocationPropagator::new(store.clone());
        let sessions = SessionManager::new(registry.clone(), propagator.clone());

        Self {
            config,
            store,
            registry,
            propagator,
            sessions,
        }
    }
}
