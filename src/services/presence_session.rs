//! Sesiones de presencia
//!
//! Máquina de estados por conductor: Idle → Starting → Sharing → Stopping
//! → Idle, con Errored alcanzable desde Starting y Sharing. Una sesión
//! coordina la fuente de posición, el registro de asignaciones y el
//! propagador durante todo el período en que un conductor comparte su
//! ubicación para un vehículo reclamado.
//!
//! El SessionManager mantiene como mucho una sesión viva por conductor.
//! Sesiones de vehículos distintos avanzan en paralelo; la serialización
//! por vehículo vive en el FleetStore, no aquí.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::PositionSample;
use crate::services::assignment_registry::AssignmentRegistry;
use crate::services::location_propagator::LocationPropagator;
use crate::services::position_source::{PositionSource, SampleSender, SourceEvent};
use crate::utils::errors::{AppError, AppResult};

/// Estado de una sesión de presencia
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Sharing,
    Stopping,
    Errored,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Sharing => "sharing",
            SessionState::Stopping => "stopping",
            SessionState::Errored => "errored",
        }
    }
}

/// Causa registrada del último fallo de la sesión
#[derive(Debug, Clone, PartialEq)]
pub enum SessionFault {
    PermissionDenied,
    VehicleBusy,
    ClaimLost,
    /// Blip transitorio del sensor; no termina la sesión
    Sensor(String),
}

impl fmt::Display for SessionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFault::PermissionDenied => write!(f, "permission_denied"),
            SessionFault::VehicleBusy => write!(f, "vehicle_busy"),
            SessionFault::ClaimLost => write!(f, "claim_lost"),
            SessionFault::Sensor(cause) => write!(f, "sensor: {}", cause),
        }
    }
}

/// Foto del estado de una sesión, para la capa de presentación
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub driver_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub state: SessionState,
    pub last_fault: Option<SessionFault>,
}

impl SessionStatus {
    fn idle(driver_id: Uuid) -> Self {
        Self {
            driver_id,
            vehicle_id: None,
            state: SessionState::Idle,
            last_fault: None,
        }
    }
}

/// Estado compartido entre el manager y la tarea de reenvío
struct SessionShared {
    vehicle_id: Uuid,
    driver_id: Uuid,
    state: RwLock<SessionState>,
    last_fault: RwLock<Option<SessionFault>>,
}

impl SessionShared {
    async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
    }

    async fn record_fault(&self, fault: SessionFault) {
        *self.last_fault.write().await = Some(fault);
    }
}

/// Una sesión viva: el claim, la suscripción a la fuente y la tarea que
/// reenvía muestras al propagador
struct PresenceSession {
    shared: Arc<SessionShared>,
    /// Extremo de ingesta para sesiones alimentadas por HTTP
    sender: Option<SampleSender>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PresenceSession {
    async fn status(&self) -> SessionStatus {
        SessionStatus {
            driver_id: self.shared.driver_id,
            vehicle_id: Some(self.shared.vehicle_id),
            state: *self.shared.state.read().await,
            last_fault: self.shared.last_fault.read().await.clone(),
        }
    }
}

/// Coordinador de todas las sesiones de presencia del proceso
#[derive(Clone)]
pub struct SessionManager {
    registry: AssignmentRegistry,
    propagator: LocationPropagator,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<PresenceSession>>>>,
}

impl SessionManager {
    pub fn new(registry: AssignmentRegistry, propagator: LocationPropagator) -> Self {
        Self {
            registry,
            propagator,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Arrancar una sesión de presencia para `driver_id` sobre `vehicle_id`.
    ///
    /// Orden del arranque: handshake de permisos, claim, suscripción.
    /// Si el permiso se deniega la sesión termina con `PermissionDenied`
    /// y el registro de asignaciones queda intacto. Si el vehículo ya
    /// tiene conductor, `VehicleBusy`. Ambos fallos devuelven la sesión
    /// a Idle y son recuperables reintentando.
    pub async fn start<S>(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
        source: S,
        sender: Option<SampleSender>,
    ) -> AppResult<SessionStatus>
    where
        S: PositionSource + 'static,
    {
        let shared = Arc::new(SessionShared {
            vehicle_id,
            driver_id,
            state: RwLock::new(SessionState::Starting),
            last_fault: RwLock::new(None),
        });

        // Un conductor comparte para un solo vehículo a la vez. El
        // placeholder en Starting cierra la ventana entre esta comprobación
        // y la suscripción: un segundo start concurrente ve la sesión.
        let placeholder = Arc::new(PresenceSession {
            shared: Arc::clone(&shared),
            sender: None,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });
        {
            let mut sessions = self.sessions.write().await;
            if let Some(existing) = sessions.get(&driver_id) {
                let state = *existing.shared.state.read().await;
                match state {
                    SessionState::Sharing | SessionState::Starting | SessionState::Stopping => {
                        return Err(AppError::Conflict(format!(
                            "El conductor {} ya tiene una sesión activa",
                            driver_id
                        )));
                    }
                    // Una sesión errada o asentada se descarta al rearrancar
                    _ => {}
                }
            }
            sessions.insert(driver_id, Arc::clone(&placeholder));
        }

        if !source.request_access().await {
            shared.record_fault(SessionFault::PermissionDenied).await;
            shared.set_state(SessionState::Idle).await;
            self.remove_if_same(driver_id, &placeholder).await;
            return Err(AppError::PermissionDenied(
                "El dispositivo denegó el acceso a la ubicación".to_string(),
            ));
        }

        if let Err(err) = self.registry.claim(vehicle_id, driver_id).await {
            // Solo un vehículo ocupado es una falla de la sesión; un
            // vehículo inexistente se propaga tal cual sin registrar nada
            if matches!(err, AppError::VehicleBusy(_)) {
                shared.record_fault(SessionFault::VehicleBusy).await;
            }
            shared.set_state(SessionState::Idle).await;
            self.remove_if_same(driver_id, &placeholder).await;
            return Err(err);
        }

        let mut feed = match source.subscribe().await {
            Ok(feed) => feed,
            Err(err) => {
                // El claim recién adquirido no debe quedar huérfano
                let _ = self.registry.release(vehicle_id, driver_id).await;
                shared.set_state(SessionState::Idle).await;
                self.remove_if_same(driver_id, &placeholder).await;
                return Err(err);
            }
        };

        let cancel = feed.cancel_token();
        let task_shared = Arc::clone(&shared);
        let registry = self.registry.clone();
        let propagator = self.propagator.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = feed.next().await {
                match event {
                    SourceEvent::Sample(sample) => {
                        match propagator
                            .submit(task_shared.vehicle_id, task_shared.driver_id, sample)
                            .await
                        {
                            Ok(_) => {}
                            Err(AppError::StalePosition(reason)) => {
                                // Muestra superada por una más nueva; no es
                                // un error de la sesión
                                debug!(driver_id = %task_shared.driver_id, %reason, "muestra obsoleta descartada");
                            }
                            Err(AppError::NotOwner(_)) | Err(AppError::NotFound(_)) => {
                                // El claim fue superado o liberado por fuera:
                                // la sesión se apaga sola
                                warn!(
                                    driver_id = %task_shared.driver_id,
                                    vehicle_id = %task_shared.vehicle_id,
                                    "claim perdido, terminando sesión"
                                );
                                task_shared.record_fault(SessionFault::ClaimLost).await;
                                task_shared.set_state(SessionState::Errored).await;
                                // Release de cortesía: el NotOwner esperado
                                // (el claim ya no es nuestro) se ignora
                                let _ = registry
                                    .release(task_shared.vehicle_id, task_shared.driver_id)
                                    .await;
                                return;
                            }
                            Err(err) => {
                                warn!(driver_id = %task_shared.driver_id, error = %err, "muestra rechazada");
                                task_shared
                                    .record_fault(SessionFault::Sensor(err.to_string()))
                                    .await;
                            }
                        }
                    }
                    SourceEvent::Failure(cause) => {
                        // Se reporta pero no termina la sesión; el
                        // llamador decide si parar
                        warn!(driver_id = %task_shared.driver_id, %cause, "fallo transitorio de la fuente");
                        task_shared.record_fault(SessionFault::Sensor(cause)).await;
                    }
                }
            }
        });

        shared.set_state(SessionState::Sharing).await;
        let session = Arc::new(PresenceSession {
            shared: Arc::clone(&shared),
            sender,
            cancel: cancel.clone(),
            task: Mutex::new(Some(task)),
        });
        let status = session.status().await;

        let replaced = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(&driver_id) {
                Some(entry) if Arc::ptr_eq(entry, &placeholder) => {
                    sessions.insert(driver_id, Arc::clone(&session));
                    true
                }
                // stop() llegó durante el arranque: deshacer todo
                _ => false,
            }
        };
        if !replaced {
            cancel.cancel();
            if let Some(task) = session.task.lock().await.take() {
                let _ = task.await;
            }
            let _ = self.registry.release(vehicle_id, driver_id).await;
            shared.set_state(SessionState::Idle).await;
            return Err(AppError::Conflict(format!(
                "La sesión del conductor {} fue detenida durante el arranque",
                driver_id
            )));
        }

        info!(%driver_id, %vehicle_id, "sesión de presencia iniciada");
        Ok(status)
    }

    async fn remove_if_same(&self, driver_id: Uuid, expected: &Arc<PresenceSession>) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get(&driver_id) {
            if Arc::ptr_eq(entry, expected) {
                sessions.remove(&driver_id);
            }
        }
    }

    /// Empujar una muestra del dispositivo del conductor a su sesión
    pub async fn push_sample(&self, driver_id: Uuid, sample: PositionSample) -> AppResult<()> {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(&driver_id).cloned()
        }
        .ok_or_else(|| {
            AppError::NotFound(format!("El conductor {} no tiene sesión activa", driver_id))
        })?;

        let state = *session.shared.state.read().await;
        if state != SessionState::Sharing {
            return Err(AppError::Conflict(format!(
                "La sesión del conductor {} no está compartiendo (estado: {})",
                driver_id,
                state.as_str()
            )));
        }

        let sender = session.sender.as_ref().ok_or_else(|| {
            AppError::Conflict("La sesión no acepta muestras por la red".to_string())
        })?;
        sender.push(sample).await
    }

    /// Detener la sesión del conductor. Seguro desde cualquier estado:
    /// sin sesión es un no-op. Al volver, ya no se intenta ninguna
    /// escritura bajo el claim viejo.
    pub async fn stop(&self, driver_id: Uuid) -> AppResult<SessionStatus> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(&driver_id)
        };

        let Some(session) = session else {
            return Ok(SessionStatus::idle(driver_id));
        };

        session.shared.set_state(SessionState::Stopping).await;
        session.cancel.cancel();

        // Esperar la tarea de reenvío: garantiza que ninguna muestra en
        // vuelo se envía después del release
        if let Some(task) = session.task.lock().await.take() {
            if let Err(err) = task.await {
                warn!(%driver_id, error = %err, "la tarea de reenvío terminó mal");
            }
        }

        // Release de mejor esfuerzo: si el claim ya fue superado, el
        // NotOwner no es un error del stop
        match self
            .registry
            .release(session.shared.vehicle_id, driver_id)
            .await
        {
            Ok(_) | Err(AppError::NotOwner(_)) | Err(AppError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        session.shared.set_state(SessionState::Idle).await;
        info!(%driver_id, vehicle_id = %session.shared.vehicle_id, "sesión de presencia detenida");
        Ok(session.status().await)
    }

    /// Estado actual de la sesión del conductor, para la presentación
    pub async fn status(&self, driver_id: Uuid) -> SessionStatus {
        let sessions = self.sessions.read().await;
        match sessions.get(&driver_id) {
            Some(session) => session.status().await,
            None => SessionStatus::idle(driver_id),
        }
    }
}
