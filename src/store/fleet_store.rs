//! FleetStore en memoria
//!
//! Este módulo mantiene el registro de flota: un slot con mutex propio por
//! vehículo (las mutaciones del mismo vehículo se serializan, vehículos
//! distintos avanzan en paralelo) y un feed de snapshots para los
//! observadores en vivo.
//!
//! Orden de locks, siempre el mismo: mapa de slots → mutex del slot →
//! mutex del feed. El feed es el lock más interno; publicar el snapshot
//! mientras todavía se sostiene el mutex del vehículo garantiza que los
//! suscriptores ven los efectos de cada vehículo en el orden en que
//! fueron aceptados.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Position, Vehicle};
use crate::utils::errors::{not_found_error, validation_error, AppError, AppResult};
use crate::utils::validation::validate_non_blank;

/// Capacidad por defecto del buffer de fan-out
pub const DEFAULT_FEED_BUFFER: usize = 256;

/// Snapshot completo de la flota, ordenado por fecha de alta
pub type FleetSnapshot = Vec<Vehicle>;

/// Slot por vehículo: el mutex serializa claim/release/posición.
/// `removed` es la lápida del slot: una mutación que resolvió el Arc justo
/// antes de una baja concurrente la encuentra bajo el mutex y no publica
/// un vehículo fantasma en el espejo del feed.
struct VehicleSlot {
    state: Mutex<SlotState>,
}

struct SlotState {
    vehicle: Vehicle,
    removed: bool,
}

/// Estado del feed: espejo del conjunto actual más el emisor de fan-out.
/// El espejo existe para que los lectores de snapshots nunca toquen los
/// mutex de los vehículos.
struct FeedState {
    current: HashMap<Uuid, Vehicle>,
    sender: broadcast::Sender<FleetSnapshot>,
}

impl FeedState {
    fn snapshot(&self) -> FleetSnapshot {
        let mut vehicles: Vec<Vehicle> = self.current.values().cloned().collect();
        vehicles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        vehicles
    }

    /// Actualizar el espejo y emitir el snapshot resultante.
    /// Se invoca siempre con el mutex del vehículo mutado todavía en mano.
    fn publish(&mut self, vehicle: &Vehicle) {
        self.current.insert(vehicle.id, vehicle.clone());
        // Sin suscriptores el send falla; no es un error
        let _ = self.sender.send(self.snapshot());
    }

    fn publish_removal(&mut self, vehicle_id: Uuid) {
        self.current.remove(&vehicle_id);
        let _ = self.sender.send(self.snapshot());
    }
}

struct StoreInner {
    slots: RwLock<HashMap<Uuid, Arc<VehicleSlot>>>,
    feed: Mutex<FeedState>,
}

/// Registro de flota compartido por todo el proceso
#[derive(Clone)]
pub struct FleetStore {
    inner: Arc<StoreInner>,
}

impl FleetStore {
    pub fn new(feed_buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(feed_buffer.max(1));
        Self {
            inner: Arc::new(StoreInner {
                slots: RwLock::new(HashMap::new()),
                feed: Mutex::new(FeedState {
                    current: HashMap::new(),
                    sender,
                }),
            }),
        }
    }

    /// Dar de alta un vehículo en la flota
    pub async fn create_vehicle(
        &self,
        name: String,
        route_label: String,
        capacity: Option<u32>,
    ) -> AppResult<Vehicle> {
        validate_non_blank(&name)
            .map_err(|_| validation_error("name", "name must not be empty"))?;
        validate_non_blank(&route_label)
            .map_err(|_| validation_error("route_label", "route label must not be empty"))?;
        if capacity == Some(0) {
            return Err(validation_error("capacity", "capacity must be positive"));
        }

        let vehicle = Vehicle::new(name.trim().to_string(), route_label.trim().to_string(), capacity);

        let mut slots = self.inner.slots.write().await;
        slots.insert(
            vehicle.id,
            Arc::new(VehicleSlot {
                state: Mutex::new(SlotState {
                    vehicle: vehicle.clone(),
                    removed: false,
                }),
            }),
        );
        let mut feed = self.inner.feed.lock().await;
        feed.publish(&vehicle);
        drop(feed);
        drop(slots);

        debug!(vehicle_id = %vehicle.id, name = %vehicle.name, "vehículo creado");
        Ok(vehicle)
    }

    /// Actualización administrativa de los campos de presentación
    pub async fn update_vehicle(
        &self,
        vehicle_id: Uuid,
        name: Option<String>,
        route_label: Option<String>,
        capacity: Option<u32>,
    ) -> AppResult<Vehicle> {
        if let Some(ref name) = name {
            validate_non_blank(name)
                .map_err(|_| validation_error("name", "name must not be empty"))?;
        }
        if let Some(ref route_label) = route_label {
            validate_non_blank(route_label)
                .map_err(|_| validation_error("route_label", "route label must not be empty"))?;
        }
        if capacity == Some(0) {
            return Err(validation_error("capacity", "capacity must be positive"));
        }

        let slot = self.slot(vehicle_id).await?;
        let mut state = slot.state.lock().await;
        if state.removed {
            return Err(not_found_error("Vehicle", &vehicle_id.to_string()));
        }
        if let Some(name) = name {
            state.vehicle.name = name.trim().to_string();
        }
        if let Some(route_label) = route_label {
            state.vehicle.route_label = route_label.trim().to_string();
        }
        if capacity.is_some() {
            state.vehicle.capacity = capacity;
        }

        let mut feed = self.inner.feed.lock().await;
        feed.publish(&state.vehicle);
        Ok(state.vehicle.clone())
    }

    /// Baja administrativa; falla si el vehículo tiene un claim vivo
    pub async fn remove_vehicle(&self, vehicle_id: Uuid) -> AppResult<()> {
        let mut slots = self.inner.slots.write().await;
        let slot = slots
            .get(&vehicle_id)
            .cloned()
            .ok_or_else(|| not_found_error("Vehicle", &vehicle_id.to_string()))?;

        let mut state = slot.state.lock().await;
        if state.vehicle.is_active() {
            return Err(AppError::Conflict(
                "No se puede eliminar un vehículo con un conductor activo".to_string(),
            ));
        }
        state.removed = true;
        slots.remove(&vehicle_id);

        let mut feed = self.inner.feed.lock().await;
        feed.publish_removal(vehicle_id);
        Ok(())
    }

    /// Lectura puntual de un vehículo
    pub async fn get_vehicle(&self, vehicle_id: Uuid) -> Option<Vehicle> {
        let feed = self.inner.feed.lock().await;
        feed.current.get(&vehicle_id).cloned()
    }

    /// Lectura puntual del conjunto completo
    pub async fn get_all(&self) -> FleetSnapshot {
        let feed = self.inner.feed.lock().await;
        feed.snapshot()
    }

    /// Suscripción en vivo: snapshot inicial capturado atómicamente en el
    /// momento de suscribirse, luego un snapshot por cada mutación aceptada.
    /// Cada suscriptor es independiente; soltar el watch corta la entrega.
    pub async fn watch_all(&self) -> FleetWatch {
        let feed = self.inner.feed.lock().await;
        FleetWatch {
            initial: Some(feed.snapshot()),
            receiver: feed.sender.subscribe(),
        }
    }

    /// Test-and-set atómico del claim. Idempotente para el mismo conductor.
    pub(crate) async fn apply_claim(&self, vehicle_id: Uuid, driver_id: Uuid) -> AppResult<Vehicle> {
        let slot = self.slot(vehicle_id).await?;
        let mut state = slot.state.lock().await;
        if state.removed {
            return Err(not_found_error("Vehicle", &vehicle_id.to_string()));
        }
        match state.vehicle.active_driver_id {
            Some(current) if current != driver_id => {
                return Err(AppError::VehicleBusy(format!(
                    "El vehículo {} ya tiene un conductor activo",
                    vehicle_id
                )));
            }
            Some(_) => return Ok(state.vehicle.clone()),
            None => {}
        }
        state.vehicle.active_driver_id = Some(driver_id);

        let mut feed = self.inner.feed.lock().await;
        feed.publish(&state.vehicle);
        debug!(%vehicle_id, %driver_id, "claim adquirido");
        Ok(state.vehicle.clone())
    }

    /// Liberar el claim solo si lo sostiene `driver_id`; un release tardío
    /// de un conductor superado nunca desaloja al más nuevo.
    /// La última posición se conserva como última posición conocida.
    pub(crate) async fn apply_release(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
    ) -> AppResult<Vehicle> {
        let slot = self.slot(vehicle_id).await?;
        let mut state = slot.state.lock().await;
        if state.removed {
            return Err(not_found_error("Vehicle", &vehicle_id.to_string()));
        }
        if state.vehicle.active_driver_id != Some(driver_id) {
            return Err(AppError::NotOwner(format!(
                "El conductor {} no tiene el claim del vehículo {}",
                driver_id, vehicle_id
            )));
        }
        state.vehicle.active_driver_id = None;

        let mut feed = self.inner.feed.lock().await;
        feed.publish(&state.vehicle);
        debug!(%vehicle_id, %driver_id, "claim liberado");
        Ok(state.vehicle.clone())
    }

    /// Check-then-write atómico de la posición. Bajo el mutex del slot se
    /// comprueba, en este orden: dueño del claim y frescura del timestamp
    /// (los empates conservan el registro existente).
    pub(crate) async fn apply_location(
        &self,
        vehicle_id: Uuid,
        position: Position,
    ) -> AppResult<Vehicle> {
        let slot = self.slot(vehicle_id).await?;
        let mut state = slot.state.lock().await;
        if state.removed {
            return Err(not_found_error("Vehicle", &vehicle_id.to_string()));
        }

        if state.vehicle.active_driver_id != Some(position.driver_id) {
            return Err(AppError::NotOwner(format!(
                "El conductor {} no tiene el claim del vehículo {}",
                position.driver_id, vehicle_id
            )));
        }
        if let Some(ref last) = state.vehicle.last_location {
            if position.timestamp <= last.timestamp {
                return Err(AppError::StalePosition(format!(
                    "Muestra con timestamp {} descartada: el registro actual es {}",
                    position.timestamp, last.timestamp
                )));
            }
        }
        state.vehicle.last_location = Some(position);

        let mut feed = self.inner.feed.lock().await;
        feed.publish(&state.vehicle);
        Ok(state.vehicle.clone())
    }

    async fn slot(&self, vehicle_id: Uuid) -> AppResult<Arc<VehicleSlot>> {
        let slots = self.inner.slots.read().await;
        slots
            .get(&vehicle_id)
            .cloned()
            .ok_or_else(|| not_found_error("Vehicle", &vehicle_id.to_string()))
    }
}

/// Suscripción viva al conjunto de la flota
pub struct FleetWatch {
    initial: Option<FleetSnapshot>,
    receiver: broadcast::Receiver<FleetSnapshot>,
}

impl FleetWatch {
    /// Siguiente snapshot; `None` cuando el store desaparece
    pub async fn next(&mut self) -> Option<FleetSnapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Un observador lento se pierde snapshots intermedios
                    // pero siempre converge al estado más reciente
                    warn!(skipped, "observador de flota rezagado");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Adaptador a `Stream` para la respuesta SSE
    pub fn into_stream(self) -> impl futures::Stream<Item = FleetSnapshot> {
        futures::stream::unfold(self, |mut watch| async move {
            watch.next().await.map(|snapshot| (snapshot, watch))
        })
    }
}
