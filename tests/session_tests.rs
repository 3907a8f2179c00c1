//! Escenarios de la máquina de estados de sesión: arranque, compartición,
//! pérdida del claim, denegación de permisos y parada.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use bus_presence::config::environment::EnvironmentConfig;
use bus_presence::models::{PositionSample, Vehicle};
use bus_presence::services::{
    ChannelPositionSource, SessionFault, SessionState, SessionStatus, SimulatedPositionSource,
};
use bus_presence::state::AppState;
use bus_presence::utils::errors::AppError;

fn test_state() -> AppState {
    AppState::new(EnvironmentConfig {
        environment: "test".to_string(),
        port: 0,
        host: "127.0.0.1".to_string(),
        cors_origins: Vec::new(),
        feed_buffer: 64,
    })
}

fn sample_at(seconds: i64, latitude: f64, longitude: f64) -> PositionSample {
    PositionSample {
        latitude,
        longitude,
        speed: 8.0,
        accuracy: 5.0,
        timestamp: Utc.timestamp_opt(seconds, 0).unwrap(),
    }
}

/// Esperar a que el vehículo cumpla una condición
async fn wait_for_vehicle(state: &AppState, vehicle_id: Uuid, pred: fn(&Vehicle) -> bool) {
    timeout(Duration::from_secs(2), async {
        loop {
            if let Some(vehicle) = state.store.get_vehicle(vehicle_id).await {
                if pred(&vehicle) {
                    return;
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("el vehículo no alcanzó la condición esperada a tiempo");
}

/// Esperar a que la sesión del conductor cumpla una condición
async fn wait_for_session(state: &AppState, driver_id: Uuid, pred: fn(&SessionStatus) -> bool) {
    timeout(Duration::from_secs(2), async {
        loop {
            if pred(&state.sessions.status(driver_id).await) {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("la sesión no alcanzó la condición esperada a tiempo");
}

#[tokio::test]
async fn full_sharing_scenario() {
    let state = test_state();
    let vehicle = state
        .store
        .create_vehicle("Campus Express".to_string(), "R12".to_string(), Some(50))
        .await
        .unwrap();
    let d1 = Uuid::new_v4();
    let d2 = Uuid::new_v4();

    // Flota recién creada: un vehículo, inactivo
    let all = state.store.get_all().await;
    assert_eq!(all.len(), 1);
    assert!(!all[0].is_active());

    // D1 arranca con acceso concedido
    let (source, sender) = ChannelPositionSource::channel(true);
    let status = state
        .sessions
        .start(vehicle.id, d1, source, Some(sender))
        .await
        .unwrap();
    assert_eq!(status.state, SessionState::Sharing);

    // D1 publica una posición
    state
        .sessions
        .push_sample(d1, sample_at(100, 12.90, 77.60))
        .await
        .unwrap();
    wait_for_vehicle(&state, vehicle.id, |v| v.last_location.is_some()).await;

    let current = state.store.get_vehicle(vehicle.id).await.unwrap();
    assert!(current.is_active());
    let location = current.last_location.unwrap();
    assert_eq!(location.latitude, 12.90);
    assert_eq!(location.longitude, 77.60);
    assert_eq!(location.driver_id, d1);

    // D2 intenta arrancar sobre el mismo vehículo: VehicleBusy
    let (source, sender) = ChannelPositionSource::channel(true);
    let result = state.sessions.start(vehicle.id, d2, source, Some(sender)).await;
    assert!(matches!(result, Err(AppError::VehicleBusy(_))));
    assert_eq!(
        state.store.get_vehicle(vehicle.id).await.unwrap().active_driver_id,
        Some(d1)
    );

    // D1 para: el claim se libera y el vehículo queda inactivo
    let status = state.sessions.stop(d1).await.unwrap();
    assert_eq!(status.state, SessionState::Idle);
    let current = state.store.get_vehicle(vehicle.id).await.unwrap();
    assert!(!current.is_active());

    // Ahora D2 sí puede
    let (source, sender) = ChannelPositionSource::channel(true);
    let status = state
        .sessions
        .start(vehicle.id, d2, source, Some(sender))
        .await
        .unwrap();
    assert_eq!(status.state, SessionState::Sharing);
    assert_eq!(
        state.store.get_vehicle(vehicle.id).await.unwrap().active_driver_id,
        Some(d2)
    );
}

#[tokio::test]
async fn permission_denied_leaves_registry_untouched() {
    let state = test_state();
    let vehicle = state
        .store
        .create_vehicle("Bus".to_string(), "R1".to_string(), None)
        .await
        .unwrap();
    let driver = Uuid::new_v4();

    let mut watch = state.store.watch_all().await;
    let _ = watch.next().await.unwrap();

    let result = state
        .sessions
        .start(vehicle.id, driver, SimulatedPositionSource::denied(), None)
        .await;
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));

    // Registro intacto y sesión asentada en Idle
    let current = state.store.get_vehicle(vehicle.id).await.unwrap();
    assert!(current.active_driver_id.is_none());
    let status = state.sessions.status(driver).await;
    assert_eq!(status.state, SessionState::Idle);

    // El feed no vio ninguna mutación: la siguiente aceptada es la única
    state
        .store
        .create_vehicle("Otro".to_string(), "R2".to_string(), None)
        .await
        .unwrap();
    let snapshot = timeout(Duration::from_secs(1), watch.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.len(), 2);
}

#[tokio::test]
async fn stale_sample_is_dropped_without_ending_session() {
    let state = test_state();
    let vehicle = state
        .store
        .create_vehicle("Bus".to_string(), "R1".to_string(), None)
        .await
        .unwrap();
    let driver = Uuid::new_v4();

    let (source, sender) = ChannelPositionSource::channel(true);
    state
        .sessions
        .start(vehicle.id, driver, source, Some(sender))
        .await
        .unwrap();

    state
        .sessions
        .push_sample(driver, sample_at(100, 1.0, 1.0))
        .await
        .unwrap();
    wait_for_vehicle(&state, vehicle.id, |v| v.last_location.is_some()).await;

    // Muestra fuera de orden: se descarta en silencio
    state
        .sessions
        .push_sample(driver, sample_at(50, 2.0, 2.0))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    let current = state.store.get_vehicle(vehicle.id).await.unwrap();
    let location = current.last_location.unwrap();
    assert_eq!(location.timestamp, Utc.timestamp_opt(100, 0).unwrap());
    assert_eq!(location.latitude, 1.0);

    // La sesión sigue compartiendo
    let status = state.sessions.status(driver).await;
    assert_eq!(status.state, SessionState::Sharing);

    // Y una muestra más nueva sigue pasando
    state
        .sessions
        .push_sample(driver, sample_at(200, 3.0, 3.0))
        .await
        .unwrap();
    wait_for_vehicle(&state, vehicle.id, |v| {
        v.last_location.as_ref().map(|l| l.latitude == 3.0).unwrap_or(false)
    })
    .await;
}

#[tokio::test]
async fn claim_lost_terminates_session() {
    let state = test_state();
    let vehicle = state
        .store
        .create_vehicle("Bus".to_string(), "R1".to_string(), None)
        .await
        .unwrap();
    let d1 = Uuid::new_v4();
    let d2 = Uuid::new_v4();

    let (source, sender) = ChannelPositionSource::channel(true);
    state
        .sessions
        .start(vehicle.id, d1, source, Some(sender))
        .await
        .unwrap();

    // Override administrativo: el claim de D1 se libera por fuera y D2
    // se queda con el vehículo
    state.registry.release(vehicle.id, d1).await.unwrap();
    state.registry.claim(vehicle.id, d2).await.unwrap();

    // La siguiente muestra de D1 es NotOwner: la sesión se apaga sola
    state
        .sessions
        .push_sample(d1, sample_at(100, 1.0, 1.0))
        .await
        .unwrap();
    wait_for_session(&state, d1, |s| s.state == SessionState::Errored).await;

    let status = state.sessions.status(d1).await;
    assert_eq!(status.last_fault, Some(SessionFault::ClaimLost));

    // El release de cortesía de D1 no desalojó a D2
    assert_eq!(
        state.store.get_vehicle(vehicle.id).await.unwrap().active_driver_id,
        Some(d2)
    );

    // stop tras la pérdida es seguro y asienta en Idle
    let status = state.sessions.stop(d1).await.unwrap();
    assert_eq!(status.state, SessionState::Idle);

    // Y D1 puede rearrancar en otro vehículo
    let other = state
        .store
        .create_vehicle("Otro".to_string(), "R2".to_string(), None)
        .await
        .unwrap();
    let (source, sender) = ChannelPositionSource::channel(true);
    let status = state
        .sessions
        .start(other.id, d1, source, Some(sender))
        .await
        .unwrap();
    assert_eq!(status.state, SessionState::Sharing);
}

#[tokio::test]
async fn start_on_unknown_vehicle_reports_not_found_without_busy_fault() {
    let state = test_state();
    let driver = Uuid::new_v4();

    let (source, sender) = ChannelPositionSource::channel(true);
    let result = state
        .sessions
        .start(Uuid::new_v4(), driver, source, Some(sender))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    // La sesión asienta en Idle sin una falla de vehículo ocupado espuria
    let status = state.sessions.status(driver).await;
    assert_eq!(status.state, SessionState::Idle);
    assert!(status.last_fault.is_none());
}

#[tokio::test]
async fn stop_without_session_is_a_noop() {
    let state = test_state();
    let driver = Uuid::new_v4();

    let status = state.sessions.stop(driver).await.unwrap();
    assert_eq!(status.state, SessionState::Idle);
    assert!(status.vehicle_id.is_none());
}

#[tokio::test]
async fn driver_cannot_share_two_vehicles_at_once() {
    let state = test_state();
    let first = state
        .store
        .create_vehicle("Bus A".to_string(), "R1".to_string(), None)
        .await
        .unwrap();
    let second = state
        .store
        .create_vehicle("Bus B".to_string(), "R2".to_string(), None)
        .await
        .unwrap();
    let driver = Uuid::new_v4();

    let (source, sender) = ChannelPositionSource::channel(true);
    state
        .sessions
        .start(first.id, driver, source, Some(sender))
        .await
        .unwrap();

    let (source, sender) = ChannelPositionSource::channel(true);
    let result = state.sessions.start(second.id, driver, source, Some(sender)).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(state
        .store
        .get_vehicle(second.id)
        .await
        .unwrap()
        .active_driver_id
        .is_none());
}

#[tokio::test]
async fn sessions_on_different_vehicles_run_concurrently() {
    let state = test_state();
    let first = state
        .store
        .create_vehicle("Bus A".to_string(), "R1".to_string(), None)
        .await
        .unwrap();
    let second = state
        .store
        .create_vehicle("Bus B".to_string(), "R2".to_string(), None)
        .await
        .unwrap();
    let d1 = Uuid::new_v4();
    let d2 = Uuid::new_v4();

    let (source, sender) = ChannelPositionSource::channel(true);
    state
        .sessions
        .start(first.id, d1, source, Some(sender))
        .await
        .unwrap();
    let (source, sender) = ChannelPositionSource::channel(true);
    state
        .sessions
        .start(second.id, d2, source, Some(sender))
        .await
        .unwrap();

    state
        .sessions
        .push_sample(d1, sample_at(100, 1.0, 1.0))
        .await
        .unwrap();
    state
        .sessions
        .push_sample(d2, sample_at(100, 2.0, 2.0))
        .await
        .unwrap();

    wait_for_vehicle(&state, first.id, |v| v.last_location.is_some()).await;
    wait_for_vehicle(&state, second.id, |v| v.last_location.is_some()).await;

    assert_eq!(
        state
            .store
            .get_vehicle(first.id)
            .await
            .unwrap()
            .last_location
            .unwrap()
            .driver_id,
        d1
    );
    assert_eq!(
        state
            .store
            .get_vehicle(second.id)
            .await
            .unwrap()
            .last_location
            .unwrap()
            .driver_id,
        d2
    );
}

#[tokio::test]
async fn source_failure_is_reported_but_session_survives() {
    let state = test_state();
    let vehicle = state
        .store
        .create_vehicle("Bus".to_string(), "R1".to_string(), None)
        .await
        .unwrap();
    let driver = Uuid::new_v4();

    let (source, sender) = ChannelPositionSource::channel(true);
    state
        .sessions
        .start(vehicle.id, driver, source, Some(sender.clone()))
        .await
        .unwrap();

    sender.push_failure("GPS fix lost".to_string()).await.unwrap();
    wait_for_session(&state, driver, |s| {
        matches!(s.last_fault, Some(SessionFault::Sensor(_)))
    })
    .await;

    // El blip queda registrado pero la sesión sigue viva y acepta muestras
    let status = state.sessions.status(driver).await;
    assert_eq!(status.state, SessionState::Sharing);

    state
        .sessions
        .push_sample(driver, sample_at(100, 1.0, 1.0))
        .await
        .unwrap();
    wait_for_vehicle(&state, vehicle.id, |v| v.last_location.is_some()).await;
}

#[tokio::test]
async fn no_sample_lands_after_stop_returns() {
    let state = test_state();
    let vehicle = state
        .store
        .create_vehicle("Bus".to_string(), "R1".to_string(), None)
        .await
        .unwrap();
    let driver = Uuid::new_v4();

    let (source, sender) = ChannelPositionSource::channel(true);
    state
        .sessions
        .start(vehicle.id, driver, source, Some(sender.clone()))
        .await
        .unwrap();

    state.sessions.stop(driver).await.unwrap();

    // El extremo de ingesta quedó cancelado
    assert!(sender.push(sample_at(100, 1.0, 1.0)).await.is_err());

    // Aunque una muestra llegara por otra vía, el claim ya no existe
    let result = state
        .propagator
        .submit(vehicle.id, driver, sample_at(100, 1.0, 1.0))
        .await;
    assert!(matches!(result, Err(AppError::NotOwner(_))));
    assert!(state
        .store
        .get_vehicle(vehicle.id)
        .await
        .unwrap()
        .last_location
        .is_none());
}

#[tokio::test]
async fn simulated_source_drives_a_session() {
    let state = test_state();
    let vehicle = state
        .store
        .create_vehicle("Bus".to_string(), "R1".to_string(), None)
        .await
        .unwrap();
    let driver = Uuid::new_v4();

    let source = SimulatedPositionSource::new((12.90, 77.60), Duration::from_millis(10));
    state
        .sessions
        .start(vehicle.id, driver, source, None)
        .await
        .unwrap();

    wait_for_vehicle(&state, vehicle.id, |v| v.last_location.is_some()).await;

    let location = state
        .store
        .get_vehicle(vehicle.id)
        .await
        .unwrap()
        .last_location
        .unwrap();
    assert_eq!(location.driver_id, driver);
    assert!(location.speed >= 0.0);
    assert!(location.accuracy >= 0.0);

    state.sessions.stop(driver).await.unwrap();
    assert!(!state.store.get_vehicle(vehicle.id).await.unwrap().is_active());
}
