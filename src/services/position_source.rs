//! Fuentes de posición
//!
//! Este módulo define la costura entre el motor y lo que sea que produzca
//! muestras de posición: el dispositivo real de un conductor (que empuja
//! muestras por HTTP) o un generador simulado para pruebas y demos.
//!
//! Una suscripción es perezosa, sin límite y no reiniciable. La cancelación
//! viaja por un `CancellationToken`: una vez cancelado, el consumidor no
//! observa ningún evento más, llegue lo que llegue por el canal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::PositionSample;
use crate::utils::errors::{AppError, AppResult};

/// Tamaño del buffer del canal de muestras
const FEED_BUFFER: usize = 64;

/// Evento producido por una fuente de posición
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Sample(PositionSample),
    /// Problema transitorio del sensor; la fuente no reintenta por su
    /// cuenta, la política de reintento es del llamador
    Failure(String),
}

/// Suscripción cancelable a una fuente de posición
pub struct PositionFeed {
    events: mpsc::Receiver<SourceEvent>,
    cancel: CancellationToken,
}

impl PositionFeed {
    pub fn new(events: mpsc::Receiver<SourceEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Siguiente evento; `None` tras la cancelación o el cierre de la
    /// fuente. Después de cancelar no se entrega ningún evento rezagado.
    pub async fn next(&mut self) -> Option<SourceEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Fuente de muestras de posición
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Handshake de permisos con la plataforma. Idempotente; `false` si el
    /// acceso fue denegado, nunca un error.
    async fn request_access(&self) -> bool;

    /// Comenzar a producir muestras. Una fuente se consume una sola vez.
    async fn subscribe(&self) -> AppResult<PositionFeed>;
}

/// Fuente alimentada por la red: el endpoint de ingesta HTTP empuja las
/// muestras del dispositivo del conductor a través del `SampleSender`.
pub struct ChannelPositionSource {
    permission_granted: bool,
    feed: Mutex<Option<PositionFeed>>,
}

/// Extremo de escritura de una fuente de canal; lo retiene el
/// SessionManager para encaminar los POST de posición a la sesión
#[derive(Clone)]
pub struct SampleSender {
    tx: mpsc::Sender<SourceEvent>,
    cancel: CancellationToken,
}

impl SampleSender {
    /// Empujar una muestra del dispositivo a la sesión
    pub async fn push(&self, sample: PositionSample) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Conflict(
                "La suscripción de posición ya fue cancelada".to_string(),
            ));
        }
        self.tx
            .send(SourceEvent::Sample(sample))
            .await
            .map_err(|_| AppError::Conflict("La sesión ya no recibe muestras".to_string()))
    }

    /// Reportar un fallo transitorio del sensor del dispositivo
    pub async fn push_failure(&self, cause: String) -> AppResult<()> {
        self.tx
            .send(SourceEvent::Failure(cause))
            .await
            .map_err(|_| AppError::Conflict("La sesión ya no recibe muestras".to_string()))
    }
}

impl ChannelPositionSource {
    /// Crear la fuente junto con su extremo de escritura.
    /// `permission_granted` es el estado de consentimiento que reporta el
    /// dispositivo: el prompt del sistema operativo ocurre en el cliente.
    pub fn channel(permission_granted: bool) -> (Self, SampleSender) {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let cancel = CancellationToken::new();
        let source = Self {
            permission_granted,
            feed: Mutex::new(Some(PositionFeed::new(rx, cancel.clone()))),
        };
        (source, SampleSender { tx, cancel })
    }
}

#[async_trait]
impl PositionSource for ChannelPositionSource {
    async fn request_access(&self) -> bool {
        self.permission_granted
    }

    async fn subscribe(&self) -> AppResult<PositionFeed> {
        self.feed.lock().await.take().ok_or_else(|| {
            AppError::ServiceUnavailable("La fuente de posición ya fue consumida".to_string())
        })
    }
}

/// Generador simulado: camina una posición de origen con jitter aleatorio
/// a intervalos fijos. Pensado para pruebas y para el modo demo.
pub struct SimulatedPositionSource {
    access_granted: bool,
    origin: (f64, f64),
    interval: Duration,
    /// Inyectar un `Failure` tras N muestras, para probar blips del sensor
    fail_after: Option<u32>,
    started: Arc<Mutex<bool>>,
}

impl SimulatedPositionSource {
    pub fn new(origin: (f64, f64), interval: Duration) -> Self {
        Self {
            access_granted: true,
            origin,
            interval,
            fail_after: None,
            started: Arc::new(Mutex::new(false)),
        }
    }

    /// Variante que simula un usuario que deniega el permiso de ubicación
    pub fn denied() -> Self {
        let mut source = Self::new((0.0, 0.0), Duration::from_millis(50));
        source.access_granted = false;
        source
    }

    pub fn with_failure_after(mut self, samples: u32) -> Self {
        self.fail_after = Some(samples);
        self
    }
}

#[async_trait]
impl PositionSource for SimulatedPositionSource {
    async fn request_access(&self) -> bool {
        self.access_granted
    }

    async fn subscribe(&self) -> AppResult<PositionFeed> {
        let mut started = self.started.lock().await;
        if *started {
            return Err(AppError::ServiceUnavailable(
                "La fuente de posición ya fue consumida".to_string(),
            ));
        }
        *started = true;
        drop(started);

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (mut latitude, mut longitude) = self.origin;
        let interval = self.interval;
        let fail_after = self.fail_after;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut produced: u32 = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if fail_after == Some(produced) {
                    if tx
                        .send(SourceEvent::Failure("GPS fix lost".to_string()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }

                let sample = {
                    let mut rng = rand::thread_rng();
                    latitude += rng.gen_range(-0.0005..0.0005);
                    longitude += rng.gen_range(-0.0005..0.0005);
                    PositionSample {
                        latitude,
                        longitude,
                        speed: rng.gen_range(0.0..16.0),
                        accuracy: rng.gen_range(3.0..15.0),
                        timestamp: Utc::now(),
                    }
                };

                produced += 1;
                if tx.send(SourceEvent::Sample(sample)).await.is_err() {
                    break;
                }
            }
            debug!("generador de posiciones simuladas detenido");
        });

        Ok(PositionFeed::new(rx, cancel))
    }
}
