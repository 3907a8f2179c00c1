//! Rutas del feed de flota
//!
//! El endpoint de watch entrega el feed multiplexado como Server-Sent
//! Events: un evento `snapshot` inmediato con el conjunto completo y uno
//! más por cada mutación aceptada, en el orden de aceptación.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::{Stream, StreamExt};

use crate::dto::vehicle_dto::VehicleResponse;
use crate::state::AppState;

pub fn create_fleet_router() -> Router<AppState> {
    Router::new().route("/watch", get(watch_fleet))
}

async fn watch_fleet(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let watch = state.store.watch_all().await;

    let stream = watch.into_stream().map(|snapshot| {
        let vehicles: Vec<VehicleResponse> =
            snapshot.into_iter().map(VehicleResponse::from).collect();
        Event::default().event("snapshot").json_data(&vehicles)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
