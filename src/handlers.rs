//! ==============================================================================
//! handlers.rs - route handlers
//! ==============================================================================
//!
//! purpose:
//!     - POST /cor:    validate a device reading, persist it, push it to viewers
//!     - GET /dados:   the most recent readings of the last 10 minutes
//!     - GET /ws:      live viewer channel (`update_data` frames)
//!     - GET /health:  liveness plus viewer count
//!     - GET /:        the bundled viewer page
//!
//! relationships:
//!     - uses: storage/ (ReadingStore), broadcaster.rs, domain.rs, error.rs
//!     - used by: server.rs (router)
//!
//! ==============================================================================

use crate::broadcaster::{Broadcaster, ViewerSession};
use crate::domain::{Channel, IncomingReading, QueryEntry, SensorReading, ViewerEvent};
use crate::error::{RelayError, Result};
use crate::storage::ReadingStore;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, Json, Response};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// trailing window GET /dados looks at
pub const QUERY_WINDOW_MINUTES: u32 = 10;
/// most entries GET /dados returns
pub const QUERY_LIMIT: usize = 10;

// ==============================================================================
// shared state
// ==============================================================================
// built once at startup and cloned into every request:
// - store: where readings are persisted (influx or memory)
// - broadcaster: the live viewer registry

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub broadcaster: Broadcaster,
    /// log one line per accepted reading
    pub show_sensor_data: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster, show_sensor_data: true }
    }
}

/// parse and validate a POST /cor body
pub fn parse_reading(body: &[u8]) -> Result<SensorReading> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|_| RelayError::BadRequest("JSON esperado".into()))?;
    if !value.is_object() {
        return Err(RelayError::BadRequest("JSON esperado".into()));
    }

    let incoming: IncomingReading = serde_json::from_value(value)
        .map_err(|e| RelayError::BadRequest(format!("payload inválido: {}", e)))?;

    SensorReading::from_incoming(incoming)
        .ok_or_else(|| RelayError::BadRequest("Campo 'cor' ausente".into()))
}

/// POST /cor
pub async fn ingest_reading(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let reading = parse_reading(&body)?;

    state.store.write(&reading.cor).await?;

    if state.show_sensor_data {
        info!(
            "[SENSOR] cor: {} | R: {} | G: {} | B: {} | Clear: {}",
            reading.cor,
            Channel(reading.r),
            Channel(reading.g),
            Channel(reading.b),
            Channel(reading.clear)
        );
    }

    let cor = reading.cor.clone();
    let viewers = state.broadcaster.broadcast(&ViewerEvent::UpdateData(reading));
    debug!(%cor, viewers, "reading broadcast");

    Ok(Json(serde_json::json!({ "status": "ok", "cor": cor })))
}

/// GET /dados
pub async fn recent_readings(State(state): State<AppState>) -> Result<Json<Vec<QueryEntry>>> {
    let mut points = state.store.query_recent(QUERY_WINDOW_MINUTES, QUERY_LIMIT).await?;

    // a store may hand back several tables, each capped on its own
    points.sort_by_key(|p| p.time);
    let newest = points.split_off(points.len().saturating_sub(QUERY_LIMIT));

    Ok(Json(newest.into_iter().map(QueryEntry::from).collect()))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "viewers": state.broadcaster.viewer_count(),
        "storage": state.store.backend(),
    }))
}

/// GET /
pub async fn viewer_page() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// GET /ws
pub async fn viewer_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_viewer(socket, state.broadcaster.subscribe()))
}

async fn run_viewer(mut socket: WebSocket, mut session: ViewerSession) {
    let id = session.id();

    loop {
        tokio::select! {
            event = session.recv() => match event {
                Some(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(viewer = id, error = %e, "failed to encode viewer event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(frame)).await.is_err() {
                        debug!(viewer = id, "viewer send failed");
                        break;
                    }
                }
                // broadcaster is shutting down
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // viewers have nothing to say
                Some(Ok(_)) => {}
            },
        }
    }
    // dropping the session unregisters it
}
