//! HTTP + WebSocket API for the UI collaborator
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /snapshot - Latest committed snapshot
//! - POST /dispatch - Apply one action (422 on validation error)
//! - POST /undo - Step the tracked slice back
//! - POST /redo - Step it forward again
//! - POST /sync - Run a sync pass now
//! - WS /ws - Live snapshots; text frames carrying actions are dispatched

use axum::{
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::store::Store;
use crate::core::sync::{FlushReport, SyncCoordinator};
use crate::types::{Action, Snapshot, SyncStatus, ValidationError};

/// App state
pub struct AppState {
    pub store: Arc<Store>,
    pub sync: Option<Arc<SyncCoordinator>>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub online: bool,
    pub sync_status: SyncStatus,
    pub pending_operations: usize,
}

/// Error body for rejected requests
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Undo/redo response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub applied: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub snapshot: Snapshot,
}

fn rejection(status: StatusCode, code: &str, message: String) -> Response {
    (status, Json(ErrorResponse { code: code.to_string(), message })).into_response()
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        rejection(StatusCode::UNPROCESSABLE_ENTITY, self.code(), self.to_string())
    }
}

/// Create the API router
pub fn create_router(store: Arc<Store>, sync: Option<Arc<SyncCoordinator>>) -> Router {
    let state = Arc::new(AppState { store, sync });

    Router::new()
        .route("/health", get(health))
        .route("/snapshot", get(get_snapshot))
        .route("/dispatch", post(dispatch))
        .route("/undo", post(undo))
        .route("/redo", post(redo))
        .route("/sync", post(sync_now))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.store.get_snapshot();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        online: snapshot.offline.is_online,
        sync_status: snapshot.offline.sync_status,
        pending_operations: snapshot.offline.queue.len(),
    })
}

async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.store.get_snapshot())
}

/// Decode an action from a UI client. Engine-only variants are refused.
fn decode_ui_action(text: &str) -> Result<Action, ValidationError> {
    let action: Action =
        serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    if !action.is_ui_action() {
        return Err(ValidationError::Reserved(action.name()));
    }
    Ok(action)
}

/// Apply an action. The body is decoded here rather than by the `Json`
/// extractor so malformed actions answer with the same 422 error shape.
async fn dispatch(State(state): State<Arc<AppState>>, body: String) -> Result<Json<Snapshot>, ValidationError> {
    let action = decode_ui_action(&body)?;
    debug!(action = action.name(), "api dispatch");
    Ok(Json(state.store.dispatch(action)?))
}

async fn undo(State(state): State<Arc<AppState>>) -> Json<HistoryResponse> {
    let restored = state.store.undo();
    Json(history_response(&state.store, restored))
}

async fn redo(State(state): State<Arc<AppState>>) -> Json<HistoryResponse> {
    let restored = state.store.redo();
    Json(history_response(&state.store, restored))
}

fn history_response(store: &Store, restored: Option<Snapshot>) -> HistoryResponse {
    HistoryResponse {
        applied: restored.is_some(),
        can_undo: store.can_undo(),
        can_redo: store.can_redo(),
        snapshot: restored.unwrap_or_else(|| store.get_snapshot()),
    }
}

/// Run a sync pass now. The pass runs on its own task so a client that
/// hangs up does not cut it short.
async fn sync_now(State(state): State<Arc<AppState>>) -> Result<Json<FlushReport>, Response> {
    let coordinator = state.sync.clone().ok_or_else(|| {
        rejection(
            StatusCode::SERVICE_UNAVAILABLE,
            "S001_NO_REMOTE",
            "no remote sync service configured".to_string(),
        )
    })?;
    let report = tokio::spawn(async move { coordinator.flush().await })
        .await
        .map_err(|e| rejection(StatusCode::INTERNAL_SERVER_ERROR, "S002_SYNC_ABORTED", e.to_string()))?;
    Ok(Json(report))
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, state).await;
    })
}

/// Push every commit; dispatch actions the client sends
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut changes = state.store.watch();

    let initial = serde_json::to_string(&*changes.borrow_and_update()).unwrap_or_default();
    if sender.send(Message::Text(initial)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let json = serde_json::to_string(&*changes.borrow_and_update()).unwrap_or_default();
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let result = decode_ui_action(&text).and_then(|action| state.store.dispatch(action));
                    if let Err(e) = result {
                        let body = serde_json::to_string(&ErrorResponse {
                            code: e.code().to_string(),
                            message: e.to_string(),
                        })
                        .unwrap_or_default();
                        if sender.send(Message::Text(body)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Run the API server until `shutdown` resolves; in-flight requests finish
/// before this returns
pub async fn run_server<F>(
    addr: &str,
    store: Arc<Store>,
    sync: Option<Arc<SyncCoordinator>>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(store, sync);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API listening");
    println!("Sentence Engine API running on {}", addr);
    println!("  GET  /health    - Health check");
    println!("  GET  /snapshot  - Latest snapshot");
    println!("  POST /dispatch  - Apply an action");
    println!("  POST /undo      - Undo");
    println!("  POST /redo      - Redo");
    println!("  POST /sync      - Sync now");
    println!("  WS   /ws        - Live snapshots");
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
    info!("API stopped");
    Ok(())
}
