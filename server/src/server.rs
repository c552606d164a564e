//! Axum server for the dashboard page, its JSON API and the live `/ws`
//! channel.
//!
//! Every connected WebSocket client receives the current view on connect,
//! then one `view` message per published view and one `transaction`
//! message per orchestrator notification. Clients may submit actions over
//! the socket or via `POST /api/actions`.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use staker_dashboard::{DashboardError, DashboardHandle, DashboardMetrics};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::messages::{ActionRequest, ClientMessage, ServerMessage};
use crate::page::INDEX_HTML;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub handle: DashboardHandle,
    pub metrics: Arc<DashboardMetrics>,
}

pub struct DashboardServer {
    pub port: u16,
    pub state: AppState,
}

impl DashboardServer {
    pub fn new(port: u16, handle: DashboardHandle, metrics: Arc<DashboardMetrics>) -> Self {
        Self {
            port,
            state: AppState { handle, metrics },
        }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);

        Router::new()
            .route("/", get(index))
            .route("/api/state", get(state_handler))
            .route("/api/actions", post(action_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Serve until the shutdown receiver fires.
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(%addr, "dashboard server listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;
        info!("dashboard server stopped");
        Ok(())
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn state_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.handle.view())
}

async fn action_handler(
    State(state): State<AppState>,
    Json(action): Json<ActionRequest>,
) -> Response {
    let request = match action.into_request() {
        Ok(request) => request,
        Err(e) => return error_response(DashboardError::Value(e)),
    };
    match state.handle.submit(request).await {
        Ok(id) => (StatusCode::ACCEPTED, Json(json!({ "id": id }))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn status_for(error: &DashboardError) -> StatusCode {
    match error {
        DashboardError::NotEligible { .. } => StatusCode::CONFLICT,
        DashboardError::InvalidRequest(_) | DashboardError::Value(_) => StatusCode::BAD_REQUEST,
        DashboardError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: DashboardError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        warn!(error = %error, "request failed");
    }
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(ws_sender));
    debug!("dashboard client connected");

    let initial = ServerMessage::View {
        view: Box::new(state.handle.view()),
    };
    if send(&ws_sender, &initial).await.is_err() {
        return;
    }

    let forwarders = [
        spawn_view_forwarder(&state, ws_sender.clone()),
        spawn_tx_forwarder(&state, ws_sender.clone()),
    ];

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "websocket receive error");
                break;
            }
        };

        match msg {
            Message::Text(text) => handle_text_message(&text, &state, &ws_sender).await,
            Message::Close(_) => break,
            Message::Ping(data) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    debug!("dashboard client disconnected");
}

async fn handle_text_message(text: &str, state: &AppState, ws_sender: &WsSender) {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            let reply = ServerMessage::Error {
                message: format!("invalid message: {e}"),
            };
            let _ = send(ws_sender, &reply).await;
            return;
        }
    };

    let reply = match client_msg {
        ClientMessage::Ping => ServerMessage::Pong,
        ClientMessage::Submit { request } => {
            let result = match request.into_request() {
                Ok(request) => state.handle.submit(request).await,
                Err(e) => Err(DashboardError::Value(e)),
            };
            match result {
                Ok(id) => ServerMessage::Submitted { id },
                Err(e) => ServerMessage::Error {
                    message: e.to_string(),
                },
            }
        }
    };
    let _ = send(ws_sender, &reply).await;
}

fn spawn_view_forwarder(state: &AppState, ws_sender: WsSender) -> JoinHandle<()> {
    let mut views = state.handle.watch();
    views.borrow_and_update();
    tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            let msg = ServerMessage::View {
                view: Box::new(view),
            };
            if send(&ws_sender, &msg).await.is_err() {
                break;
            }
        }
    })
}

fn spawn_tx_forwarder(state: &AppState, ws_sender: WsSender) -> JoinHandle<()> {
    let mut notifications = state.handle.subscribe_transactions();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    let msg = ServerMessage::Transaction { notification };
                    if send(&ws_sender, &msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "websocket client lagging behind transactions");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn send(ws_sender: &WsSender, msg: &ServerMessage) -> Result<(), axum::Error> {
    let mut sender = ws_sender.lock().await;
    sender.send(Message::Text(msg.to_json())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use staker_types::{StakerError, TxAction};

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&DashboardError::NotEligible {
                action: TxAction::Execute
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&DashboardError::Value(StakerError::UnknownPreset("2".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DashboardError::InvalidRequest("zero stake".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&DashboardError::Closed), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(&DashboardError::Config("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
