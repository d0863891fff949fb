//! HTTP server implementation using axum.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use obwatch_core::OrderBookEvent;
use obwatch_feed::AlertsSnapshot;
use obwatch_telemetry::Metrics;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::state::DashboardState;
use crate::types::{
    AutoReconnectRequest, ControlResponse, DashboardMessage, DashboardSnapshot, VisibilityRequest,
};

/// Connection limiter to prevent too many concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Reserve a slot. The slot is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    dashboard_state: DashboardState,
    broadcast_tx: broadcast::Sender<String>,
    connection_limiter: Arc<ConnectionLimiter>,
    config: DashboardConfig,
}

impl AppState {
    pub fn new(
        dashboard_state: DashboardState,
        broadcast_tx: broadcast::Sender<String>,
        config: DashboardConfig,
    ) -> Self {
        Self {
            dashboard_state,
            broadcast_tx,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
        }
    }

    fn control_response(&self, accepted: bool) -> Json<ControlResponse> {
        let control = self.dashboard_state.control();
        Json(ControlResponse {
            accepted,
            connection: control.connection_status(),
            auto_reconnect: control.auto_reconnect(),
        })
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/events", get(get_events))
        .route("/api/alerts", get(get_alerts))
        .route("/api/connect", post(post_connect))
        .route("/api/disconnect", post(post_disconnect))
        .route("/api/send", post(post_send))
        .route("/api/auto-reconnect", put(put_auto_reconnect))
        .route("/api/visibility", put(put_visibility))
        .route("/metrics", get(get_metrics))
        .route("/ws", get(ws_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Reject requests without valid basic auth when auth is enabled.
async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.config.auth_enabled() && !check_basic_auth(request.headers(), &state.config) {
        return unauthorized_response();
    }
    next.run(request).await
}

async fn get_snapshot(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.dashboard_state.collect_snapshot())
}

async fn get_events(State(state): State<AppState>) -> Json<Vec<OrderBookEvent>> {
    Json(state.dashboard_state.events())
}

async fn get_alerts(State(state): State<AppState>) -> Json<AlertsSnapshot> {
    Json(state.dashboard_state.alerts(Utc::now()))
}

async fn post_connect(State(state): State<AppState>) -> Json<ControlResponse> {
    info!("Connect requested via dashboard");
    state.dashboard_state.control().connect();
    state.control_response(true)
}

async fn post_disconnect(State(state): State<AppState>) -> Json<ControlResponse> {
    info!("Disconnect requested via dashboard");
    state.dashboard_state.control().disconnect();
    state.control_response(true)
}

async fn post_send(State(state): State<AppState>, body: String) -> Json<ControlResponse> {
    let accepted = state.dashboard_state.control().send_message(body);
    state.control_response(accepted)
}

async fn put_auto_reconnect(
    State(state): State<AppState>,
    Json(request): Json<AutoReconnectRequest>,
) -> Json<ControlResponse> {
    state
        .dashboard_state
        .control()
        .set_auto_reconnect(request.enabled);
    state.control_response(true)
}

async fn put_visibility(
    State(state): State<AppState>,
    Json(request): Json<VisibilityRequest>,
) -> Json<ControlResponse> {
    state
        .dashboard_state
        .control()
        .set_visibility(request.visibility);
    state.control_response(true)
}

async fn get_metrics() -> Response {
    match Metrics::encode_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.connection_limiter.try_acquire() else {
        warn!(
            current = state.connection_limiter.current_count(),
            max = state.config.max_connections,
            "WebSocket connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    info!(
        connections = state.connection_limiter.current_count(),
        "New WebSocket connection"
    );

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, guard))
}

/// Handle a WebSocket connection.
async fn handle_ws_connection(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let (mut sender, mut receiver) = socket.split();
    let mut broadcast_rx = state.broadcast_tx.subscribe();

    let initial = DashboardMessage::Snapshot(state.dashboard_state.collect_snapshot());
    if let Ok(json) = serde_json::to_string(&initial) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            debug!("Failed to send initial snapshot, client disconnected");
            return;
        }
    }

    // Client frames are only watched for close.
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            debug!("Failed to send message, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "WebSocket client lagged, catching up");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                debug!("Incoming task completed, closing connection");
                break;
            }
        }
    }

    incoming_task.abort();
    info!("WebSocket connection closed");
}

/// Check basic authentication.
fn check_basic_auth(headers: &HeaderMap, config: &DashboardConfig) -> bool {
    let Some(encoded) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Basic "))
    else {
        return false;
    };

    let Ok(decoded) = BASE64.decode(encoded.trim()) else {
        return false;
    };

    let expected = format!("{}:{}", config.username, config.password);
    decoded == expected.as_bytes()
}

/// Create an unauthorized response.
fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"obwatch\"")],
        "Unauthorized",
    )
        .into_response()
}

/// Run the dashboard HTTP server until `shutdown` resolves.
pub async fn run_server<F>(
    dashboard_state: DashboardState,
    config: DashboardConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    // Buffer for slow clients: 32 updates.
    let (broadcast_tx, _) = broadcast::channel::<String>(32);

    let state = AppState::new(
        dashboard_state.clone(),
        broadcast_tx.clone(),
        config.clone(),
    );
    let app = create_router(state);

    let broadcaster = tokio::spawn(crate::broadcast::run_broadcaster(
        dashboard_state,
        broadcast_tx,
        config.update_interval_ms,
        config.update_event_limit,
    ));

    let ip: std::net::IpAddr = config.bind.parse().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid bind address {:?}: {e}", config.bind),
        )
    })?;
    let addr = SocketAddr::new(ip, config.port);
    info!(%addr, auth = config.auth_enabled(), "Starting dashboard server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    broadcaster.abort();
    result
}
