//! Dashboard API types.
//!
//! These types are used for JSON serialization in REST and WebSocket APIs.

use obwatch_core::{OrderBookEvent, Visibility};
use obwatch_feed::AlertsSnapshot;
use obwatch_ws::{ConnectionState, ConnectionStatus};
use serde::{Deserialize, Serialize};

/// Full dashboard state snapshot (sent on initial connection and via REST).
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    /// Timestamp when snapshot was taken (Unix milliseconds).
    pub timestamp_ms: i64,
    pub connection: ConnectionStatus,
    pub auto_reconnect: bool,
    /// Event log, newest first.
    pub events: Vec<OrderBookEvent>,
    /// Live alerts per window, newest first.
    pub alerts: AlertsSnapshot,
}

/// WebSocket message types.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardMessage {
    /// Full state, sent once on connect.
    Snapshot(DashboardSnapshot),
    /// Periodic update.
    Update {
        timestamp_ms: i64,
        connection: ConnectionStatus,
        auto_reconnect: bool,
        /// Event log length.
        event_count: usize,
        /// Head of the event log, newest first.
        latest_events: Vec<OrderBookEvent>,
        alerts: AlertsSnapshot,
    },
    /// Connection state transition observed between two broadcasts.
    ConnectionChanged {
        timestamp_ms: i64,
        from: ConnectionState,
        to: ConnectionState,
    },
}

/// Body of `PUT /api/auto-reconnect`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AutoReconnectRequest {
    pub enabled: bool,
}

/// Body of `PUT /api/visibility`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VisibilityRequest {
    pub visibility: Visibility,
}

/// Response of every control endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ControlResponse {
    /// False when the command had no effect (e.g. send while disconnected).
    pub accepted: bool,
    pub connection: ConnectionStatus,
    pub auto_reconnect: bool,
}
