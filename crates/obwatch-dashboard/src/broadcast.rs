//! WebSocket broadcast functionality.
//!
//! The broadcaster collects state updates at a fixed interval and broadcasts
//! them to all connected WebSocket clients.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::state::DashboardState;
use crate::types::DashboardMessage;

fn send_json(tx: &broadcast::Sender<String>, msg: &DashboardMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => match tx.send(json) {
            Ok(n) => trace!(receivers = n, "Broadcast sent"),
            // No receivers connected
            Err(_) => trace!("No WebSocket receivers connected"),
        },
        Err(e) => debug!(error = %e, "Failed to serialize dashboard message"),
    }
}

/// Run the broadcaster task.
///
/// Emits a `ConnectionChanged` message whenever the connection state differs
/// from the previous tick, followed by a regular `Update`.
pub async fn run_broadcaster(
    state: DashboardState,
    tx: broadcast::Sender<String>,
    interval_ms: u64,
    event_limit: usize,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    let mut last_state = state.control().connection_status().state;

    loop {
        interval.tick().await;

        let current = state.control().connection_status().state;
        if current != last_state {
            send_json(
                &tx,
                &DashboardMessage::ConnectionChanged {
                    timestamp_ms: chrono::Utc::now().timestamp_millis(),
                    from: last_state,
                    to: current,
                },
            );
            last_state = current;
        }

        send_json(&tx, &state.collect_update(event_limit));
    }
}
