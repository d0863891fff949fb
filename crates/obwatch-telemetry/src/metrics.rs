//! Prometheus metrics for obwatch.
//!
//! Covers:
//! - Connection state and reconnections
//! - Inbound frames by message kind
//! - Sequence gaps and client rejections
//! - Accepted events, alert counts and event log length
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which must crash at startup. These panics
//! only occur during static initialization, never at runtime.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_histogram, Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, TextEncoder,
};

/// WebSocket connection state (1 = connected, 0 = disconnected).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "obwatch_ws_connected",
        "WebSocket connection state (1=connected)"
    )
    .unwrap()
});

/// WebSocket state machine current state.
/// Labels: state (disconnected/connecting/connected)
pub static WS_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "obwatch_ws_state",
        "WebSocket state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total WebSocket reconnections scheduled.
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "obwatch_ws_reconnect_total",
        "Total WebSocket reconnections scheduled",
        &["reason"]
    )
    .unwrap()
});

/// Inbound frames by message kind.
pub static WS_MESSAGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "obwatch_ws_messages_total",
        "Inbound frames by message kind",
        &["kind"]
    )
    .unwrap()
});

/// Frames that failed to decode.
pub static WS_DECODE_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "obwatch_ws_decode_errors_total",
        "Inbound frames dropped because they failed to decode"
    )
    .unwrap()
});

/// Sequence gaps detected on the update stream.
pub static SEQUENCE_GAPS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "obwatch_sequence_gaps_total",
        "Sequence gaps or reorders detected on the update stream"
    )
    .unwrap()
});

/// Client rejections (unauthorized / rate limited).
pub static REJECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "obwatch_rejections_total",
        "Client rejections reported by the upstream",
        &["kind"]
    )
    .unwrap()
});

/// Updates accepted into the event log.
pub static EVENTS_ACCEPTED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "obwatch_events_accepted_total",
        "Order-book updates accepted into the event log"
    )
    .unwrap()
});

/// Alerts raised by severity.
pub static ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "obwatch_alerts_total",
        "Alerts raised by severity",
        &["severity"]
    )
    .unwrap()
});

/// Current event log length.
pub static EVENT_LOG_LEN: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("obwatch_event_log_len", "Current event log length").unwrap()
});

/// Upstream publish delay in milliseconds.
pub static FEED_DELAY_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "obwatch_feed_delay_ms",
        "Upstream publish delay reported on accepted updates, in milliseconds",
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0]
    )
    .unwrap()
});

const WS_STATES: [&str; 3] = ["disconnected", "connecting", "connected"];

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set WebSocket state machine state.
    /// Only the active state is set to 1, all others to 0.
    pub fn ws_state_set(state: &str) {
        for s in &WS_STATES {
            WS_STATE.with_label_values(&[s]).set(0.0);
        }
        WS_STATE.with_label_values(&[state]).set(1.0);
        WS_CONNECTED.set(if state == "connected" { 1.0 } else { 0.0 });
    }

    /// Record a scheduled reconnection.
    pub fn ws_reconnect(reason: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record an inbound frame.
    pub fn ws_message(kind: &str) {
        WS_MESSAGES_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a frame dropped by the decoder.
    pub fn ws_decode_error() {
        WS_DECODE_ERRORS_TOTAL.inc();
    }

    /// Record a sequence gap.
    pub fn sequence_gap() {
        SEQUENCE_GAPS_TOTAL.inc();
    }

    /// Record a client rejection.
    pub fn rejection(kind: &str) {
        REJECTIONS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record an accepted update and its reported publish delay.
    pub fn event_accepted(delay_ms: f64) {
        EVENTS_ACCEPTED_TOTAL.inc();
        FEED_DELAY_MS.observe(delay_ms);
    }

    /// Record an alert.
    pub fn alert(severity: &str) {
        ALERTS_TOTAL.with_label_values(&[severity]).inc();
    }

    /// Update event log length.
    pub fn event_log_len(len: usize) {
        EVENT_LOG_LEN.set(len as f64);
    }

    /// Encode all registered metrics in the Prometheus text format.
    pub fn encode_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_state_is_exclusive() {
        Metrics::ws_state_set("connecting");
        Metrics::ws_state_set("connected");

        assert_eq!(WS_STATE.with_label_values(&["connected"]).get(), 1.0);
        assert_eq!(WS_STATE.with_label_values(&["connecting"]).get(), 0.0);
        assert_eq!(WS_CONNECTED.get(), 1.0);
    }

    #[test]
    fn test_encode_text_contains_registered_metrics() {
        Metrics::alert("big");
        let text = Metrics::encode_text().unwrap();
        assert!(text.contains("obwatch_alerts_total"));
    }
}
