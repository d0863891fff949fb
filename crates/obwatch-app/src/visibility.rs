//! Visibility-driven connection control.
//!
//! Going to the background always disconnects. Returning to the foreground
//! reconnects only when the auto-reconnect preference is on.

use obwatch_core::Visibility;
use obwatch_dashboard::StreamControl;
use obwatch_ws::{ConnectionManager, ConnectionStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Owns the auto-reconnect preference and maps visibility changes onto the
/// connection manager.
pub struct VisibilityMonitor {
    manager: ConnectionManager,
    auto_reconnect: AtomicBool,
}

impl VisibilityMonitor {
    pub fn new(manager: ConnectionManager, auto_reconnect: bool) -> Self {
        Self {
            manager,
            auto_reconnect: AtomicBool::new(auto_reconnect),
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        match visibility {
            Visibility::Background => {
                info!("Consumer hidden, disconnecting");
                self.manager.disconnect();
            }
            Visibility::Foreground if self.auto_reconnect() => {
                info!("Consumer visible, reconnecting");
                self.manager.connect();
            }
            Visibility::Foreground => {
                debug!("Consumer visible, auto-reconnect off");
            }
        }
    }

    pub fn set_auto_reconnect(&self, enabled: bool) {
        let previous = self.auto_reconnect.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "Auto-reconnect preference changed");
        }
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect.load(Ordering::SeqCst)
    }
}

impl StreamControl for VisibilityMonitor {
    fn connect(&self) {
        self.manager.connect();
    }

    fn disconnect(&self) {
        self.manager.disconnect();
    }

    fn send_message(&self, text: String) -> bool {
        self.manager.send_message(text)
    }

    fn set_auto_reconnect(&self, enabled: bool) {
        VisibilityMonitor::set_auto_reconnect(self, enabled);
    }

    fn auto_reconnect(&self) -> bool {
        VisibilityMonitor::auto_reconnect(self)
    }

    fn set_visibility(&self, visibility: Visibility) {
        VisibilityMonitor::set_visibility(self, visibility);
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.manager.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obwatch_ws::{ConnectionConfig, ConnectionState};
    use tokio::sync::mpsc;

    fn monitor(auto_reconnect: bool) -> (VisibilityMonitor, mpsc::Receiver<obwatch_ws::StreamEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let config = ConnectionConfig {
            // Nothing listens here; the session fails on its own task.
            url: "ws://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        (
            VisibilityMonitor::new(ConnectionManager::new(config, tx), auto_reconnect),
            rx,
        )
    }

    #[tokio::test]
    async fn test_background_disconnects() {
        let (monitor, _rx) = monitor(true);
        monitor.manager().connect();
        assert_eq!(monitor.manager().open_attempts(), 1);

        monitor.set_visibility(Visibility::Background);
        assert_eq!(monitor.manager().state(), ConnectionState::Disconnected);
        assert!(!monitor.manager().is_reconnect_pending());
    }

    #[tokio::test]
    async fn test_foreground_connects_when_enabled() {
        let (monitor, _rx) = monitor(true);
        monitor.set_visibility(Visibility::Foreground);
        assert_eq!(monitor.manager().open_attempts(), 1);
        monitor.set_visibility(Visibility::Background);
    }

    #[tokio::test]
    async fn test_foreground_ignored_when_disabled() {
        let (monitor, _rx) = monitor(false);
        monitor.set_visibility(Visibility::Foreground);

        assert_eq!(monitor.manager().open_attempts(), 0);
        assert_eq!(monitor.manager().state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_preference_toggle() {
        let (monitor, _rx) = monitor(false);
        assert!(!monitor.auto_reconnect());

        monitor.set_auto_reconnect(true);
        assert!(monitor.auto_reconnect());

        // The preference alone never opens a session.
        assert_eq!(monitor.manager().open_attempts(), 0);
    }

    #[tokio::test]
    async fn test_stream_control_delegates() {
        let (monitor, _rx) = monitor(true);
        let control: &dyn StreamControl = &monitor;

        assert!(!control.send_message("ping".to_string()));
        control.set_auto_reconnect(false);
        assert!(!monitor.auto_reconnect());

        control.connect();
        assert_eq!(control.connection_status().state, ConnectionState::Connecting);
        control.disconnect();
        assert_eq!(control.connection_status().state, ConnectionState::Disconnected);
    }
}
