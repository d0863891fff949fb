//! Write surface the dashboard drives.

use obwatch_core::Visibility;
use obwatch_ws::ConnectionStatus;

/// Connection controls exposed to the one consumer.
///
/// Implemented by the application on top of its connection manager and
/// visibility monitor.
pub trait StreamControl: Send + Sync + 'static {
    fn connect(&self);
    fn disconnect(&self);
    /// Returns false if the frame was dropped (not connected).
    fn send_message(&self, text: String) -> bool;
    fn set_auto_reconnect(&self, enabled: bool);
    fn auto_reconnect(&self) -> bool;
    fn set_visibility(&self, visibility: Visibility);
    fn connection_status(&self) -> ConnectionStatus;
}
