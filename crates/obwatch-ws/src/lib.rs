//! WebSocket client for the order-book update stream.
//!
//! Provides:
//! - Generation-tagged sessions so late callbacks from a superseded
//!   connection never touch current state
//! - Sequence gap detection on the update counter
//! - Fixed-delay reconnection that an explicit connect or disconnect cancels
//! - Typed decoding of inbound frames and channel-based event forwarding

pub mod connection;
pub mod error;
pub mod message;
pub mod reconnect;
pub mod sequence;
pub mod subscription;
pub mod ws_write_handle;

pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, ConnectionStatus, Rejection,
    RejectionKind,
};
pub use error::{WsError, WsResult};
pub use message::{InboundMessage, ServerNotice, StreamEvent};
pub use reconnect::ReconnectPolicy;
pub use sequence::{SequenceCheck, SequenceCursor};
pub use subscription::{SubscriptionRequest, SubscriptionStatus, SubscriptionTarget};
pub use ws_write_handle::{SendError, WsWriteHandle};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
