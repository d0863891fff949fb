//! WebSocket write handle for sending messages.
//!
//! Fire-and-forget: a successful send only means the frame was queued on the
//! current session's outbound channel.

use crate::connection::{ConnectionState, Inner};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Error type for outbound sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// No session, or the session has not opened yet.
    NotConnected,
    /// Outbound queue is full.
    QueueFull,
    /// Session task has exited.
    ChannelClosed,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::QueueFull => write!(f, "outbound queue full"),
            Self::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for SendError {}

/// Write handle for sending text frames to the current session.
///
/// Reconnect-safe: the outbound sender is looked up on every send, so a
/// handle obtained before a reconnect writes to the new session.
#[derive(Clone)]
pub struct WsWriteHandle {
    inner: Arc<Mutex<Inner>>,
}

impl WsWriteHandle {
    pub(crate) fn new(inner: Arc<Mutex<Inner>>) -> Self {
        Self { inner }
    }

    /// Queue a text frame.
    ///
    /// # Errors
    ///
    /// - `SendError::NotConnected`: state is not `Connected`
    /// - `SendError::QueueFull`: outbound queue at capacity
    /// - `SendError::ChannelClosed`: session task already exited
    pub fn send_text(&self, text: String) -> Result<(), SendError> {
        let tx = {
            let inner = self.inner.lock();
            if inner.state != ConnectionState::Connected {
                return Err(SendError::NotConnected);
            }
            inner
                .session
                .as_ref()
                .map(|s| s.outbound_tx.clone())
                .ok_or(SendError::NotConnected)?
        };

        tx.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })?;
        debug!("Outbound frame queued");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().state == ConnectionState::Connected
    }
}
