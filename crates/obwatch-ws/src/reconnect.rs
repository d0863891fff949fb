//! Fixed-delay reconnect scheduling.
//!
//! A scheduled reconnect is identified by a ticket taken from a monotonically
//! increasing epoch. An explicit connect or disconnect supersedes the pending
//! ticket, so a timer that fires afterwards finds nothing to take.

use std::time::Duration;

pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    delay: Duration,
    epoch: u64,
    pending: Option<u64>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS))
    }
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            epoch: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule a reconnect. Returns `None` if one is already pending.
    pub fn try_schedule(&mut self) -> Option<u64> {
        if self.pending.is_some() {
            return None;
        }
        self.epoch += 1;
        self.pending = Some(self.epoch);
        self.pending
    }

    /// Invalidate any pending ticket. Returns true if one was pending.
    pub fn supersede(&mut self) -> bool {
        self.epoch += 1;
        self.pending.take().is_some()
    }

    /// Consume the ticket when its timer fires. Returns false if the ticket
    /// was superseded.
    pub fn take(&mut self, ticket: u64) -> bool {
        if self.pending == Some(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}
