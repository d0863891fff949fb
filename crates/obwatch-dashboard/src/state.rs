//! Dashboard state management.
//!
//! DashboardState joins the feed state with the connection controls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use obwatch_core::OrderBookEvent;
use obwatch_feed::{AlertsSnapshot, SharedFeedState};

use crate::control::StreamControl;
use crate::types::{DashboardMessage, DashboardSnapshot};

#[derive(Clone)]
pub struct DashboardState {
    feed: SharedFeedState,
    control: Arc<dyn StreamControl>,
}

impl DashboardState {
    pub fn new(feed: SharedFeedState, control: Arc<dyn StreamControl>) -> Self {
        Self { feed, control }
    }

    pub fn control(&self) -> &dyn StreamControl {
        self.control.as_ref()
    }

    /// Collect a full snapshot of the current state.
    ///
    /// Alert windows are purged as part of the read.
    pub fn collect_snapshot(&self) -> DashboardSnapshot {
        let now = Utc::now();
        let (events, alerts) = {
            let mut feed = self.feed.write();
            (feed.events(), feed.alerts(now))
        };

        DashboardSnapshot {
            timestamp_ms: now.timestamp_millis(),
            connection: self.control.connection_status(),
            auto_reconnect: self.control.auto_reconnect(),
            events,
            alerts,
        }
    }

    /// Collect a broadcast update carrying at most `event_limit` events.
    pub fn collect_update(&self, event_limit: usize) -> DashboardMessage {
        let now = Utc::now();
        let (event_count, latest_events, alerts) = {
            let mut feed = self.feed.write();
            let log = feed.event_log();
            let count = log.len();
            let latest: Vec<OrderBookEvent> = log.iter().take(event_limit).cloned().collect();
            (count, latest, feed.alerts(now))
        };

        DashboardMessage::Update {
            timestamp_ms: now.timestamp_millis(),
            connection: self.control.connection_status(),
            auto_reconnect: self.control.auto_reconnect(),
            event_count,
            latest_events,
            alerts,
        }
    }

    /// Event log, newest first.
    pub fn events(&self) -> Vec<OrderBookEvent> {
        self.feed.read().events()
    }

    /// Live alerts, purging stale members.
    pub fn alerts(&self, now: DateTime<Utc>) -> AlertsSnapshot {
        self.feed.write().alerts(now)
    }
}
