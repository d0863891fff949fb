//! Time-windowed alert buckets.
//!
//! Each alerting severity owns one window. Members older than the window are
//! purged on every write and every read, so a read never returns a record with
//! `now - created_at >= window`.

use chrono::{DateTime, Duration, Utc};
use obwatch_core::{AlertRecord, Severity};
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_ALERT_WINDOW_MS: i64 = 60_000;
pub const DEFAULT_ALERT_CAPACITY: usize = 500;

/// Newest-first alerts of one severity.
#[derive(Debug, Clone)]
pub struct AlertWindow {
    severity: Severity,
    records: VecDeque<AlertRecord>,
    window: Duration,
    capacity: usize,
}

impl AlertWindow {
    pub fn new(severity: Severity, window_ms: i64, capacity: usize) -> Self {
        Self {
            severity,
            records: VecDeque::with_capacity(capacity),
            window: Duration::milliseconds(window_ms),
            capacity,
        }
    }

    fn is_live(&self, record: &AlertRecord, now: DateTime<Utc>) -> bool {
        now - record.created_at < self.window
    }

    /// Drop members outside the window.
    pub fn purge(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.records.retain(|r| now - r.created_at < window);
    }

    /// Purge, then prepend `record` and enforce the cap. Records of another
    /// severity are ignored.
    pub fn push(&mut self, record: AlertRecord, now: DateTime<Utc>) {
        if record.severity != self.severity {
            return;
        }
        self.purge(now);
        self.records.push_front(record);
        self.records.truncate(self.capacity);
    }

    /// Purge, then return the live members newest first.
    pub fn records(&mut self, now: DateTime<Utc>) -> Vec<AlertRecord> {
        self.purge(now);
        self.records.iter().cloned().collect()
    }

    /// Live members without mutating the window.
    pub fn live(&self, now: DateTime<Utc>) -> Vec<AlertRecord> {
        self.records
            .iter()
            .filter(|r| self.is_live(r, now))
            .cloned()
            .collect()
    }

    /// Stored member count, stale members included until the next purge.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Live alerts of every window, newest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertsSnapshot {
    pub cheap: Vec<AlertRecord>,
    pub solid: Vec<AlertRecord>,
    pub big: Vec<AlertRecord>,
}

/// The three alert windows.
#[derive(Debug, Clone)]
pub struct AlertBook {
    cheap: AlertWindow,
    solid: AlertWindow,
    big: AlertWindow,
}

impl Default for AlertBook {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_WINDOW_MS, DEFAULT_ALERT_CAPACITY)
    }
}

impl AlertBook {
    pub fn new(window_ms: i64, capacity: usize) -> Self {
        Self {
            cheap: AlertWindow::new(Severity::Cheap, window_ms, capacity),
            solid: AlertWindow::new(Severity::Solid, window_ms, capacity),
            big: AlertWindow::new(Severity::Big, window_ms, capacity),
        }
    }

    pub fn window(&self, severity: Severity) -> Option<&AlertWindow> {
        match severity {
            Severity::Cheap => Some(&self.cheap),
            Severity::Solid => Some(&self.solid),
            Severity::Big => Some(&self.big),
            Severity::None => None,
        }
    }

    fn window_mut(&mut self, severity: Severity) -> Option<&mut AlertWindow> {
        match severity {
            Severity::Cheap => Some(&mut self.cheap),
            Severity::Solid => Some(&mut self.solid),
            Severity::Big => Some(&mut self.big),
            Severity::None => None,
        }
    }

    pub fn purge_all(&mut self, now: DateTime<Utc>) {
        self.cheap.purge(now);
        self.solid.purge(now);
        self.big.purge(now);
    }

    /// Purge every window and file `record` under its severity.
    /// Records with `Severity::None` are ignored.
    pub fn record(&mut self, record: AlertRecord, now: DateTime<Utc>) {
        self.purge_all(now);
        if let Some(window) = self.window_mut(record.severity) {
            window.push(record, now);
        }
    }

    /// Purge every window and return the live members.
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> AlertsSnapshot {
        AlertsSnapshot {
            cheap: self.cheap.records(now),
            solid: self.solid.records(now),
            big: self.big.records(now),
        }
    }

    /// Live members without purging.
    pub fn live(&self, now: DateTime<Utc>) -> AlertsSnapshot {
        AlertsSnapshot {
            cheap: self.cheap.live(now),
            solid: self.solid.live(now),
            big: self.big.live(now),
        }
    }
}
