//! Feed state container.
//!
//! `FeedState::apply` is the only mutation path for the event log and the
//! alert windows.

use crate::alert_window::{AlertBook, AlertsSnapshot, DEFAULT_ALERT_CAPACITY, DEFAULT_ALERT_WINDOW_MS};
use crate::error::{FeedError, FeedResult};
use crate::event_log::{EventLog, DEFAULT_EVENT_LOG_CAPACITY};
use chrono::{DateTime, Utc};
use obwatch_core::{AlertClassifier, OrderBookEvent};
use obwatch_telemetry::Metrics;
use obwatch_ws::StreamEvent;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Feed state shared between the ingest task and readers.
pub type SharedFeedState = Arc<RwLock<FeedState>>;

/// Feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Event log capacity. Default: 500.
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
    /// Alert window span in milliseconds. Default: 60000.
    #[serde(default = "default_alert_window_ms")]
    pub alert_window_ms: i64,
    /// Per-window alert cap. Default: 500.
    #[serde(default = "default_alert_capacity")]
    pub alert_capacity: usize,
}

fn default_event_log_capacity() -> usize {
    DEFAULT_EVENT_LOG_CAPACITY
}

fn default_alert_window_ms() -> i64 {
    DEFAULT_ALERT_WINDOW_MS
}

fn default_alert_capacity() -> usize {
    DEFAULT_ALERT_CAPACITY
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: default_event_log_capacity(),
            alert_window_ms: default_alert_window_ms(),
            alert_capacity: default_alert_capacity(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> FeedResult<()> {
        if self.event_log_capacity == 0 {
            return Err(FeedError::InvalidConfig(
                "event_log_capacity must be positive".to_string(),
            ));
        }
        if self.alert_capacity == 0 {
            return Err(FeedError::InvalidConfig(
                "alert_capacity must be positive".to_string(),
            ));
        }
        if self.alert_window_ms <= 0 {
            return Err(FeedError::InvalidConfig(
                "alert_window_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Event log plus alert windows.
#[derive(Debug)]
pub struct FeedState {
    classifier: AlertClassifier,
    log: EventLog,
    alerts: AlertBook,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            classifier: AlertClassifier::default(),
            log: EventLog::default(),
            alerts: AlertBook::default(),
        }
    }
}

impl FeedState {
    pub fn new(config: &FeedConfig, classifier: AlertClassifier) -> FeedResult<Self> {
        config.validate()?;
        Ok(Self {
            classifier,
            log: EventLog::new(config.event_log_capacity),
            alerts: AlertBook::new(config.alert_window_ms, config.alert_capacity),
        })
    }

    pub fn into_shared(self) -> SharedFeedState {
        Arc::new(RwLock::new(self))
    }

    /// Apply one stream event.
    ///
    /// An update is classified, prepended to the log and, when alerting,
    /// filed in its window. A reset clears the log; alert windows expire on
    /// their own. Returns the appended event.
    pub fn apply(&mut self, event: StreamEvent, now: DateTime<Utc>) -> Option<OrderBookEvent> {
        match event {
            StreamEvent::Update(update) => {
                let severity = self.classifier.classify(update.price, update.quantity);
                let event = OrderBookEvent::new(update, severity);

                self.log.push(event.clone());
                Metrics::event_accepted(event.update.delay_ns as f64 / 1_000_000.0);
                Metrics::event_log_len(self.log.len());

                match event.alert(now) {
                    Some(record) => {
                        Metrics::alert(severity.as_str());
                        debug!(
                            %severity,
                            price = %record.price,
                            quantity = %record.quantity,
                            total = %record.total,
                            "Alert raised"
                        );
                        self.alerts.record(record, now);
                    }
                    None => self.alerts.purge_all(now),
                }

                Some(event)
            }
            StreamEvent::Reset => {
                info!(dropped = self.log.len(), "Event log reset");
                self.log.clear();
                Metrics::event_log_len(0);
                None
            }
        }
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// Events newest first.
    pub fn events(&self) -> Vec<OrderBookEvent> {
        self.log.to_vec()
    }

    /// Purge the alert windows and return their live members.
    pub fn alerts(&mut self, now: DateTime<Utc>) -> AlertsSnapshot {
        self.alerts.snapshot(now)
    }

    /// Live alerts for readers holding only a shared lock.
    pub fn live_alerts(&self, now: DateTime<Utc>) -> AlertsSnapshot {
        self.alerts.live(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use obwatch_core::{BookAction, OrderBookUpdate, Price, Severity, Side, Size};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn update(sequence: u64, price: Decimal, quantity: Decimal) -> OrderBookUpdate {
        OrderBookUpdate {
            market: "Binance".to_string(),
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
            side: Side::Ask,
            action: BookAction::Add,
            sequence,
            price: Price::new(price),
            quantity: Size::new(quantity),
            reported_ns: 1_700_000_000_000_000_000,
            delay_ns: -250_000,
            exchange_sequence: Some(sequence * 10),
        }
    }

    #[test]
    fn test_apply_preserves_update_and_adds_severity() {
        let mut state = FeedState::default();
        let input = update(1, dec!(60000), dec!(20));

        let event = state
            .apply(StreamEvent::Update(input.clone()), Utc::now())
            .unwrap();

        assert_eq!(event.update, input);
        assert_eq!(event.severity, Severity::Big);
        assert_eq!(state.events()[0], event);
    }

    #[test]
    fn test_alerts_filed_by_severity() {
        let now = Utc::now();
        let mut state = FeedState::default();

        state.apply(StreamEvent::Update(update(1, dec!(60000), dec!(20))), now);
        state.apply(StreamEvent::Update(update(2, dec!(5000), dec!(11))), now);
        state.apply(StreamEvent::Update(update(3, dec!(49000), dec!(1))), now);
        state.apply(StreamEvent::Update(update(4, dec!(64000), dec!(1))), now);

        let alerts = state.alerts(now);
        assert_eq!(alerts.big.len(), 1);
        assert_eq!(alerts.solid.len(), 1);
        assert_eq!(alerts.cheap.len(), 1);
        assert_eq!(alerts.big[0].total, dec!(1200000));
        assert_eq!(state.event_log().len(), 4);
    }

    #[test]
    fn test_reset_clears_log_only() {
        let now = Utc::now();
        let mut state = FeedState::default();
        state.apply(StreamEvent::Update(update(1, dec!(60000), dec!(20))), now);

        assert!(state.apply(StreamEvent::Reset, now).is_none());

        assert!(state.event_log().is_empty());
        assert_eq!(state.alerts(now).big.len(), 1);
    }

    #[test]
    fn test_alerts_expire_after_window() {
        let t0 = Utc::now();
        let mut state = FeedState::default();
        state.apply(StreamEvent::Update(update(1, dec!(49000), dec!(1))), t0);

        let later = t0 + Duration::seconds(61);
        assert!(state.live_alerts(later).cheap.is_empty());
        assert!(state.alerts(later).cheap.is_empty());
    }

    #[test]
    fn test_event_log_capacity_from_config() {
        let config = FeedConfig {
            event_log_capacity: 2,
            ..Default::default()
        };
        let mut state = FeedState::new(&config, AlertClassifier::default()).unwrap();
        let now = Utc::now();
        for seq in 1..=3 {
            state.apply(StreamEvent::Update(update(seq, dec!(64000), dec!(1))), now);
        }

        let seqs: Vec<u64> = state.events().iter().map(|e| e.update.sequence).collect();
        assert_eq!(seqs, vec![3, 2]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FeedConfig {
            alert_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            FeedState::new(&config, AlertClassifier::default()),
            Err(FeedError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: FeedConfig = serde_json::from_str(r#"{"event_log_capacity": 100}"#).unwrap();
        assert_eq!(config.event_log_capacity, 100);
        assert_eq!(config.alert_window_ms, 60_000);
        assert_eq!(config.alert_capacity, 500);
    }
}
