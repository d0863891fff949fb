//! Application orchestration.
//!
//! `Application` owns the connection manager, the shared feed state and the
//! visibility monitor. `run` pumps stream events into the feed until
//! shutdown; the dashboard runs beside it on its own task.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::visibility::VisibilityMonitor;
use chrono::Utc;
use obwatch_core::AlertClassifier;
use obwatch_dashboard::{DashboardState, StreamControl};
use obwatch_feed::{FeedState, SharedFeedState};
use obwatch_telemetry::FeedStatsReporter;
use obwatch_ws::{ConnectionManager, StreamEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    manager: ConnectionManager,
    monitor: Arc<VisibilityMonitor>,
    feed: SharedFeedState,
    events_rx: mpsc::Receiver<StreamEvent>,
}

impl Application {
    /// Build every component. Nothing connects until `run`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::channel(config.ws.event_channel_capacity);
        let manager = ConnectionManager::new(config.connection_config(), events_tx);
        let monitor = Arc::new(VisibilityMonitor::new(
            manager.clone(),
            config.visibility.auto_reconnect,
        ));
        let feed =
            FeedState::new(&config.feed, AlertClassifier::new(config.classifier))?.into_shared();

        info!(
            channel = %config.ws.subscription.channel(),
            url = %config.ws.url,
            api_key_set = config.ws.api_key.is_some(),
            "Application initialized"
        );

        Ok(Self {
            config,
            manager,
            monitor,
            feed,
            events_rx,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn monitor(&self) -> Arc<VisibilityMonitor> {
        self.monitor.clone()
    }

    pub fn feed(&self) -> SharedFeedState {
        self.feed.clone()
    }

    /// Run until Ctrl+C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(?e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let cancel = CancellationToken::new();
        let dashboard = self.spawn_dashboard(cancel.clone());

        let Self {
            config,
            manager,
            feed,
            mut events_rx,
            ..
        } = self;

        if config.ws.connect_on_start {
            manager.connect();
        }

        let stats_reporter = FeedStatsReporter::new();
        let stats_secs = config.telemetry.stats_interval_secs;
        let mut stats_interval = tokio::time::interval(Duration::from_secs(stats_secs.max(1)));
        stats_interval.tick().await;

        info!("Entering main event loop");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(event) = events_rx.recv() => {
                    apply_event(&feed, event);
                }

                _ = stats_interval.tick(), if stats_secs > 0 => {
                    stats_reporter.output_summary();
                }

                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        manager.disconnect();
        cancel.cancel();
        if let Some(handle) = dashboard {
            if let Err(e) = handle.await {
                warn!(?e, "Dashboard task ended abnormally");
            }
        }

        stats_reporter.output_summary();
        info!("Application stopped");
        Ok(())
    }

    fn spawn_dashboard(&self, cancel: CancellationToken) -> Option<tokio::task::JoinHandle<()>> {
        let config = self.config.dashboard.clone();
        if !config.enabled {
            info!("Dashboard disabled");
            return None;
        }

        let control: Arc<dyn StreamControl> = self.monitor.clone();
        let state = DashboardState::new(self.feed.clone(), control);
        Some(tokio::spawn(async move {
            let shutdown = async move { cancel.cancelled().await };
            if let Err(e) = obwatch_dashboard::run_server(state, config, shutdown).await {
                error!(error = %e, "Dashboard server failed");
            }
        }))
    }
}

fn apply_event(feed: &SharedFeedState, event: StreamEvent) {
    let appended = feed.write().apply(event, Utc::now());
    if let Some(event) = appended {
        debug!(
            sequence = event.update.sequence,
            severity = %event.severity,
            "Event appended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obwatch_core::{BookAction, OrderBookUpdate, Price, Side, Size};
    use rust_decimal_macros::dec;

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.ws.connect_on_start = false;
        config.dashboard.enabled = false;
        config.telemetry.stats_interval_secs = 0;
        config
    }

    fn update(sequence: u64) -> OrderBookUpdate {
        OrderBookUpdate {
            market: "Binance".to_string(),
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
            side: Side::Bid,
            action: BookAction::Add,
            sequence,
            price: Price::new(dec!(60000)),
            quantity: Size::new(dec!(20)),
            reported_ns: 0,
            delay_ns: 0,
            exchange_sequence: None,
        }
    }

    #[test]
    fn test_new_rejects_invalid_feed_config() {
        let mut config = offline_config();
        config.feed.event_log_capacity = 0;
        assert!(Application::new(config).is_err());
    }

    #[tokio::test]
    async fn test_events_pumped_into_feed() {
        let mut app = Application::new(offline_config()).unwrap();
        let feed = app.feed();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

        let (events_tx, events_rx) = mpsc::channel(8);
        app.events_rx = events_rx;

        let runner = tokio::spawn(app.run_until(async {
            let _ = done_rx.await;
        }));

        events_tx.send(StreamEvent::Update(update(1))).await.unwrap();
        events_tx.send(StreamEvent::Update(update(2))).await.unwrap();

        let start = tokio::time::Instant::now();
        while feed.read().event_log().len() < 2 {
            assert!(start.elapsed() < Duration::from_secs(5), "events not applied");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        done_tx.send(()).unwrap();
        runner.await.unwrap().unwrap();

        let state = feed.read();
        let seqs: Vec<u64> = state.events().iter().map(|e| e.update.sequence).collect();
        assert_eq!(seqs, vec![2, 1]);
        assert_eq!(state.live_alerts(Utc::now()).big.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_disconnects() {
        let mut config = offline_config();
        config.ws.url = "ws://127.0.0.1:9".to_string();
        let app = Application::new(config).unwrap();
        let manager = app.manager().clone();
        manager.connect();

        app.run_until(async {}).await.unwrap();

        assert_eq!(manager.state(), obwatch_ws::ConnectionState::Disconnected);
        assert!(!manager.is_reconnect_pending());
    }
}
