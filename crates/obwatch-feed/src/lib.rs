//! Consumer-side state for the order-book feed.
//!
//! Accepted updates are classified and kept in a bounded, newest-first event
//! log. Alerting events additionally land in one of three 60-second windows.

pub mod alert_window;
pub mod error;
pub mod event_log;
pub mod state;

pub use alert_window::{AlertBook, AlertWindow, AlertsSnapshot};
pub use error::{FeedError, FeedResult};
pub use event_log::EventLog;
pub use state::{FeedConfig, FeedState, SharedFeedState};
