//! Prometheus metrics and structured logging for obwatch.
//!
//! Provides:
//! - Prometheus metrics for connection state, feed continuity and alerts
//! - Structured logging with tracing (JSON in production)
//! - Periodic feed statistics summary

pub mod error;
pub mod logging;
pub mod metrics;
pub mod stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use stats::{FeedStats, FeedStatsReporter};
