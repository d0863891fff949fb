//! Order-book stream monitor.
//!
//! Wires the components together:
//! - WebSocket connection to the streamer with sequence checking
//! - Classification into the event log and alert windows
//! - Visibility-driven connect/disconnect
//! - Dashboard read and control surface

pub mod app;
pub mod config;
pub mod error;
pub mod visibility;

pub use app::Application;
pub use config::{AppConfig, ConfigSource};
pub use error::{AppError, AppResult};
pub use visibility::VisibilityMonitor;
