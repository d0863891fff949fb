//! obwatch-dashboard - HTTP read and control surface for the feed.
//!
//! - REST API for the snapshot, event log and alert windows
//! - Control endpoints (connect, disconnect, send, auto-reconnect, visibility)
//! - WebSocket broadcast of periodic updates
//! - Prometheus text exposition at `/metrics`
//!
//! No HTML is served; any client renders the JSON itself.
//!
//! # Usage
//!
//! ```ignore
//! use obwatch_dashboard::{run_server, DashboardConfig, DashboardState};
//!
//! let dashboard_state = DashboardState::new(feed.clone(), control.clone());
//! tokio::spawn(async move {
//!     if let Err(e) = run_server(dashboard_state, DashboardConfig::default(), shutdown).await {
//!         tracing::error!(error = %e, "Dashboard server failed");
//!     }
//! });
//! ```

mod broadcast;
mod config;
mod control;
mod server;
mod state;
mod types;

pub use config::DashboardConfig;
pub use control::StreamControl;
pub use server::{create_router, run_server, AppState};
pub use state::DashboardState;
pub use types::{
    AutoReconnectRequest, ControlResponse, DashboardMessage, DashboardSnapshot, VisibilityRequest,
};
