//! Core domain types for the obwatch order-book monitor.
//!
//! This crate provides the types shared by the transport, feed and dashboard:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `OrderBookUpdate`, `OrderBookEvent`: Accepted feed updates and their classified form
//! - `Severity`, `AlertRecord`: Alert buckets and the records stored in them
//! - `AlertClassifier`: Pure (price, quantity) -> severity mapping

pub mod classifier;
pub mod decimal;
pub mod error;
pub mod types;

pub use classifier::{AlertClassifier, ClassifierThresholds};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use types::{
    AlertRecord, BookAction, OrderBookEvent, OrderBookUpdate, Severity, Side, Visibility,
};
