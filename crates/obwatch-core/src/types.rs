//! Order-book feed data types.
//!
//! Contains the accepted update as decoded from the feed, the classified
//! event kept in the event log, and the alert records kept per severity.

use crate::error::{CoreError, Result};
use crate::{Price, Size};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order-book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Decode the wire code (0 = bid, 1 = ask).
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Bid),
            1 => Ok(Self::Ask),
            other => Err(CoreError::InvalidSide(other)),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Bid => 0,
            Self::Ask => 1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

/// Action to apply to the book level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookAction {
    Add,
    Remove,
    NoAction,
    Change,
}

impl BookAction {
    /// Decode the wire code (1 add, 2 remove, 3 no-action, 4 change).
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Add),
            2 => Ok(Self::Remove),
            3 => Ok(Self::NoAction),
            4 => Ok(Self::Change),
            other => Err(CoreError::InvalidAction(other)),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Add => 1,
            Self::Remove => 2,
            Self::NoAction => 3,
            Self::Change => 4,
        }
    }
}

impl std::fmt::Display for BookAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
            Self::NoAction => write!(f, "no_action"),
            Self::Change => write!(f, "change"),
        }
    }
}

/// Alert bucket assigned to every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Cheap,
    Solid,
    Big,
}

impl Severity {
    pub fn is_alert(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cheap => "cheap",
            Self::Solid => "solid",
            Self::Big => "big",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consumer visibility signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Foreground,
    Background,
}

/// Order-book update accepted from the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookUpdate {
    /// Exchange name (e.g., "Binance").
    pub market: String,
    /// Base asset symbol (e.g., "BTC").
    pub base: String,
    /// Quote asset symbol (e.g., "USDT").
    pub quote: String,
    pub side: Side,
    pub action: BookAction,
    /// Feed-internal sequence counter.
    pub sequence: u64,
    pub price: Price,
    pub quantity: Size,
    /// Exchange reported timestamp in nanoseconds.
    pub reported_ns: u64,
    /// Publish delay relative to `reported_ns`, in nanoseconds. May be negative
    /// when the venue clock runs ahead.
    pub delay_ns: i64,
    /// Exchange sequence, when the venue provides one.
    pub exchange_sequence: Option<u64>,
}

/// Classified order-book event.
///
/// The wrapped update is kept verbatim; classification only adds `severity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookEvent {
    #[serde(flatten)]
    pub update: OrderBookUpdate,
    pub severity: Severity,
}

impl OrderBookEvent {
    pub fn new(update: OrderBookUpdate, severity: Severity) -> Self {
        Self { update, severity }
    }

    /// Alert record for this event, if it falls into an alert bucket.
    pub fn alert(&self, created_at: DateTime<Utc>) -> Option<AlertRecord> {
        self.severity.is_alert().then(|| {
            AlertRecord::new(
                self.severity,
                self.update.price,
                self.update.quantity,
                created_at,
            )
        })
    }
}

/// Alert kept in a severity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub severity: Severity,
    pub price: Price,
    pub quantity: Size,
    /// price * quantity.
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(severity: Severity, price: Price, quantity: Size, created_at: DateTime<Utc>) -> Self {
        Self {
            severity,
            price,
            quantity,
            total: quantity.notional(price),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_update() -> OrderBookUpdate {
        OrderBookUpdate {
            market: "Binance".to_string(),
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
            side: Side::Ask,
            action: BookAction::Change,
            sequence: 101,
            price: Price::new(dec!(64000.5)),
            quantity: Size::new(dec!(2)),
            reported_ns: 1_700_000_000_000_000_000,
            delay_ns: 1_500_000,
            exchange_sequence: Some(42),
        }
    }

    #[test]
    fn test_side_codes() {
        assert_eq!(Side::from_code(0).unwrap(), Side::Bid);
        assert_eq!(Side::from_code(1).unwrap(), Side::Ask);
        assert!(matches!(Side::from_code(2), Err(CoreError::InvalidSide(2))));
        assert_eq!(Side::Ask.code(), 1);
    }

    #[test]
    fn test_action_codes() {
        assert_eq!(BookAction::from_code(1).unwrap(), BookAction::Add);
        assert_eq!(BookAction::from_code(4).unwrap(), BookAction::Change);
        assert!(matches!(
            BookAction::from_code(0),
            Err(CoreError::InvalidAction(0))
        ));
        assert_eq!(BookAction::NoAction.code(), 3);
    }

    #[test]
    fn test_visibility_wire_names() {
        let v: Visibility = serde_json::from_str(r#""background""#).unwrap();
        assert_eq!(v, Visibility::Background);
        assert_eq!(
            serde_json::to_string(&Visibility::Foreground).unwrap(),
            r#""foreground""#
        );
    }

    #[test]
    fn test_event_alert_only_for_alerting_severity() {
        let now = Utc::now();
        let quiet = OrderBookEvent::new(sample_update(), Severity::None);
        assert!(quiet.alert(now).is_none());

        let solid = OrderBookEvent::new(sample_update(), Severity::Solid);
        let alert = solid.alert(now).unwrap();
        assert_eq!(alert.severity, Severity::Solid);
        assert_eq!(alert.total, dec!(128001.0));
        assert_eq!(alert.created_at, now);
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = OrderBookEvent::new(sample_update(), Severity::Big);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["sequence"], 101);
        assert_eq!(json["side"], "ask");
        assert_eq!(json["action"], "change");
        assert_eq!(json["severity"], "big");
    }
}
