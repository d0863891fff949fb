//! Inbound frame decoding.
//!
//! Every text frame carries a `TYPE` discriminant. Order-book frames use the
//! upper-case field names of the streamer (`M`, `FSYM`, `CCSEQ`, `P`, `Q`, ...).

use crate::error::{WsError, WsResult};
use obwatch_core::{BookAction, OrderBookUpdate, Price, Side, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

// ============================================================================
// Raw frame (wire format)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "TYPE", deserialize_with = "de_type_code")]
    kind: String,
    #[serde(rename = "M")]
    market: Option<String>,
    #[serde(rename = "FSYM")]
    base: Option<String>,
    #[serde(rename = "TSYM")]
    quote: Option<String>,
    #[serde(rename = "SIDE")]
    side: Option<u8>,
    #[serde(rename = "ACTION")]
    action: Option<u8>,
    #[serde(rename = "CCSEQ")]
    sequence: Option<u64>,
    #[serde(rename = "P")]
    price: Option<Decimal>,
    #[serde(rename = "Q")]
    quantity: Option<Decimal>,
    #[serde(rename = "REPORTEDNS", default)]
    reported_ns: u64,
    #[serde(rename = "DELAYNS", default)]
    delay_ns: i64,
    #[serde(rename = "SEQ")]
    exchange_sequence: Option<u64>,
    #[serde(rename = "MESSAGE")]
    message: Option<String>,
    #[serde(rename = "INFO")]
    info: Option<String>,
}

/// `TYPE` is sent as a string ("8") but numeric codes are accepted too.
fn de_type_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid TYPE value: {other}"
        ))),
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> WsResult<T> {
    value.ok_or_else(|| WsError::Decode(format!("missing field {field}")))
}

impl RawFrame {
    fn into_update(self) -> WsResult<OrderBookUpdate> {
        let side = Side::from_code(required(self.side, "SIDE")?)
            .map_err(|e| WsError::Decode(e.to_string()))?;
        let action = BookAction::from_code(required(self.action, "ACTION")?)
            .map_err(|e| WsError::Decode(e.to_string()))?;

        Ok(OrderBookUpdate {
            market: required(self.market, "M")?,
            base: required(self.base, "FSYM")?,
            quote: required(self.quote, "TSYM")?,
            side,
            action,
            sequence: required(self.sequence, "CCSEQ")?,
            price: Price::new(required(self.price, "P")?),
            quantity: Size::new(required(self.quantity, "Q")?),
            reported_ns: self.reported_ns,
            delay_ns: self.delay_ns,
            exchange_sequence: self.exchange_sequence,
        })
    }

    fn notice(self) -> ServerNotice {
        ServerNotice {
            message: self.message,
            info: self.info,
        }
    }
}

// ============================================================================
// Typed messages
// ============================================================================

/// Text attached to server error and client rejection frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerNotice {
    pub message: Option<String>,
    pub info: Option<String>,
}

impl ServerNotice {
    /// Single-line description for logs and rejection records.
    pub fn describe(&self) -> String {
        match (&self.message, &self.info) {
            (Some(m), Some(i)) => format!("{m}: {i}"),
            (Some(m), None) => m.clone(),
            (None, Some(i)) => i.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// TYPE 3: initial load of the subscription finished.
    LoadComplete,
    /// TYPE 8: incremental order-book update.
    Update(OrderBookUpdate),
    /// TYPE 9: full snapshot; only the sequence matters here.
    Snapshot { sequence: u64 },
    /// TYPE 16.
    SubscribeComplete,
    /// TYPE 17.
    UnsubscribeComplete,
    /// TYPE 18.
    UnsubscribeAllComplete,
    /// TYPE 20.
    Welcome,
    /// TYPE 401.
    Unauthorized(ServerNotice),
    /// TYPE 429.
    RateLimited(ServerNotice),
    /// TYPE 500.
    ServerError(ServerNotice),
    /// TYPE 999.
    Heartbeat,
    /// Any other TYPE.
    Unknown(String),
}

impl InboundMessage {
    /// Decode a text frame.
    ///
    /// Malformed JSON, a missing `TYPE`, or an update/snapshot without its
    /// required fields yields `WsError::Decode`.
    pub fn parse(text: &str) -> WsResult<Self> {
        let raw: RawFrame =
            serde_json::from_str(text).map_err(|e| WsError::Decode(e.to_string()))?;

        let message = match raw.kind.as_str() {
            "3" => Self::LoadComplete,
            "8" => Self::Update(raw.into_update()?),
            "9" => Self::Snapshot {
                sequence: required(raw.sequence, "CCSEQ")?,
            },
            "16" => Self::SubscribeComplete,
            "17" => Self::UnsubscribeComplete,
            "18" => Self::UnsubscribeAllComplete,
            "20" => Self::Welcome,
            "401" => Self::Unauthorized(raw.notice()),
            "429" => Self::RateLimited(raw.notice()),
            "500" => Self::ServerError(raw.notice()),
            "999" => Self::Heartbeat,
            _ => Self::Unknown(raw.kind),
        };

        Ok(message)
    }

    /// Metric label for this message kind.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::LoadComplete => "load_complete",
            Self::Update(_) => "update",
            Self::Snapshot { .. } => "snapshot",
            Self::SubscribeComplete => "subscribe_complete",
            Self::UnsubscribeComplete => "unsubscribe_complete",
            Self::UnsubscribeAllComplete => "unsubscribe_all_complete",
            Self::Welcome => "welcome",
            Self::Unauthorized(_) => "unauthorized",
            Self::RateLimited(_) => "rate_limited",
            Self::ServerError(_) => "server_error",
            Self::Heartbeat => "heartbeat",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Event forwarded to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An update that passed the sequence check.
    Update(OrderBookUpdate),
    /// The transport failed; the consumer drops its event log.
    Reset,
}
