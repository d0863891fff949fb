//! Subscription descriptor and acknowledgement tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order-book channel type on the streamer.
const ORDER_BOOK_CHANNEL: u16 = 8;

/// The single order-book stream to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTarget {
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_base")]
    pub base: String,
    #[serde(default = "default_quote")]
    pub quote: String,
}

fn default_exchange() -> String {
    "Binance".to_string()
}

fn default_base() -> String {
    "BTC".to_string()
}

fn default_quote() -> String {
    "USDT".to_string()
}

impl Default for SubscriptionTarget {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            base: default_base(),
            quote: default_quote(),
        }
    }
}

impl SubscriptionTarget {
    /// Channel descriptor, e.g. `8~Binance~BTC~USDT`.
    pub fn channel(&self) -> String {
        format!(
            "{}~{}~{}~{}",
            ORDER_BOOK_CHANNEL, self.exchange, self.base, self.quote
        )
    }
}

/// Outbound subscription request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRequest {
    pub action: &'static str,
    pub subs: Vec<String>,
}

impl SubscriptionRequest {
    pub fn sub_add(target: &SubscriptionTarget) -> Self {
        Self {
            action: "SubAdd",
            subs: vec![target.channel()],
        }
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Acknowledgement state of the current session's subscription.
///
/// Reset at the start of every session and on disconnect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatus {
    /// SubscribeComplete received.
    pub subscribed: bool,
    /// LoadComplete received.
    pub loaded: bool,
    pub subscribed_at: Option<DateTime<Utc>>,
}

impl SubscriptionStatus {
    pub fn mark_subscribed(&mut self, now: DateTime<Utc>) {
        self.subscribed = true;
        self.subscribed_at = Some(now);
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_ready(&self) -> bool {
        self.subscribed && self.loaded
    }
}
