use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One quote from a batch price request, before it is stamped and stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenQuote {
    pub token_address: String,
    pub usd_price: f64,
    pub usd_price_formatted: String,
    /// Raw 24h change in percent as reported by the feed, if it sent one.
    pub percent_change_24h_raw: Option<f64>,
}

/// Live price for a single token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub usd_price: f64,
    pub usd_price_formatted: String,
}

/// A single persisted price observation. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub token_address: String,
    pub usd_price: f64,
    pub usd_price_formatted: String,
    /// 24h change rounded to the nearest whole percent.
    pub percent_change_24h: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Request to register a target price alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlert {
    pub token_address: String,
    pub target_price: f64,
    pub email: String,
}

/// A user-registered target price alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: String,
    pub token_address: String,
    pub target_price: f64,
    pub email: String,
    pub triggered: bool,
    pub created_at: DateTime<Utc>,
    pub triggered_at: Option<DateTime<Utc>>,
}

impl PriceAlert {
    pub fn state(&self) -> AlertState {
        if self.triggered {
            AlertState::Triggered
        } else {
            AlertState::Pending
        }
    }

    /// Whether a live price satisfies this alert's target.
    pub fn is_reached_by(&self, current_price: f64) -> bool {
        current_price >= self.target_price
    }
}

/// Lifecycle of a target alert. `Triggered` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Pending,
    Triggered,
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertState::Pending => write!(f, "pending"),
            AlertState::Triggered => write!(f, "triggered"),
        }
    }
}

/// A relative move over the trailing window that crossed the alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMovement {
    pub token_address: String,
    pub previous_price: f64,
    pub current_price: f64,
    pub percent_change: f64,
    /// False when the notification for this move could not be delivered.
    pub notified: bool,
}

/// Result of converting an ETH amount into BTC with the flat swap fee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub btc_amount: f64,
    pub eth_fee: f64,
    pub dollar_fee: f64,
}
