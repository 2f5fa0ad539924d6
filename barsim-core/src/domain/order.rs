//! Order requests as they arrive at the simulation boundary.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::SimError;

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The side a contingent exit order takes relative to this entry.
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Core order type taxonomy. Prices live on the request itself;
/// `OrderRequest::validate` enforces which prices each type requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

/// Time-in-force policy.
///
/// DAY orders expire at the close of the first bar they were eligible on
/// without filling; the other policies persist across bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
}

/// An order as submitted by upstream strategy code. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub timestamp: DateTime<Utc>,
    /// Opaque key→value annotations. Recognized keys: `stop_loss_price`,
    /// `take_profit_price` (bracket generation), `locate_available` /
    /// `locate_borrowed` (short locate).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl OrderRequest {
    /// Check the structural invariants: positive quantity and the price
    /// fields each order type requires.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.quantity <= Decimal::ZERO {
            return Err(self.invalid("quantity must be positive"));
        }
        match self.order_type {
            OrderType::Limit if self.limit_price.is_none() => {
                Err(self.invalid("limit order requires limit_price"))
            }
            OrderType::Stop if self.stop_price.is_none() => {
                Err(self.invalid("stop order requires stop_price"))
            }
            OrderType::StopLimit if self.limit_price.is_none() || self.stop_price.is_none() => {
                Err(self.invalid("stop-limit order requires both stop_price and limit_price"))
            }
            _ => Ok(()),
        }
    }

    fn invalid(&self, reason: &str) -> SimError {
        SimError::InvalidOrder {
            id: self.client_order_id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Read a decimal-valued metadata entry. Accepts JSON strings (exact)
    /// and JSON numbers (parsed via their display form).
    pub fn metadata_decimal(&self, key: &str) -> Option<Decimal> {
        match self.metadata.get(key)? {
            serde_json::Value::String(s) => Decimal::from_str(s).ok(),
            v @ serde_json::Value::Number(_) => Decimal::from_str(&v.to_string()).ok(),
            _ => None,
        }
    }

    /// Read a boolean-valued metadata entry; absent or non-boolean is false.
    pub fn metadata_flag(&self, key: &str) -> bool {
        matches!(self.metadata.get(key), Some(serde_json::Value::Bool(true)))
    }
}
