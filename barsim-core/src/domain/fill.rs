//! Fill — a completed order execution.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::FillId;
use super::order::OrderSide;

/// Record of an order executing against a bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub fill_id: FillId,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub slippage: Decimal,
    /// Realized P&L contributed by this fill, populated after the fill is
    /// applied to the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub is_partial: bool,
}

impl Fill {
    /// Gross traded value before commission.
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}
