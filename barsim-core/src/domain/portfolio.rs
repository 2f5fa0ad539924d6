//! Immutable portfolio snapshots produced once per bar (and per order,
//! inside a bar, for constraint checks).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single symbol's state inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Net signed quantity: positive long, negative short.
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub realized_pnl: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Signed mark-to-market value (`quantity * current_price`).
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }
}

/// Point-in-time view of the whole account.
///
/// `equity = cash + unsettled_cash + Σ position market value`, everything
/// already converted into the account currency where FX rates were known.
/// Positions iterate in the order they were first opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: Decimal,
    pub unsettled_cash: Decimal,
    pub positions: IndexMap<String, Position>,
    pub realized_pnl: Decimal,
    pub day_trades_remaining: Option<u32>,
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

impl PortfolioState {
    /// Sum of absolute position values — the numerator of gross leverage.
    pub fn gross_exposure(&self) -> Decimal {
        self.positions
            .values()
            .fold(Decimal::ZERO, |acc, p| acc + p.market_value().abs())
    }
}
