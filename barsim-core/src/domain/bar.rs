//! Bar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// OHLCV bar for a single symbol over one interval.
///
/// All price and volume fields are exact decimals; nothing on this type
/// ever touches floating point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Bid-ask spread, when the feed provides one. Spread-based slippage
    /// falls back to `high - low` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread: Option<Decimal>,
}

impl Bar {
    /// Midpoint of the bar's range, used as the reference price for
    /// bps-denominated slippage.
    pub fn midrange(&self) -> Decimal {
        (self.high + self.low) / Decimal::TWO
    }

    /// OHLCV sanity check: `low <= open,close <= high` and `volume >= 0`.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.high < self.low {
            return Err(SimError::InvalidBar {
                symbol: self.symbol.clone(),
                reason: format!("high {} below low {}", self.high, self.low),
            });
        }
        if self.open < self.low || self.open > self.high {
            return Err(SimError::InvalidBar {
                symbol: self.symbol.clone(),
                reason: format!("open {} outside [{}, {}]", self.open, self.low, self.high),
            });
        }
        if self.close < self.low || self.close > self.high {
            return Err(SimError::InvalidBar {
                symbol: self.symbol.clone(),
                reason: format!("close {} outside [{}, {}]", self.close, self.low, self.high),
            });
        }
        if self.volume < Decimal::ZERO {
            return Err(SimError::InvalidBar {
                symbol: self.symbol.clone(),
                reason: format!("negative volume {}", self.volume),
            });
        }
        Ok(())
    }
}
