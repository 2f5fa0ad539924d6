//! Slippage models: additive price offsets.
//!
//! Each model yields an offset in price units; the matcher applies it in
//! the adverse direction for the order's side. Models that need randomness
//! draw from the injected engine RNG so replays stay deterministic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, OrderRequest};
use crate::rng::SimRng;

/// Slippage schedule attached to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlippageModel {
    /// Scales with order participation against bar volume. `jitter_bps`
    /// adds a uniform random component of up to ±jitter_bps.
    VolumeWeighted {
        base_bps: Decimal,
        volume_impact: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        jitter_bps: Option<Decimal>,
    },

    /// Fixed adverse selection in basis points (payment-for-order-flow
    /// style fills).
    Pfof { adverse_bps: Decimal },

    /// Half the quoted bid-ask spread, falling back to the bar's full
    /// range when no spread is provided.
    SpreadBased,
}

impl SlippageModel {
    /// Price offset for executing `order` against `bar`.
    pub fn calculate(&self, order: &OrderRequest, bar: &Bar, rng: &mut SimRng) -> Decimal {
        match self {
            SlippageModel::VolumeWeighted {
                base_bps,
                volume_impact,
                jitter_bps,
            } => {
                let participation = if bar.volume > Decimal::ZERO {
                    (order.quantity / bar.volume).min(Decimal::ONE)
                } else {
                    Decimal::ZERO
                };
                let mut slip_bps = *base_bps + *volume_impact * participation;
                if let Some(jitter) = jitter_bps {
                    slip_bps += *jitter * rng.signed_unit();
                }
                bar.midrange() * slip_bps / dec!(10000)
            }
            SlippageModel::Pfof { adverse_bps } => bar.midrange() * *adverse_bps / dec!(10000),
            SlippageModel::SpreadBased => match bar.spread {
                Some(spread) => spread / Decimal::TWO,
                None => bar.high - bar.low,
            },
        }
    }
}
