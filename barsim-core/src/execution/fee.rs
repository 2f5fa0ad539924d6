//! Commission models.
//!
//! One model per provider, selected by configuration and dispatched once
//! per order — a closed enum rather than trait objects in the hot loop.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::OrderRequest;

/// Commission schedule attached to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeModel {
    /// Commission-free.
    ZeroCommission,

    /// Maker/taker fees in basis points of notional.
    TieredMakerTaker { maker_bps: Decimal, taker_bps: Decimal },

    /// Per-share commission with an optional per-order minimum.
    PerShare {
        per_share: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_per_order: Option<Decimal>,
    },
}

impl FeeModel {
    /// Commission for filling `order` at `fill_price`.
    pub fn calculate(&self, order: &OrderRequest, fill_price: Decimal, is_maker: bool) -> Decimal {
        match self {
            FeeModel::ZeroCommission => Decimal::ZERO,
            FeeModel::TieredMakerTaker { maker_bps, taker_bps } => {
                let notional = order.quantity * fill_price;
                let bps = if is_maker { *maker_bps } else { *taker_bps };
                notional * bps / dec!(10000)
            }
            FeeModel::PerShare { per_share, min_per_order } => {
                let commission = *per_share * order.quantity;
                match min_per_order {
                    Some(min) => commission.max(*min),
                    None => commission,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderSide, OrderType, TimeInForce};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn order(quantity: Decimal) -> OrderRequest {
        OrderRequest {
            client_order_id: "ord-1".into(),
            symbol: "AAPL".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn zero_commission() {
        let model = FeeModel::ZeroCommission;
        assert_eq!(model.calculate(&order(dec!(100)), dec!(50), false), Decimal::ZERO);
    }

    #[test]
    fn maker_taker_bps_of_notional() {
        let model = FeeModel::TieredMakerTaker {
            maker_bps: dec!(1),
            taker_bps: dec!(5),
        };
        let o = order(dec!(100));
        // notional 10_000: maker 1bp = 1, taker 5bp = 5
        assert_eq!(model.calculate(&o, dec!(100), true), dec!(1));
        assert_eq!(model.calculate(&o, dec!(100), false), dec!(5));
    }

    #[test]
    fn per_share_with_minimum() {
        let model = FeeModel::PerShare {
            per_share: dec!(0.005),
            min_per_order: Some(dec!(1)),
        };
        // 100 shares * 0.005 = 0.50, below the minimum
        assert_eq!(model.calculate(&order(dec!(100)), dec!(50), false), dec!(1));
        // 1000 shares * 0.005 = 5.00, above the minimum
        assert_eq!(model.calculate(&order(dec!(1000)), dec!(50), false), dec!(5.000));
    }

    #[test]
    fn per_share_without_minimum() {
        let model = FeeModel::PerShare {
            per_share: dec!(0.01),
            min_per_order: None,
        };
        assert_eq!(model.calculate(&order(dec!(100)), dec!(50), false), dec!(1.00));
    }

    #[test]
    fn fee_model_serde_roundtrip() {
        let model = FeeModel::TieredMakerTaker {
            maker_bps: dec!(1),
            taker_bps: dec!(5),
        };
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("TIERED_MAKER_TAKER"));
        let deser: FeeModel = serde_json::from_str(&json).unwrap();
        assert_eq!(model, deser);
    }
}
