//! FIFO lot bookkeeping for a single symbol.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Fill, OrderSide};

/// Single acquisition lot. Quantity is signed: positive long, negative
/// short. The sign never changes over the lot's lifetime — closes shrink
/// the quantity toward zero and the lot is removed when it gets there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLot {
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
}

/// Insertion-ordered lots plus cumulative realized P&L for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub lots: Vec<PositionLot>,
    pub realized_pnl: Decimal,
}

impl PositionRecord {
    /// Net signed quantity across all lots, summed in insertion order.
    pub fn net_quantity(&self) -> Decimal {
        self.lots
            .iter()
            .fold(Decimal::ZERO, |acc, lot| acc + lot.quantity)
    }

    /// Quantity-weighted average entry price over current lots; zero when
    /// flat.
    pub fn avg_entry_price(&self) -> Decimal {
        let net = self.net_quantity();
        if net == Decimal::ZERO {
            return Decimal::ZERO;
        }
        let weighted = self
            .lots
            .iter()
            .fold(Decimal::ZERO, |acc, lot| acc + lot.entry_price * lot.quantity);
        weighted / net
    }

    /// Apply a fill FIFO-style and return the realized P&L it contributed.
    ///
    /// Opposing-signed lots are consumed oldest-first; any residual
    /// quantity opens a new lot in the fill's direction.
    pub fn apply_fill(&mut self, fill: &Fill) -> Decimal {
        let closing_long = fill.side == OrderSide::Sell;
        let (remaining, realized) = self.consume_lots(fill.quantity, fill.price, closing_long);
        if remaining > Decimal::ZERO {
            let signed = match fill.side {
                OrderSide::Sell => -remaining,
                OrderSide::Buy => remaining,
            };
            self.lots.push(PositionLot {
                quantity: signed,
                entry_price: fill.price,
                entry_time: fill.timestamp,
            });
        }
        self.realized_pnl += realized;
        realized
    }

    /// Consume lots of the opposing sign in insertion order. Returns the
    /// unconsumed quantity and the realized P&L delta.
    fn consume_lots(
        &mut self,
        quantity: Decimal,
        fill_price: Decimal,
        closing_long: bool,
    ) -> (Decimal, Decimal) {
        let mut remaining = quantity;
        let mut realized = Decimal::ZERO;
        let mut idx = 0;
        while remaining > Decimal::ZERO && idx < self.lots.len() {
            let lot = &mut self.lots[idx];
            let skip = if closing_long {
                lot.quantity <= Decimal::ZERO
            } else {
                lot.quantity >= Decimal::ZERO
            };
            if skip {
                idx += 1;
                continue;
            }

            let close_qty = remaining.min(lot.quantity.abs());
            if closing_long {
                realized += (fill_price - lot.entry_price) * close_qty;
                lot.quantity -= close_qty;
            } else {
                realized += (lot.entry_price - fill_price) * close_qty;
                lot.quantity += close_qty;
            }
            remaining -= close_qty;

            if lot.quantity == Decimal::ZERO {
                self.lots.remove(idx);
            } else {
                idx += 1;
            }
        }
        (remaining, realized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FillId;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn fill(side: OrderSide, quantity: Decimal, price: Decimal) -> Fill {
        Fill {
            fill_id: FillId(0),
            client_order_id: "ord".into(),
            symbol: "AAPL".into(),
            side,
            quantity,
            price,
            commission: Decimal::ZERO,
            slippage: Decimal::ZERO,
            realized_pnl: None,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
            provider: "mock".into(),
            is_partial: false,
        }
    }

    #[test]
    fn buy_opens_long_lot() {
        let mut rec = PositionRecord::default();
        let realized = rec.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(50)));
        assert_eq!(realized, Decimal::ZERO);
        assert_eq!(rec.net_quantity(), dec!(100));
        assert_eq!(rec.avg_entry_price(), dec!(50));
    }

    #[test]
    fn sell_closes_long_fifo_and_realizes() {
        let mut rec = PositionRecord::default();
        rec.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(50)));
        rec.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(60)));

        // Sell 150 at 70: first lot (100 @ 50) fully, second lot 50 @ 60.
        let realized = rec.apply_fill(&fill(OrderSide::Sell, dec!(150), dec!(70)));
        assert_eq!(realized, dec!(100) * dec!(20) + dec!(50) * dec!(10));
        assert_eq!(rec.net_quantity(), dec!(50));
        assert_eq!(rec.lots.len(), 1);
        assert_eq!(rec.lots[0].entry_price, dec!(60));
    }

    #[test]
    fn partial_consumption_keeps_entry_price() {
        let mut rec = PositionRecord::default();
        rec.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(50)));
        rec.apply_fill(&fill(OrderSide::Sell, dec!(30), dec!(55)));
        assert_eq!(rec.net_quantity(), dec!(70));
        assert_eq!(rec.lots[0].entry_price, dec!(50));
        assert_eq!(rec.realized_pnl, dec!(150));
    }

    #[test]
    fn oversell_flips_to_short() {
        let mut rec = PositionRecord::default();
        rec.apply_fill(&fill(OrderSide::Buy, dec!(50), dec!(100)));
        let realized = rec.apply_fill(&fill(OrderSide::Sell, dec!(80), dec!(110)));
        // 50 closed at +10 each, 30 opens short at 110
        assert_eq!(realized, dec!(500));
        assert_eq!(rec.net_quantity(), dec!(-30));
        assert_eq!(rec.lots.len(), 1);
        assert_eq!(rec.lots[0].quantity, dec!(-30));
        assert_eq!(rec.lots[0].entry_price, dec!(110));
    }

    #[test]
    fn buy_covers_short_with_negated_pnl() {
        let mut rec = PositionRecord::default();
        rec.apply_fill(&fill(OrderSide::Sell, dec!(100), dec!(80)));
        let realized = rec.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(70)));
        // short entered at 80, covered at 70: +10 per unit
        assert_eq!(realized, dec!(1000));
        assert_eq!(rec.net_quantity(), Decimal::ZERO);
        assert!(rec.lots.is_empty());
    }

    #[test]
    fn avg_entry_price_zero_when_flat() {
        let mut rec = PositionRecord::default();
        rec.apply_fill(&fill(OrderSide::Buy, dec!(10), dec!(100)));
        rec.apply_fill(&fill(OrderSide::Sell, dec!(10), dec!(105)));
        assert_eq!(rec.avg_entry_price(), Decimal::ZERO);
    }

    #[test]
    fn realized_pnl_accumulates_across_fills() {
        let mut rec = PositionRecord::default();
        rec.apply_fill(&fill(OrderSide::Buy, dec!(10), dec!(100)));
        rec.apply_fill(&fill(OrderSide::Sell, dec!(5), dec!(110)));
        rec.apply_fill(&fill(OrderSide::Sell, dec!(5), dec!(90)));
        assert_eq!(rec.realized_pnl, dec!(50) + dec!(-50));
    }
}
