//! Pure order-vs-bar matching.
//!
//! `match_order` sees one order and one bar — no account state, no
//! history. Pricing rules favor the order on gaps: a limit buy that gaps
//! down fills at the open, a stop buy that gaps up fills at the open.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{Bar, Fill, FillId, OrderRequest, OrderSide, OrderType};

/// Per-match inputs computed by the caller: price adjustments, the fill id
/// to assign, and provenance fields.
#[derive(Debug, Clone)]
pub struct MatchParams<'a> {
    pub slippage: Decimal,
    pub commission: Decimal,
    pub provider: &'a str,
    pub timestamp: DateTime<Utc>,
    pub fill_id: FillId,
}

/// Match a single order against a bar. Returns `None` when the bar never
/// reaches the order's trigger or limit.
pub fn match_order(order: &OrderRequest, bar: &Bar, params: MatchParams<'_>) -> Option<Fill> {
    let fill = |price: Decimal| Fill {
        fill_id: params.fill_id,
        client_order_id: order.client_order_id.clone(),
        symbol: order.symbol.clone(),
        side: order.side,
        quantity: order.quantity,
        price,
        commission: params.commission,
        slippage: params.slippage,
        realized_pnl: None,
        timestamp: params.timestamp,
        provider: params.provider.to_string(),
        is_partial: false,
    };

    // Stop-limit: the stop must trigger on this bar, after which the limit
    // rule applies to the same bar. A triggered stop whose limit is out of
    // reach does not fill.
    let effective_type = match order.order_type {
        OrderType::StopLimit => {
            let stop = order.stop_price?;
            let triggered = match order.side {
                OrderSide::Buy => bar.high >= stop,
                OrderSide::Sell => bar.low <= stop,
            };
            if !triggered {
                return None;
            }
            OrderType::Limit
        }
        other => other,
    };

    match effective_type {
        OrderType::Market => match order.side {
            OrderSide::Buy => Some(fill(bar.open + params.slippage)),
            OrderSide::Sell => Some(fill(bar.open - params.slippage)),
        },
        OrderType::Limit => {
            let limit = order.limit_price?;
            match order.side {
                OrderSide::Buy => {
                    // Reachable when the bar trades at or below the limit;
                    // a gap-down open is better than the limit itself.
                    if bar.low <= limit {
                        Some(fill(bar.open.min(limit)))
                    } else {
                        None
                    }
                }
                OrderSide::Sell => {
                    if bar.high >= limit {
                        Some(fill(bar.open.max(limit)))
                    } else {
                        None
                    }
                }
            }
        }
        OrderType::Stop => {
            let stop = order.stop_price?;
            match order.side {
                OrderSide::Buy => {
                    if bar.high >= stop {
                        Some(fill(stop.max(bar.open) + params.slippage))
                    } else {
                        None
                    }
                }
                OrderSide::Sell => {
                    if bar.low <= stop {
                        Some(fill(stop.min(bar.open) - params.slippage))
                    } else {
                        None
                    }
                }
            }
        }
        OrderType::StopLimit => unreachable!("stop-limit reduced to limit above"),
    }
}
