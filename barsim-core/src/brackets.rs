//! Bracket (OCO) order management.
//!
//! A fill whose parent order carries `stop_loss_price` / `take_profit_price`
//! metadata spawns contingent exit orders of the opposite side. Each bar,
//! active brackets are checked against the high/low; when both legs could
//! trigger inside one bar the stop-loss wins (adverse path) and the other
//! leg is discarded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderRequest, OrderSide, OrderType};

/// Which bracket leg fired on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketTrigger {
    StopLoss,
    TakeProfit,
}

/// Active bracket legs for one parent order. Destroyed when either leg
/// triggers; retained otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketState {
    pub parent_id: String,
    pub stop_loss: Option<OrderRequest>,
    pub take_profit: Option<OrderRequest>,
}

impl BracketState {
    pub fn is_empty(&self) -> bool {
        self.stop_loss.is_none() && self.take_profit.is_none()
    }

    /// The order for a trigger decided by [`process_brackets`].
    pub fn leg(&self, trigger: BracketTrigger) -> Option<&OrderRequest> {
        match trigger {
            BracketTrigger::StopLoss => self.stop_loss.as_ref(),
            BracketTrigger::TakeProfit => self.take_profit.as_ref(),
        }
    }
}

/// Build contingent exit orders from the entry's metadata. Children share
/// the parent's symbol, quantity, TIF, and timestamp; ids derive from the
/// parent id so replays stay deterministic.
pub fn create_brackets(entry_order: &OrderRequest) -> BracketState {
    let exit_side = entry_order.side.opposite();

    let stop_loss = entry_order.metadata_decimal("stop_loss_price").map(|price| OrderRequest {
        client_order_id: format!("{}-sl", entry_order.client_order_id),
        symbol: entry_order.symbol.clone(),
        side: exit_side,
        order_type: OrderType::Stop,
        quantity: entry_order.quantity,
        limit_price: None,
        stop_price: Some(price),
        time_in_force: entry_order.time_in_force,
        timestamp: entry_order.timestamp,
        metadata: Default::default(),
    });

    let take_profit = entry_order.metadata_decimal("take_profit_price").map(|price| OrderRequest {
        client_order_id: format!("{}-tp", entry_order.client_order_id),
        symbol: entry_order.symbol.clone(),
        side: exit_side,
        order_type: OrderType::Limit,
        quantity: entry_order.quantity,
        limit_price: Some(price),
        stop_price: None,
        time_in_force: entry_order.time_in_force,
        timestamp: entry_order.timestamp,
        metadata: Default::default(),
    });

    BracketState {
        parent_id: entry_order.client_order_id.clone(),
        stop_loss,
        take_profit,
    }
}

/// Decide which leg (if any) triggers on a bar's high/low.
///
/// Both reachable → stop-loss wins (pessimistic adverse-path rule).
pub fn process_brackets(
    bracket: &BracketState,
    bar_high: Decimal,
    bar_low: Decimal,
) -> Option<BracketTrigger> {
    let sl_trigger = bracket.stop_loss.as_ref().is_some_and(|sl| match sl.side {
        OrderSide::Sell => sl.stop_price.is_some_and(|stop| bar_low <= stop),
        OrderSide::Buy => sl.stop_price.is_some_and(|stop| bar_high >= stop),
    });
    let tp_trigger = bracket.take_profit.as_ref().is_some_and(|tp| match tp.side {
        OrderSide::Sell => tp.limit_price.is_some_and(|limit| bar_high >= limit),
        OrderSide::Buy => tp.limit_price.is_some_and(|limit| bar_low <= limit),
    });

    if sl_trigger {
        Some(BracketTrigger::StopLoss)
    } else if tp_trigger {
        Some(BracketTrigger::TakeProfit)
    } else {
        None
    }
}
