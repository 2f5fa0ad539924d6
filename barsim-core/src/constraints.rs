//! Per-order constraint checks.
//!
//! Every check returns `Err(ConstraintViolation)` with a human-readable
//! reason; the simulator records the reason and moves on to the next
//! order. Checks that only guard exposure increases pass sells through.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{OrderRequest, OrderSide, PortfolioState};

/// Soft, per-order rejection. The message is what lands in the rejection
/// record, so it carries the numbers a user needs to diagnose the refusal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintViolation {
    #[error("insufficient buying power: order value {order_value} exceeds available {available}")]
    BuyingPower {
        order_value: Decimal,
        available: Decimal,
    },

    #[error("margin requirement {required} exceeds equity {equity}")]
    Margin { required: Decimal, equity: Decimal },

    #[error("position limit exceeded: order value {order_value} > {max_value}")]
    PositionLimit {
        order_value: Decimal,
        max_value: Decimal,
    },

    #[error("cannot trade with non-positive equity")]
    NonPositiveEquity,

    #[error("gross leverage exceeded: projected exposure {projected} > cap {cap} ({max_leverage}x)")]
    GrossLeverage {
        projected: Decimal,
        cap: Decimal,
        max_leverage: Decimal,
    },

    #[error("shorting not permitted for this provider")]
    ShortNotPermitted,

    #[error("locate required for short selling")]
    LocateRequired,

    #[error("PDT limit exceeded")]
    PdtLimit,

    #[error("kill switch engaged; exposure-increasing orders blocked")]
    KillSwitch,
}

/// Buys only: order value at mark must fit within cash + unsettled cash.
pub fn check_buying_power(
    order: &OrderRequest,
    portfolio: &PortfolioState,
    mark_price: Decimal,
) -> Result<(), ConstraintViolation> {
    if order.side == OrderSide::Sell {
        return Ok(());
    }
    let order_value = order.quantity * mark_price;
    let available = portfolio.cash + portfolio.unsettled_cash;
    if order_value > available {
        return Err(ConstraintViolation::BuyingPower {
            order_value,
            available,
        });
    }
    Ok(())
}

/// Buys only: `order value * initial margin rate` must not exceed equity.
pub fn check_margin(
    order: &OrderRequest,
    portfolio: &PortfolioState,
    mark_price: Decimal,
    initial_margin_rate: Decimal,
) -> Result<(), ConstraintViolation> {
    if order.side == OrderSide::Sell {
        return Ok(());
    }
    let required = order.quantity * mark_price * initial_margin_rate;
    if required > portfolio.equity {
        return Err(ConstraintViolation::Margin {
            required,
            equity: portfolio.equity,
        });
    }
    Ok(())
}

/// Buys only: a single order may not commit more than `max_position_pct`
/// of equity. Non-positive equity is itself a rejection.
pub fn check_position_limit(
    order: &OrderRequest,
    portfolio: &PortfolioState,
    max_position_pct: Decimal,
    mark_price: Decimal,
) -> Result<(), ConstraintViolation> {
    if order.side == OrderSide::Sell {
        return Ok(());
    }
    if portfolio.equity <= Decimal::ZERO {
        return Err(ConstraintViolation::NonPositiveEquity);
    }
    let order_value = order.quantity * mark_price;
    let max_value = max_position_pct * portfolio.equity;
    if order_value > max_value {
        return Err(ConstraintViolation::PositionLimit {
            order_value,
            max_value,
        });
    }
    Ok(())
}

/// Both sides: existing gross exposure plus the order's value must stay
/// within `max_gross_leverage * equity`.
///
/// The order value is added for sells as well, which over-counts a
/// closing sell — the projection treats every order as new exposure.
pub fn check_gross_leverage(
    order: &OrderRequest,
    portfolio: &PortfolioState,
    mark_price: Decimal,
    max_gross_leverage: Decimal,
) -> Result<(), ConstraintViolation> {
    if portfolio.equity <= Decimal::ZERO {
        return Err(ConstraintViolation::NonPositiveEquity);
    }
    let projected = portfolio.gross_exposure() + order.quantity * mark_price;
    let cap = max_gross_leverage * portfolio.equity;
    if projected > cap {
        return Err(ConstraintViolation::GrossLeverage {
            projected,
            cap,
            max_leverage: max_gross_leverage,
        });
    }
    Ok(())
}

/// Shorting policy: with shorts disabled, a sell may reduce to flat but
/// never drive the position negative. With shorts enabled and a locate
/// requirement, a short-creating sell must carry a positive locate flag.
pub fn check_short_permission(
    order: &OrderRequest,
    portfolio: &PortfolioState,
    short_enabled: bool,
    locate_required: bool,
) -> Result<(), ConstraintViolation> {
    if order.side == OrderSide::Buy {
        return Ok(());
    }
    let pre_qty = portfolio
        .positions
        .get(&order.symbol)
        .map(|p| p.quantity)
        .unwrap_or(Decimal::ZERO);
    let would_be_short = pre_qty - order.quantity < Decimal::ZERO;

    if short_enabled {
        if locate_required && would_be_short {
            let locate_ok =
                order.metadata_flag("locate_available") || order.metadata_flag("locate_borrowed");
            if !locate_ok {
                return Err(ConstraintViolation::LocateRequired);
            }
        }
        return Ok(());
    }
    if order.quantity > pre_qty {
        return Err(ConstraintViolation::ShortNotPermitted);
    }
    Ok(())
}

/// Pattern-day-trader gate: a same-day closing round-trip needs a
/// remaining day trade. `None` means PDT tracking is off.
pub fn check_pdt(
    portfolio: &PortfolioState,
    is_day_trade: bool,
) -> Result<(), ConstraintViolation> {
    match portfolio.day_trades_remaining {
        Some(remaining) if is_day_trade && remaining == 0 => Err(ConstraintViolation::PdtLimit),
        _ => Ok(()),
    }
}

/// Kill-switch: blocks exposure-increasing (buy) orders while engaged;
/// sells continue so positions can be unwound.
pub fn check_kill_switch(
    kill_switch_engaged: bool,
    order: &OrderRequest,
) -> Result<(), ConstraintViolation> {
    if kill_switch_engaged && order.side == OrderSide::Buy {
        return Err(ConstraintViolation::KillSwitch);
    }
    Ok(())
}
