//! Financing arithmetic: overnight swaps and short borrow.
//!
//! Swap rolls at 17:00 America/New_York (DST-aware). Wednesday carries the
//! 3x multiplier per FX convention, covering the weekend's value dates.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Daily financing on a notional at an annual rate (ACT/365).
pub fn daily_swap(notional: Decimal, annual_rate: Decimal) -> Decimal {
    notional * annual_rate / dec!(365)
}

/// Daily borrow cost for a short position; same day-count as swaps.
pub fn borrow_cost(notional: Decimal, annual_borrow_rate: Decimal) -> Decimal {
    daily_swap(notional, annual_borrow_rate)
}

/// True once the timestamp has passed the 17:00 New York roll.
pub fn swap_applicable(timestamp: DateTime<Utc>) -> bool {
    let ny = timestamp.with_timezone(&New_York);
    ny.hour() >= 17
}

/// Triple swap on Wednesday per FX convention.
pub fn swap_multiplier_for_weekday(timestamp: DateTime<Utc>) -> Decimal {
    if timestamp.weekday() == Weekday::Wed {
        dec!(3)
    } else {
        Decimal::ONE
    }
}
