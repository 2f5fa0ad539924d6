//! Risk-cap gates: net exposure, pyramiding, equity floor, trade frequency.
//!
//! These run ahead of the constraint pipeline and return plain booleans —
//! `None` caps are disabled and always pass.

use rust_decimal::Decimal;

/// Net exposure must stay within `cap_pct` of equity. Non-positive equity
/// with a cap configured always fails.
pub fn enforce_net_position_cap(
    net_exposure: Decimal,
    equity: Decimal,
    cap_pct: Option<Decimal>,
) -> bool {
    let Some(cap) = cap_pct else { return true };
    if equity <= Decimal::ZERO {
        return false;
    }
    net_exposure.abs() <= cap * equity
}

/// Current pyramiding layers must be below the configured maximum.
pub fn enforce_pyramiding_limit(current_layers: u32, max_layers: Option<u32>) -> bool {
    match max_layers {
        Some(max) => current_layers < max,
        None => true,
    }
}

/// Equity must stay at or above `floor_pct` of starting equity.
pub fn enforce_equity_floor(
    equity: Decimal,
    floor_pct: Option<Decimal>,
    starting_equity: Decimal,
) -> bool {
    match floor_pct {
        Some(floor) => equity >= floor * starting_equity,
        None => true,
    }
}

/// Today's trade count must be below the per-day cap.
pub fn enforce_frequency_cap(trades_today: u32, cap: Option<u32>) -> bool {
    match cap {
        Some(max) => trades_today < max,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn net_position_cap() {
        assert!(enforce_net_position_cap(dec!(5000), dec!(10000), None));
        assert!(enforce_net_position_cap(dec!(5000), dec!(10000), Some(dec!(0.5))));
        assert!(!enforce_net_position_cap(dec!(5001), dec!(10000), Some(dec!(0.5))));
        // absolute value: short exposure counts the same
        assert!(!enforce_net_position_cap(dec!(-5001), dec!(10000), Some(dec!(0.5))));
        // non-positive equity fails when capped
        assert!(!enforce_net_position_cap(dec!(1), Decimal::ZERO, Some(dec!(0.5))));
    }

    #[test]
    fn pyramiding_limit() {
        assert!(enforce_pyramiding_limit(5, None));
        assert!(enforce_pyramiding_limit(1, Some(2)));
        assert!(!enforce_pyramiding_limit(2, Some(2)));
    }

    #[test]
    fn equity_floor() {
        assert!(enforce_equity_floor(dec!(100), None, dec!(10000)));
        assert!(enforce_equity_floor(dec!(5000), Some(dec!(0.5)), dec!(10000)));
        assert!(!enforce_equity_floor(dec!(4999), Some(dec!(0.5)), dec!(10000)));
    }

    #[test]
    fn frequency_cap() {
        assert!(enforce_frequency_cap(100, None));
        assert!(enforce_frequency_cap(2, Some(3)));
        assert!(!enforce_frequency_cap(3, Some(3)));
    }
}
