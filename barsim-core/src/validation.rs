//! Order eligibility and look-ahead gates.
//!
//! Every order passes through these before it may participate in a bar.
//! Look-ahead is a hard failure: an order stamped after the bar it would
//! trade on means upstream leaked future information.

use chrono::{DateTime, Utc};

use crate::error::SimError;

/// True when the order generated at `order_bar_index` may execute at
/// `current_bar_index` under the configured delay. A negative delay is a
/// configuration error, never a silent pass.
pub fn is_order_eligible(
    order_bar_index: usize,
    current_bar_index: usize,
    min_delay_bars: i64,
) -> Result<bool, SimError> {
    if min_delay_bars < 0 {
        return Err(SimError::Config(
            "min_delay_bars must be >= 0".to_string(),
        ));
    }
    Ok(current_bar_index as i64 - order_bar_index as i64 >= min_delay_bars)
}

/// Like [`is_order_eligible`], but an ineligible order is an error.
pub fn ensure_order_eligible(
    order_bar_index: usize,
    current_bar_index: usize,
    min_delay_bars: i64,
) -> Result<(), SimError> {
    if !is_order_eligible(order_bar_index, current_bar_index, min_delay_bars)? {
        return Err(SimError::IneligibleOrder {
            order_index: order_bar_index,
            current_index: current_bar_index,
            eligible_at: order_bar_index + min_delay_bars as usize,
        });
    }
    Ok(())
}

/// Fail when an order timestamp implies using future information.
pub fn assert_no_lookahead(
    order_timestamp: DateTime<Utc>,
    bar_timestamp: DateTime<Utc>,
) -> Result<(), SimError> {
    if order_timestamp > bar_timestamp {
        return Err(SimError::LookAhead {
            order_ts: order_timestamp,
            bar_ts: bar_timestamp,
        });
    }
    Ok(())
}
