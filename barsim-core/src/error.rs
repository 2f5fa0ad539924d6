//! Engine error taxonomy.
//!
//! Configuration and input problems fail fast before the first bar;
//! look-ahead aborts a run; constraint violations are soft and live in
//! `constraints::ConstraintViolation`; checkpoint problems have their own
//! enum in `checkpoint`.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Hard errors raised by the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid order {id}: {reason}")]
    InvalidOrder { id: String, reason: String },

    #[error("invalid bar for {symbol}: {reason}")]
    InvalidBar { symbol: String, reason: String },

    #[error("look-ahead bias: order timestamp {order_ts} is after bar timestamp {bar_ts}")]
    LookAhead {
        order_ts: DateTime<Utc>,
        bar_ts: DateTime<Utc>,
    },

    #[error(
        "order at bar {order_index} not eligible until {eligible_at}; current bar is {current_index}"
    )]
    IneligibleOrder {
        order_index: usize,
        current_index: usize,
        eligible_at: usize,
    },
}
