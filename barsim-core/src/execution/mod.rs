//! Execution: pure bar matching plus fee and slippage models.

pub mod fee;
pub mod matcher;
pub mod slippage;

pub use fee::FeeModel;
pub use matcher::{match_order, MatchParams};
pub use slippage::SlippageModel;
