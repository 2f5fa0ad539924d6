//! barsim-core — deterministic bar-driven execution simulator.
//!
//! The engine consumes a time-ordered stream of OHLCV bars and a set of
//! previously generated orders, and produces fills, a per-bar equity
//! curve, portfolio snapshots, and structured rejections:
//! - Domain types (bars, orders, fills, portfolio snapshots)
//! - Look-ahead and eligibility gates
//! - Pure order-vs-bar matching with fee and slippage models
//! - FIFO position accounting, settlement queue, FX-aware marks
//! - Financing: overnight swaps and short borrow
//! - Constraint pipeline, risk caps, and the sticky kill-switch
//! - Bracket (OCO) management with the adverse-path rule
//! - The per-bar event loop and checkpoint/restart
//!
//! Everything money-shaped is `rust_decimal::Decimal`; two runs over the
//! same inputs with the same seed produce byte-identical results.

pub mod accounting;
pub mod brackets;
pub mod calibration;
pub mod checkpoint;
pub mod config;
pub mod constraints;
pub mod domain;
pub mod error;
pub mod execution;
pub mod financing;
pub mod fx;
pub mod reporting;
pub mod risk_caps;
pub mod rng;
pub mod simulator;
pub mod validation;

pub use simulator::{RejectedOrder, SimulationResult, Simulator};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types are Send + Sync so a host can move
    /// whole simulators across worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::OrderRequest>();
        require_sync::<domain::OrderRequest>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::PortfolioState>();
        require_sync::<domain::PortfolioState>();
        require_send::<accounting::AccountState>();
        require_sync::<accounting::AccountState>();
        require_send::<Simulator>();
        require_sync::<Simulator>();
        require_send::<SimulationResult>();
        require_sync::<SimulationResult>();
        require_send::<checkpoint::SimulationCheckpoint>();
        require_sync::<checkpoint::SimulationCheckpoint>();
    }
}
