//! Domain types: bars, orders, fills, portfolio snapshots.

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod portfolio;

pub use bar::Bar;
pub use fill::Fill;
pub use ids::FillId;
pub use order::{OrderRequest, OrderSide, OrderType, TimeInForce};
pub use portfolio::{PortfolioState, Position};
