//! Bar-driven simulation event loop.
//!
//! One pass over bars in input order; within a bar, orders are processed
//! in arrival order and brackets after new-order matches, so exits never
//! jump ahead of the entries that created them. All mutable state is owned
//! by one `Simulator` and touched only from this loop.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, warn};

use crate::accounting::AccountState;
use crate::brackets::{create_brackets, process_brackets, BracketState};
use crate::checkpoint::SimulationCheckpoint;
use crate::config::{ProviderConfig, SimulatorConfig};
use crate::constraints::{
    check_buying_power, check_gross_leverage, check_kill_switch, check_margin, check_pdt,
    check_position_limit, check_short_permission,
};
use crate::domain::{Bar, Fill, FillId, OrderRequest, OrderSide, OrderType, PortfolioState, TimeInForce};
use crate::execution::{match_order, MatchParams};
use crate::fx::{convert_to_usd, is_currency_pair, FxRates};
use crate::reporting::{funding_charge, slippage_percentiles};
use crate::risk_caps::{
    enforce_equity_floor, enforce_frequency_cap, enforce_net_position_cap, enforce_pyramiding_limit,
};
use crate::rng::SimRng;
use crate::validation::assert_no_lookahead;
use crate::error::SimError;

/// Record of an order rejected by the constraint pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedOrder {
    pub order: OrderRequest,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub fills: Vec<Fill>,
    /// Equity values only, one per processed bar (legacy alias of
    /// `equity_curve`).
    pub portfolio_history: Vec<Decimal>,
    pub equity_curve: Vec<(DateTime<Utc>, Decimal)>,
    pub portfolio_states: Vec<PortfolioState>,
    pub slippage_stats: BTreeMap<String, f64>,
    pub funding_charged: Decimal,
    pub rejected_orders: Vec<RejectedOrder>,
}

/// Swap rate table: symbol → annual rate.
pub type SwapRates = BTreeMap<String, Decimal>;

/// The simulation engine. Owns the account plus all runtime risk state.
#[derive(Debug, Clone)]
pub struct Simulator {
    pub provider_config: ProviderConfig,
    pub config: SimulatorConfig,
    pub account_state: AccountState,
    /// High-water mark of equity since the start of the run.
    pub peak_equity: Decimal,
    pub daily_start_equity: Decimal,
    pub kill_switch_engaged: bool,
    pub current_day: Option<DateTime<Utc>>,
    pub active_brackets: Vec<BracketState>,
    pub trades_today: u32,
    pub starting_equity: Decimal,
    rng: SimRng,
    next_fill_id: u64,
}

impl Simulator {
    /// Build a simulator, validating both configurations up front.
    pub fn new(provider_config: ProviderConfig, mut config: SimulatorConfig) -> Result<Self, SimError> {
        provider_config.validate()?;
        config.validate()?;

        let mut account_state = AccountState::new(config.initial_capital);
        account_state.account_currency = provider_config.account_currency.clone();
        if provider_config.pdt_enabled && account_state.day_trades_remaining.is_none() {
            // simplified PDT counter: three day trades
            account_state.day_trades_remaining = Some(3);
        }

        let init_equity = account_state.cash + account_state.unsettled_cash;
        let rng = SimRng::new(config.random_seed);
        Ok(Self {
            provider_config,
            config,
            account_state,
            peak_equity: init_equity,
            daily_start_equity: init_equity,
            kill_switch_engaged: false,
            current_day: None,
            active_brackets: Vec::new(),
            trades_today: 0,
            starting_equity: init_equity,
            rng,
            next_fill_id: 1,
        })
    }

    /// Snapshot the simulator into a checkpoint.
    pub fn to_checkpoint(&self, backtest_id: &str, config_hash: &str) -> SimulationCheckpoint {
        SimulationCheckpoint {
            schema_version: crate::checkpoint::CHECKPOINT_SCHEMA_VERSION,
            backtest_id: backtest_id.to_string(),
            config_hash: config_hash.to_string(),
            provider_config: self.provider_config.clone(),
            simulator_config: self.config.clone(),
            account_state: self.account_state.clone(),
            current_day: self.current_day,
            peak_equity: self.peak_equity,
            daily_start_equity: self.daily_start_equity,
            kill_switch_engaged: self.kill_switch_engaged,
            active_brackets: self.active_brackets.clone(),
            trades_today: self.trades_today,
            starting_equity: self.starting_equity,
            rng_state: self.rng.clone(),
            next_fill_id: self.next_fill_id,
        }
    }

    /// Rehydrate a simulator from a checkpoint, restoring RNG state so any
    /// model-level randomness continues deterministically.
    pub fn from_checkpoint(checkpoint: SimulationCheckpoint) -> Result<Self, SimError> {
        let mut sim = Self::new(checkpoint.provider_config, checkpoint.simulator_config)?;
        sim.account_state = checkpoint.account_state;
        sim.current_day = checkpoint.current_day;
        sim.peak_equity = checkpoint.peak_equity;
        sim.daily_start_equity = checkpoint.daily_start_equity;
        sim.kill_switch_engaged = checkpoint.kill_switch_engaged;
        sim.active_brackets = checkpoint.active_brackets;
        sim.trades_today = checkpoint.trades_today;
        sim.starting_equity = checkpoint.starting_equity;
        sim.rng = checkpoint.rng_state;
        sim.next_fill_id = checkpoint.next_fill_id;
        Ok(sim)
    }

    /// Convert a mark into the account currency when rates allow.
    fn mark_in_account_ccy(&self, price: Decimal, symbol: &str, fx_rates: Option<&FxRates>) -> Decimal {
        let Some(rates) = fx_rates else { return price };
        if self.account_state.account_currency != "USD" || !is_currency_pair(symbol) {
            return price;
        }
        convert_to_usd(price, symbol, rates).unwrap_or(price)
    }

    /// Uniform mark map: every open position marked at `price`.
    fn marks_at(&self, price: Decimal) -> BTreeMap<String, Decimal> {
        self.account_state
            .positions
            .keys()
            .map(|s| (s.clone(), price))
            .collect()
    }

    /// Run the simulation over `bars`, matching `orders` as they become
    /// eligible. Inputs are validated first; look-ahead aborts the run.
    pub fn run(
        &mut self,
        orders: &[OrderRequest],
        bars: &[Bar],
        min_delay_bars: Option<u32>,
        fx_rates: Option<&FxRates>,
        swap_rates: Option<&SwapRates>,
    ) -> Result<SimulationResult, SimError> {
        let min_delay = min_delay_bars.unwrap_or(self.config.min_order_delay_bars) as usize;
        for order in orders {
            order.validate()?;
        }
        for bar in bars {
            bar.validate()?;
        }

        let mut fills: Vec<Fill> = Vec::new();
        let mut equity_curve: Vec<(DateTime<Utc>, Decimal)> = Vec::new();
        let mut portfolio_states: Vec<PortfolioState> = Vec::new();
        let mut rejected_orders: Vec<RejectedOrder> = Vec::new();
        let mut funding_total = Decimal::ZERO;
        let mut slippage_samples: Vec<f64> = Vec::new();

        info!(
            order_count = orders.len(),
            bar_count = bars.len(),
            min_delay_bars = min_delay,
            provider = %self.provider_config.name,
            initial_capital = %self.config.initial_capital,
            "simulation started"
        );

        // Pre-sort: first-eligible bar index per order, stable by arrival.
        let mut pending: VecDeque<(usize, OrderRequest)> = {
            let mut indexed: Vec<(usize, OrderRequest)> = orders
                .iter()
                .map(|order| {
                    let origin_idx = bars
                        .iter()
                        .position(|bar| bar.timestamp >= order.timestamp)
                        .unwrap_or(0);
                    (origin_idx, order.clone())
                })
                .collect();
            indexed.sort_by_key(|(idx, _)| *idx);
            indexed.into()
        };
        let mut active_orders: Vec<OrderRequest> = Vec::new();

        for (bar_idx, bar) in bars.iter().enumerate() {
            // 1. daily reset
            let is_new_day = self
                .current_day
                .map(|day| bar.timestamp.date_naive() != day.date_naive())
                .unwrap_or(true);
            if is_new_day {
                let marks = self.marks_at(bar.open);
                let snapshot = self
                    .account_state
                    .to_portfolio_state(&marks, bar.timestamp, fx_rates);
                self.daily_start_equity = snapshot.equity;
                self.current_day = Some(bar.timestamp);
                self.trades_today = 0;
            }

            // 2. settlement release
            self.account_state.process_settlement(bar.timestamp);

            // 3. financing swaps at close marks
            if let Some(swap_rates) = swap_rates {
                let marks = self.marks_at(bar.close);
                self.account_state
                    .apply_daily_swap(bar.timestamp, swap_rates, &marks, fx_rates);
            }

            // 4. scenario funding, charged long / credited short
            if self.config.funding.enabled {
                let scenario = self.config.funding.scenario;
                let AccountState { cash, positions, .. } = &mut self.account_state;
                for record in positions.values_mut() {
                    let net = record.net_quantity();
                    if net == Decimal::ZERO {
                        continue;
                    }
                    let notional = (net * bar.close).abs();
                    let charge = funding_charge(notional, 1, scenario);
                    if net > Decimal::ZERO {
                        *cash -= charge;
                        record.realized_pnl -= charge;
                    } else {
                        *cash += charge;
                        record.realized_pnl += charge;
                    }
                    funding_total += charge;
                }
            }

            // 5. open-price equity snapshot; equity floor halts the run
            let marks_open = self.marks_at(bar.open);
            let mut snapshot_open =
                self.account_state
                    .to_portfolio_state(&marks_open, bar.timestamp, fx_rates);
            let mut current_equity = snapshot_open.equity;
            if current_equity <= Decimal::ZERO {
                current_equity = Decimal::ZERO;
                snapshot_open.equity = current_equity;
                equity_curve.push((bar.timestamp, current_equity));
                portfolio_states.push(snapshot_open);
                warn!(
                    timestamp = %bar.timestamp,
                    "equity non-positive; halting simulation"
                );
                break;
            }

            // 6. high-water mark
            if current_equity > self.peak_equity {
                self.peak_equity = current_equity;
            }

            // 7. kill-switch re-evaluation (sticky once engaged)
            if let Some(max_dd) = self.config.max_drawdown_pct {
                if current_equity < self.peak_equity * (Decimal::ONE - max_dd) {
                    self.kill_switch_engaged = true;
                }
            }
            if let Some(max_daily) = self.config.max_daily_loss_pct {
                if current_equity < self.daily_start_equity * (Decimal::ONE - max_daily) {
                    self.kill_switch_engaged = true;
                }
            }

            // 8. activate newly eligible orders
            while let Some((origin_idx, _)) = pending.front() {
                if *origin_idx > bar_idx || bar_idx - origin_idx < min_delay {
                    break;
                }
                let (_, order) = pending.pop_front().expect("front checked above");
                assert_no_lookahead(order.timestamp, bar.timestamp)?;
                active_orders.push(order);
            }

            // 9. per-order constraint gauntlet and matching
            let mut executed_ids: Vec<String> = Vec::new();
            let mut mark_cache: BTreeMap<String, Decimal> = BTreeMap::new();
            for order in active_orders.clone() {
                let mark_for_constraints = *mark_cache
                    .entry(order.symbol.clone())
                    .or_insert_with(|| self.mark_in_account_ccy(bar.open, &order.symbol, fx_rates));

                // Fresh snapshot so earlier fills this bar are visible.
                let pre_marks = self.marks_at(bar.open);
                let portfolio =
                    self.account_state
                        .to_portfolio_state(&pre_marks, bar.timestamp, fx_rates);

                let reject = |reason: String, rejected: &mut Vec<RejectedOrder>| {
                    debug!(
                        order_id = %order.client_order_id,
                        symbol = %order.symbol,
                        %reason,
                        "order rejected"
                    );
                    rejected.push(RejectedOrder {
                        order: order.clone(),
                        reason,
                        timestamp: bar.timestamp,
                    });
                };

                // risk caps first; each failure names the specific cap
                let net_exposure = portfolio.gross_exposure();
                if !enforce_net_position_cap(
                    net_exposure,
                    portfolio.equity,
                    self.config.risk_caps.net_position_cap_pct,
                ) {
                    reject("Net position cap".to_string(), &mut rejected_orders);
                    continue;
                }
                if !enforce_equity_floor(
                    portfolio.equity,
                    self.config.risk_caps.equity_floor_pct,
                    self.starting_equity,
                ) {
                    reject("Equity floor breached".to_string(), &mut rejected_orders);
                    continue;
                }
                if !enforce_frequency_cap(self.trades_today, self.config.risk_caps.frequency_cap_per_day)
                {
                    reject("Frequency cap reached".to_string(), &mut rejected_orders);
                    continue;
                }
                if !enforce_pyramiding_limit(1, self.config.risk_caps.pyramiding_layers) {
                    reject("Pyramiding cap".to_string(), &mut rejected_orders);
                    continue;
                }

                if let Err(violation) = check_kill_switch(self.kill_switch_engaged, &order) {
                    reject(violation.to_string(), &mut rejected_orders);
                    continue;
                }

                // PDT: would this order flatten a position opened today?
                let pre_qty = self
                    .account_state
                    .positions
                    .get(&order.symbol)
                    .map(|p| p.net_quantity())
                    .unwrap_or(Decimal::ZERO);
                let is_day_trade = order.timestamp.date_naive() == bar.timestamp.date_naive()
                    && match order.side {
                        OrderSide::Sell => {
                            pre_qty > Decimal::ZERO && pre_qty - order.quantity <= Decimal::ZERO
                        }
                        OrderSide::Buy => {
                            pre_qty < Decimal::ZERO && pre_qty + order.quantity >= Decimal::ZERO
                        }
                    };

                let constraint_result = check_position_limit(
                    &order,
                    &portfolio,
                    self.config.max_position_pct,
                    mark_for_constraints,
                )
                .and_then(|()| check_buying_power(&order, &portfolio, mark_for_constraints))
                .and_then(|()| {
                    check_margin(
                        &order,
                        &portfolio,
                        mark_for_constraints,
                        self.provider_config.initial_margin_rate,
                    )
                })
                .and_then(|()| {
                    check_gross_leverage(
                        &order,
                        &portfolio,
                        mark_for_constraints,
                        self.config.max_gross_leverage,
                    )
                })
                .and_then(|()| {
                    check_short_permission(
                        &order,
                        &portfolio,
                        self.provider_config.short_enabled,
                        self.provider_config.locate_required,
                    )
                })
                .and_then(|()| check_pdt(&portfolio, is_day_trade));
                if let Err(violation) = constraint_result {
                    reject(violation.to_string(), &mut rejected_orders);
                    continue;
                }

                let slippage = self
                    .provider_config
                    .slippage_model
                    .calculate(&order, bar, &mut self.rng);
                // maker heuristic: a resting limit priced passively against
                // the open provides liquidity
                let is_maker = order.order_type == OrderType::Limit
                    && match (order.side, order.limit_price) {
                        (OrderSide::Buy, Some(limit)) => limit < bar.open,
                        (OrderSide::Sell, Some(limit)) => limit > bar.open,
                        _ => false,
                    };
                let commission =
                    self.provider_config
                        .fee_model
                        .calculate(&order, bar.open, is_maker);

                let matched = match_order(
                    &order,
                    bar,
                    MatchParams {
                        slippage,
                        commission,
                        provider: &self.provider_config.name,
                        timestamp: bar.timestamp,
                        fill_id: FillId(self.next_fill_id),
                    },
                );
                let Some(mut fill) = matched else { continue };
                self.next_fill_id += 1;

                slippage_samples.push(slippage.to_f64().unwrap_or(0.0));
                executed_ids.push(order.client_order_id.clone());
                if is_day_trade {
                    if let Some(remaining) = self.account_state.day_trades_remaining {
                        self.account_state.day_trades_remaining = Some(remaining.saturating_sub(1));
                    }
                }
                self.trades_today += 1;

                let realized = self.account_state.apply_fill(
                    &fill,
                    self.provider_config.settlement_days,
                    self.provider_config.borrow_rate_annual,
                    fx_rates,
                );
                fill.realized_pnl = Some(realized);
                debug!(
                    order_id = %order.client_order_id,
                    symbol = %fill.symbol,
                    price = %fill.price,
                    quantity = %fill.quantity,
                    realized = %realized,
                    "order filled"
                );
                fills.push(fill);

                let bracket = create_brackets(&order);
                if !bracket.is_empty() {
                    self.active_brackets.push(bracket);
                }
            }

            active_orders.retain(|o| !executed_ids.contains(&o.client_order_id));

            // 10. process active brackets against this bar's range
            let brackets = std::mem::take(&mut self.active_brackets);
            for bracket in brackets {
                let Some(trigger) = process_brackets(&bracket, bar.high, bar.low) else {
                    self.active_brackets.push(bracket);
                    continue;
                };
                let Some(leg) = bracket.leg(trigger) else { continue };
                debug!(
                    parent_id = %bracket.parent_id,
                    trigger = ?trigger,
                    symbol = %leg.symbol,
                    "bracket triggered"
                );
                let slippage = self
                    .provider_config
                    .slippage_model
                    .calculate(leg, bar, &mut self.rng);
                let commission = self.provider_config.fee_model.calculate(leg, bar.open, false);
                let matched = match_order(
                    leg,
                    bar,
                    MatchParams {
                        slippage,
                        commission,
                        provider: &self.provider_config.name,
                        timestamp: bar.timestamp,
                        fill_id: FillId(self.next_fill_id),
                    },
                );
                if let Some(mut fill) = matched {
                    self.next_fill_id += 1;
                    let realized = self.account_state.apply_fill(
                        &fill,
                        self.provider_config.settlement_days,
                        self.provider_config.borrow_rate_annual,
                        fx_rates,
                    );
                    fill.realized_pnl = Some(realized);
                    fills.push(fill);
                    slippage_samples.push(slippage.to_f64().unwrap_or(0.0));
                    self.trades_today += 1;
                }
                // triggered brackets are done either way (OCO: the other
                // leg is discarded with the state)
            }

            // 11. DAY orders that were eligible this bar and did not fill
            // expire at the close
            active_orders.retain(|o| o.time_in_force != TimeInForce::Day);

            // 12. close-price snapshot and equity point
            let marks_close = self.marks_at(bar.close);
            let portfolio =
                self.account_state
                    .to_portfolio_state(&marks_close, bar.timestamp, fx_rates);
            equity_curve.push((bar.timestamp, portfolio.equity));
            portfolio_states.push(portfolio);
        }

        let portfolio_history: Vec<Decimal> = equity_curve.iter().map(|(_, eq)| *eq).collect();
        let final_equity = equity_curve
            .last()
            .map(|(_, eq)| *eq)
            .unwrap_or(Decimal::ZERO);
        info!(
            fill_count = fills.len(),
            rejected_count = rejected_orders.len(),
            final_equity = %final_equity,
            "simulation completed"
        );

        Ok(SimulationResult {
            fills,
            portfolio_history,
            equity_curve,
            portfolio_states,
            slippage_stats: slippage_percentiles(
                &slippage_samples,
                &self.config.slippage_reporting.percentiles,
            ),
            funding_charged: funding_total,
            rejected_orders,
        })
    }
}
