//! Mutable account state: cash, settlement queue, positions, financing.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::domain::{Fill, OrderSide, PortfolioState, Position};
use crate::financing::{borrow_cost, daily_swap, swap_applicable, swap_multiplier_for_weekday};
use crate::fx::{convert_to_usd, is_currency_pair, FxRates};

use super::lots::PositionRecord;

/// Sell proceeds awaiting their settlement date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEntry {
    pub amount: Decimal,
    pub release_time: DateTime<Utc>,
}

/// The one mutable owner of cash and positions during a run.
///
/// Positions iterate in first-opened order so that equity sums are
/// reproducible bit-for-bit across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub cash: Decimal,
    pub unsettled_cash: Decimal,
    pub positions: IndexMap<String, PositionRecord>,
    pub settlement_queue: Vec<SettlementEntry>,
    pub day_trades_remaining: Option<u32>,
    pub account_currency: String,
    pub last_swap_time: Option<DateTime<Utc>>,
}

impl AccountState {
    pub fn new(cash: Decimal) -> Self {
        Self {
            cash,
            unsettled_cash: Decimal::ZERO,
            positions: IndexMap::new(),
            settlement_queue: Vec::new(),
            day_trades_remaining: None,
            account_currency: "USD".to_string(),
            last_swap_time: None,
        }
    }

    /// Convert an amount quoted in `symbol`'s quote currency into the
    /// account currency. Missing rates degrade to the raw value with a
    /// warning; conversion never fails mid-run.
    fn to_account_ccy(&self, amount: Decimal, symbol: &str, fx_rates: Option<&FxRates>) -> Decimal {
        let Some(rates) = fx_rates else { return amount };
        if self.account_currency != "USD" || !is_currency_pair(symbol) {
            return amount;
        }
        match convert_to_usd(amount, symbol, rates) {
            Ok(converted) => converted,
            Err(err) => {
                warn!(symbol, %err, "FX rate missing; using raw value");
                amount
            }
        }
    }

    /// Apply a fill: FIFO lots, cash or settlement queue, borrow cost,
    /// FX-converted realized P&L. Returns the realized P&L for this fill
    /// in account currency.
    pub fn apply_fill(
        &mut self,
        fill: &Fill,
        settlement_days: u32,
        borrow_rate_annual: Option<Decimal>,
        fx_rates: Option<&FxRates>,
    ) -> Decimal {
        let record = self.positions.entry(fill.symbol.clone()).or_default();
        let realized_trade_ccy = record.apply_fill(fill);

        let notional_account_ccy = self.to_account_ccy(fill.notional(), &fill.symbol, fx_rates);

        match fill.side {
            OrderSide::Buy => {
                self.cash -= notional_account_ccy + fill.commission;
            }
            OrderSide::Sell => {
                let proceeds = notional_account_ccy - fill.commission;
                if settlement_days > 0 {
                    self.settlement_queue.push(SettlementEntry {
                        amount: proceeds,
                        release_time: fill.timestamp + Duration::days(settlement_days as i64),
                    });
                    self.unsettled_cash += proceeds;
                } else {
                    self.cash += proceeds;
                }
            }
        }

        // Short borrow: charged in full at fill time rather than accrued
        // per day.
        if let Some(rate) = borrow_rate_annual {
            let net = self.positions[&fill.symbol].net_quantity();
            if net < Decimal::ZERO {
                let borrow_mark = self.to_account_ccy(fill.price, &fill.symbol, fx_rates);
                self.cash -= borrow_cost(net.abs() * borrow_mark, rate);
            }
        }

        let realized = self.to_account_ccy(realized_trade_ccy, &fill.symbol, fx_rates);
        if realized != realized_trade_ccy {
            // keep the stored cumulative figure in account currency too
            let record = self
                .positions
                .get_mut(&fill.symbol)
                .expect("position record created above");
            record.realized_pnl += realized - realized_trade_ccy;
        }
        realized
    }

    /// Release due settlement entries into cash. Afterwards every queued
    /// entry has `release_time > now`.
    pub fn process_settlement(&mut self, now: DateTime<Utc>) {
        let mut remaining = Vec::with_capacity(self.settlement_queue.len());
        for entry in self.settlement_queue.drain(..) {
            if now >= entry.release_time {
                self.unsettled_cash -= entry.amount;
                self.cash += entry.amount;
            } else {
                remaining.push(entry);
            }
        }
        self.settlement_queue = remaining;
    }

    /// Apply financing swaps at the New York roll. Idempotent per calendar
    /// day via `last_swap_time`; longs pay, shorts receive, with realized
    /// P&L mirroring the cash movement.
    pub fn apply_daily_swap(
        &mut self,
        now: DateTime<Utc>,
        swap_rates: &BTreeMap<String, Decimal>,
        marks: &BTreeMap<String, Decimal>,
        fx_rates: Option<&FxRates>,
    ) {
        if !swap_applicable(now) {
            return;
        }
        if let Some(last) = self.last_swap_time {
            if last.date_naive() == now.date_naive() {
                return;
            }
        }
        let account_currency_is_usd = self.account_currency == "USD";
        for (symbol, record) in &mut self.positions {
            let net = record.net_quantity();
            if net == Decimal::ZERO {
                continue;
            }
            let Some(rate) = swap_rates.get(symbol) else { continue };
            let Some(mark) = marks.get(symbol) else { continue };
            let mut mark_ccy = *mark;
            if let Some(rates) = fx_rates {
                if account_currency_is_usd && is_currency_pair(symbol) {
                    match convert_to_usd(*mark, symbol, rates) {
                        Ok(converted) => mark_ccy = converted,
                        Err(err) => warn!(symbol, %err, "FX rate missing for swap mark"),
                    }
                }
            }
            let multiplier = swap_multiplier_for_weekday(now);
            let cost = daily_swap(net.abs() * mark_ccy, *rate) * multiplier;
            if net > Decimal::ZERO {
                self.cash -= cost;
                record.realized_pnl -= cost;
            } else {
                self.cash += cost;
                record.realized_pnl += cost;
            }
        }
        self.last_swap_time = Some(now);
    }

    /// Snapshot the account into an immutable [`PortfolioState`] at the
    /// provided mark prices. Marks and cost bases convert into the account
    /// currency when rates are known.
    pub fn to_portfolio_state(
        &self,
        marks: &BTreeMap<String, Decimal>,
        timestamp: DateTime<Utc>,
        fx_rates: Option<&FxRates>,
    ) -> PortfolioState {
        let mut positions = IndexMap::new();
        let mut total_realized = Decimal::ZERO;
        let mut equity = self.cash + self.unsettled_cash;

        for (symbol, record) in &self.positions {
            let qty = record.net_quantity();
            let avg_entry = record.avg_entry_price();
            let mark = marks.get(symbol).copied().unwrap_or(avg_entry);

            let mark_notional = self.to_account_ccy(qty * mark, symbol, fx_rates);
            let cost_notional = self.to_account_ccy(qty * avg_entry, symbol, fx_rates);

            let (current_price, average_price) = if qty != Decimal::ZERO {
                (mark_notional / qty, cost_notional / qty)
            } else {
                (mark, avg_entry)
            };

            positions.insert(
                symbol.clone(),
                Position {
                    symbol: symbol.clone(),
                    quantity: qty,
                    average_price,
                    current_price,
                    realized_pnl: record.realized_pnl,
                    timestamp,
                },
            );
            total_realized += record.realized_pnl;
            equity += mark_notional;
        }

        PortfolioState {
            cash: self.cash,
            unsettled_cash: self.unsettled_cash,
            positions,
            realized_pnl: total_realized,
            day_trades_remaining: self.day_trades_remaining,
            timestamp,
            equity,
        }
    }
}
