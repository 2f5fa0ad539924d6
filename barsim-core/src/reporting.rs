//! Reporting helpers: funding charges and slippage percentile stats.
//!
//! Funding stays in decimal because it moves cash. Percentile statistics
//! are the one place floating point is allowed — they only describe the
//! run, they never feed back into it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use crate::config::FundingScenario;

/// Funding charge on a notional over `days` under a scenario (ACT/365).
pub fn funding_charge(notional: Decimal, days: u32, scenario: FundingScenario) -> Decimal {
    notional * scenario.annual_rate() / dec!(365) * Decimal::from(days)
}

/// Percentile stats over slippage samples, keyed `"p50"`, `"p90"`, …
///
/// Linear interpolation between order statistics; empty input reports 0.0
/// for every requested percentile.
pub fn slippage_percentiles(samples: &[f64], percentiles: &[u8]) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    if samples.is_empty() {
        for p in percentiles {
            out.insert(format!("p{p}"), 0.0);
        }
        return out;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("slippage samples are finite"));
    for &p in percentiles {
        let rank = f64::from(p) / 100.0 * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let value = if lo == hi {
            sorted[lo]
        } else {
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        };
        out.insert(format!("p{p}"), value);
    }
    out
}
