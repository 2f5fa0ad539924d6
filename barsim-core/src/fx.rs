//! FX conversion for cross/quote/base currency pairs.
//!
//! Symbol convention: currency pairs are `BASE_QUOTE` or `BASE-QUOTE`.
//! Anything without a separator is not a pair and passes through untouched.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;

/// Per-pair conversion rates valid for a run, e.g. `"USD_JPY" -> 150.0`.
pub type FxRates = BTreeMap<String, Decimal>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing FX rate for {0}")]
pub struct MissingFxRate(pub String);

/// Convert an amount denominated in a pair's quote currency into USD.
///
/// - Quote = USD (e.g. `EUR_USD`): already USD.
/// - Base = USD (e.g. `USD_JPY`): divide by the pair's own rate.
/// - Cross (e.g. `EUR_JPY`): divide by `USD_<quote>`.
pub fn convert_to_usd(amount: Decimal, pair: &str, rates: &FxRates) -> Result<Decimal, MissingFxRate> {
    let pair = pair.replace('-', "_");
    if !pair.contains('_') {
        return Ok(amount);
    }
    if pair.ends_with("USD") {
        return Ok(amount);
    }
    if pair.starts_with("USD_") {
        let rate = rates
            .get(&pair)
            .ok_or_else(|| MissingFxRate(pair.clone()))?;
        return Ok(amount / rate);
    }
    let quote = pair.split('_').nth(1).unwrap_or(pair.as_str());
    let usd_pair = format!("USD_{quote}");
    let rate = rates
        .get(&usd_pair)
        .ok_or(MissingFxRate(usd_pair.clone()))?;
    Ok(amount / rate)
}

/// True when the symbol follows the currency-pair convention.
pub fn is_currency_pair(symbol: &str) -> bool {
    symbol.replace('-', "_").contains('_')
}
