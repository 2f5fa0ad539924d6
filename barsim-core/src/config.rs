//! Simulator and provider configuration.
//!
//! Both structs are immutable after construction and validated up front:
//! every out-of-range field fails before the first bar is processed.
//! `config_hash` gives the canonical identity used to guard checkpoints.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::execution::{FeeModel, SlippageModel};

/// Per-fold score calibration method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationMethod {
    Temperature,
    Platt,
}

/// Score calibration toggle for upstream strategy code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub enabled: bool,
    pub method: CalibrationMethod,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: CalibrationMethod::Temperature,
        }
    }
}

/// Constraints for expected-value threshold selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvThresholdConfig {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_precision: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_recall: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_trades: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ev: Option<f64>,
}

impl EvThresholdConfig {
    fn validate(&self) -> Result<(), SimError> {
        for (name, value) in [
            ("min_precision", self.min_precision),
            ("min_recall", self.min_recall),
            ("target_ev", self.target_ev),
        ] {
            if let Some(v) = value {
                if v <= 0.0 || v >= 1.0 {
                    return Err(SimError::Config(format!("{name} must be in (0, 1)")));
                }
            }
        }
        Ok(())
    }
}

/// Funding rate scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingScenario {
    Base,
    Elevated,
    Spike,
}

impl FundingScenario {
    /// Annual funding rate for the scenario.
    pub fn annual_rate(self) -> Decimal {
        match self {
            FundingScenario::Base => dec!(0.03),
            FundingScenario::Elevated => dec!(0.08),
            FundingScenario::Spike => dec!(0.15),
        }
    }
}

/// Scenario-based funding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingConfig {
    pub enabled: bool,
    pub scenario: FundingScenario,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scenario: FundingScenario::Base,
        }
    }
}

/// Which percentiles of the slippage distribution to report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlippageReportingConfig {
    pub percentiles: Vec<u8>,
}

impl Default for SlippageReportingConfig {
    fn default() -> Self {
        Self {
            percentiles: vec![50, 75, 90, 95, 99],
        }
    }
}

impl SlippageReportingConfig {
    /// Percentiles must be non-empty and within 1..=99; duplicates are
    /// collapsed and the list is sorted in place.
    fn validate(&mut self) -> Result<(), SimError> {
        if self.percentiles.is_empty() {
            return Err(SimError::Config("percentiles must not be empty".into()));
        }
        if self.percentiles.iter().any(|&p| p == 0 || p >= 100) {
            return Err(SimError::Config(
                "percentiles must be between 1 and 99".into(),
            ));
        }
        self.percentiles.sort_unstable();
        self.percentiles.dedup();
        Ok(())
    }
}

/// Optional risk caps applied ahead of the constraint pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskCapsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_position_cap_pct: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pyramiding_layers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity_floor_pct: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_cap_per_day: Option<u32>,
}

impl RiskCapsConfig {
    fn validate(&self) -> Result<(), SimError> {
        for (name, value) in [
            ("net_position_cap_pct", self.net_position_cap_pct),
            ("equity_floor_pct", self.equity_floor_pct),
        ] {
            if let Some(v) = value {
                if v <= Decimal::ZERO || v >= Decimal::ONE {
                    return Err(SimError::Config(format!("{name} must be in (0, 1)")));
                }
            }
        }
        for (name, value) in [
            ("pyramiding_layers", self.pyramiding_layers),
            ("frequency_cap_per_day", self.frequency_cap_per_day),
        ] {
            if value == Some(0) {
                return Err(SimError::Config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

/// Simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub initial_capital: Decimal,
    pub min_order_delay_bars: u32,
    pub max_daily_loss_pct: Option<Decimal>,
    pub max_drawdown_pct: Option<Decimal>,
    pub max_position_pct: Decimal,
    pub max_gross_leverage: Decimal,
    pub checkpoint_interval: u32,
    pub random_seed: u64,
    pub calibration: CalibrationConfig,
    pub ev_thresholds: EvThresholdConfig,
    pub funding: FundingConfig,
    pub slippage_reporting: SlippageReportingConfig,
    pub risk_caps: RiskCapsConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10000),
            min_order_delay_bars: 1,
            max_daily_loss_pct: None,
            max_drawdown_pct: None,
            max_position_pct: dec!(0.25),
            max_gross_leverage: dec!(2),
            checkpoint_interval: 0,
            random_seed: 42,
            calibration: CalibrationConfig::default(),
            ev_thresholds: EvThresholdConfig::default(),
            funding: FundingConfig::default(),
            slippage_reporting: SlippageReportingConfig::default(),
            risk_caps: RiskCapsConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Validate ranges and normalize the percentile list. Call before the
    /// first bar.
    pub fn validate(&mut self) -> Result<(), SimError> {
        if self.max_position_pct <= Decimal::ZERO || self.max_position_pct > Decimal::ONE {
            return Err(SimError::Config("max_position_pct must be in (0, 1]".into()));
        }
        if self.max_gross_leverage <= Decimal::ZERO {
            return Err(SimError::Config("max_gross_leverage must be > 0".into()));
        }
        for (name, value) in [
            ("max_daily_loss_pct", self.max_daily_loss_pct),
            ("max_drawdown_pct", self.max_drawdown_pct),
        ] {
            if let Some(v) = value {
                if v <= Decimal::ZERO || v >= Decimal::ONE {
                    return Err(SimError::Config(format!("{name} must be in (0, 1)")));
                }
            }
        }
        self.ev_thresholds.validate()?;
        self.slippage_reporting.validate()?;
        self.risk_caps.validate()?;
        Ok(())
    }
}

/// Margin account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginType {
    RegT,
    Portfolio,
    Leveraged,
}

/// Execution venue configuration.
///
/// Only the name, asset classes, and the two models are required in
/// serialized form; everything else defaults to a cash account in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub asset_classes: Vec<String>,
    pub fee_model: FeeModel,
    pub slippage_model: SlippageModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_type: Option<MarginType>,
    #[serde(default = "default_margin_rate")]
    pub initial_margin_rate: Decimal,
    #[serde(default = "default_margin_rate")]
    pub maintenance_margin_rate: Decimal,
    #[serde(default)]
    pub short_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrow_rate_annual: Option<Decimal>,
    #[serde(default)]
    pub locate_required: bool,
    #[serde(default)]
    pub settlement_days: u32,
    #[serde(default)]
    pub pdt_enabled: bool,
    #[serde(default = "default_pdt_min_equity")]
    pub pdt_min_equity: Decimal,
    #[serde(default = "default_account_currency")]
    pub account_currency: String,
}

fn default_margin_rate() -> Decimal {
    Decimal::ONE
}

fn default_pdt_min_equity() -> Decimal {
    dec!(25000)
}

fn default_account_currency() -> String {
    "USD".to_string()
}

impl ProviderConfig {
    /// A commission-free, frictionless cash-account baseline to build
    /// provider configurations from.
    pub fn frictionless(name: &str, asset_class: &str) -> Self {
        Self {
            name: name.to_string(),
            asset_classes: vec![asset_class.to_string()],
            fee_model: FeeModel::ZeroCommission,
            slippage_model: SlippageModel::VolumeWeighted {
                base_bps: Decimal::ZERO,
                volume_impact: Decimal::ZERO,
                jitter_bps: None,
            },
            margin_type: None,
            initial_margin_rate: Decimal::ONE,
            maintenance_margin_rate: Decimal::ONE,
            short_enabled: false,
            borrow_rate_annual: None,
            locate_required: false,
            settlement_days: 0,
            pdt_enabled: false,
            pdt_min_equity: dec!(25000),
            account_currency: "USD".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.asset_classes.is_empty() {
            return Err(SimError::Config("asset_classes must not be empty".into()));
        }
        if self.initial_margin_rate <= Decimal::ZERO {
            return Err(SimError::Config("initial_margin_rate must be > 0".into()));
        }
        if self.maintenance_margin_rate <= Decimal::ZERO {
            return Err(SimError::Config(
                "maintenance_margin_rate must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Deterministic identity of a (provider, simulator) configuration pair.
///
/// Canonical serialization: struct field order is fixed and every map in
/// the tree is ordered, so the JSON — and therefore the hash — is stable.
pub fn config_hash(provider: &ProviderConfig, simulator: &SimulatorConfig) -> String {
    let json = serde_json::to_string(&(provider, simulator))
        .expect("config serialization is infallible");
    blake3::hash(json.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_simulator_config_is_valid() {
        let mut cfg = SimulatorConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.slippage_reporting.percentiles, vec![50, 75, 90, 95, 99]);
    }

    #[test]
    fn rejects_out_of_range_position_pct() {
        let mut cfg = SimulatorConfig {
            max_position_pct: dec!(1.5),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        cfg.max_position_pct = Decimal::ZERO;
        assert!(cfg.validate().is_err());

        cfg.max_position_pct = Decimal::ONE;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_loss_pcts() {
        let mut cfg = SimulatorConfig {
            max_daily_loss_pct: Some(Decimal::ONE),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        cfg.max_daily_loss_pct = Some(dec!(0.05));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn percentiles_normalized_sorted_unique() {
        let mut cfg = SimulatorConfig::default();
        cfg.slippage_reporting.percentiles = vec![90, 50, 90, 75];
        cfg.validate().unwrap();
        assert_eq!(cfg.slippage_reporting.percentiles, vec![50, 75, 90]);
    }

    #[test]
    fn percentiles_rejected_out_of_range() {
        let mut cfg = SimulatorConfig::default();
        cfg.slippage_reporting.percentiles = vec![50, 100];
        assert!(cfg.validate().is_err());

        cfg.slippage_reporting.percentiles = vec![];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn risk_caps_validated() {
        let mut cfg = SimulatorConfig::default();
        cfg.risk_caps.net_position_cap_pct = Some(dec!(1.2));
        assert!(cfg.validate().is_err());

        cfg.risk_caps.net_position_cap_pct = Some(dec!(0.8));
        cfg.risk_caps.pyramiding_layers = Some(0);
        assert!(cfg.validate().is_err());

        cfg.risk_caps.pyramiding_layers = Some(3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn ev_threshold_fractions_validated() {
        let mut cfg = SimulatorConfig::default();
        cfg.ev_thresholds.min_precision = Some(1.0);
        assert!(cfg.validate().is_err());

        cfg.ev_thresholds.min_precision = Some(0.6);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn provider_requires_asset_classes() {
        let mut provider = ProviderConfig::frictionless("mock", "equities");
        assert!(provider.validate().is_ok());
        provider.asset_classes.clear();
        assert!(provider.validate().is_err());
    }

    #[test]
    fn provider_requires_positive_margin_rates() {
        let mut provider = ProviderConfig::frictionless("mock", "equities");
        provider.initial_margin_rate = Decimal::ZERO;
        assert!(provider.validate().is_err());
    }

    #[test]
    fn provider_config_minimal_json_uses_defaults() {
        let json = r#"{
            "name": "mock",
            "asset_classes": ["equities"],
            "fee_model": {"type": "ZERO_COMMISSION"},
            "slippage_model": {"type": "SPREAD_BASED"}
        }"#;
        let provider: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(provider.initial_margin_rate, Decimal::ONE);
        assert_eq!(provider.account_currency, "USD");
        assert_eq!(provider.settlement_days, 0);
        assert!(!provider.short_enabled);
        assert_eq!(provider.pdt_min_equity, dec!(25000));
    }

    #[test]
    fn config_hash_is_stable_and_sensitive() {
        let provider = ProviderConfig::frictionless("mock", "equities");
        let simulator = SimulatorConfig::default();
        let h1 = config_hash(&provider, &simulator);
        let h2 = config_hash(&provider, &simulator);
        assert_eq!(h1, h2);

        let changed = SimulatorConfig {
            random_seed: 43,
            ..Default::default()
        };
        assert_ne!(h1, config_hash(&provider, &changed));
    }

    #[test]
    fn simulator_config_serde_roundtrip() {
        let cfg = SimulatorConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let deser: SimulatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, deser);
    }
}
