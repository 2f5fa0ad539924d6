//! Score calibration and EV-based threshold selection.
//!
//! Pure numeric helpers consumed by upstream strategy code; nothing here
//! touches the money path, so plain `f64` slices are fine.

use crate::config::EvThresholdConfig;

/// Calibrated scores plus the fitted temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    pub scores: Vec<f64>,
    pub temperature: f64,
}

/// Temperature scaling: divide scores by a temperature fitted from their
/// dispersion, clipping the result to `[0, 1]`.
pub fn temperature_scale(scores: &[f64]) -> CalibrationResult {
    if scores.is_empty() {
        return CalibrationResult {
            scores: Vec::new(),
            temperature: 1.0,
        };
    }
    let temperature = std_dev(scores).max(1e-6);
    let calibrated = scores
        .iter()
        .map(|s| (s / temperature).clamp(0.0, 1.0))
        .collect();
    CalibrationResult {
        scores: calibrated,
        temperature,
    }
}

fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Outcome of a threshold search.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdDiagnostics {
    pub threshold: f64,
    pub expected_value: f64,
    pub precision: f64,
    pub recall: f64,
    pub trades: u32,
    pub constraints_satisfied: bool,
}

impl ThresholdDiagnostics {
    /// Neutral fallback when no threshold satisfies the constraints.
    fn fallback() -> Self {
        Self {
            threshold: 0.5,
            expected_value: 0.0,
            precision: 0.0,
            recall: 0.0,
            trades: 0,
            constraints_satisfied: false,
        }
    }
}

/// Grid-search the threshold maximizing expected value under the optional
/// precision/recall/trade-count constraints. Precision serves as the EV
/// proxy. Scores and labels must be parallel slices.
pub fn ev_threshold_search(
    scores: &[f64],
    labels: &[bool],
    constraints: &EvThresholdConfig,
) -> ThresholdDiagnostics {
    if scores.is_empty() || labels.is_empty() {
        return ThresholdDiagnostics::fallback();
    }

    let grid = (1..20).map(|i| f64::from(i) * 0.05);
    let mut best: Option<ThresholdDiagnostics> = None;

    for threshold in grid {
        let mut tp = 0u32;
        let mut fp = 0u32;
        let mut fn_ = 0u32;
        for (score, &label) in scores.iter().zip(labels) {
            let pred = *score >= threshold;
            match (pred, label) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }
        let trades = tp + fp;
        let precision = if trades > 0 {
            f64::from(tp) / f64::from(trades)
        } else {
            0.0
        };
        let recall = if tp + fn_ > 0 {
            f64::from(tp) / f64::from(tp + fn_)
        } else {
            0.0
        };
        let expected_value = precision;

        let mut satisfied = true;
        if let Some(min) = constraints.min_precision {
            satisfied &= precision >= min;
        }
        if let Some(min) = constraints.min_recall {
            satisfied &= recall >= min;
        }
        if let Some(min) = constraints.min_trades {
            satisfied &= trades >= min;
        }
        if let Some(target) = constraints.target_ev {
            satisfied &= expected_value >= target;
        }
        if !satisfied {
            continue;
        }

        let better = best
            .as_ref()
            .map(|b| expected_value > b.expected_value)
            .unwrap_or(true);
        if better {
            best = Some(ThresholdDiagnostics {
                threshold,
                expected_value,
                precision,
                recall,
                trades,
                constraints_satisfied: true,
            });
        }
    }

    best.unwrap_or_else(ThresholdDiagnostics::fallback)
}
