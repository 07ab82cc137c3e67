use std::collections::HashMap;

use crate::records::{BetType, MatchRecord, PredictionRecord};

pub const CALIBRATION_BINS: usize = 10;
const LOG_LOSS_EPS: f64 = 1e-12;

/// Predicted probabilities paired with realized 0/1 outcomes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeSample {
    pub probs: Vec<f64>,
    pub outcomes: Vec<f64>,
}

impl OutcomeSample {
    pub fn from_pairs(pairs: &[(f64, bool)]) -> Self {
        Self {
            probs: pairs.iter().map(|(p, _)| *p).collect(),
            outcomes: pairs.iter().map(|(_, y)| if *y { 1.0 } else { 0.0 }).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// `realized − predicted`, per pair.
    pub fn residuals(&self) -> Vec<f64> {
        self.outcomes
            .iter()
            .zip(&self.probs)
            .map(|(y, p)| y - p)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointStats {
    pub samples: usize,
    pub mean_predicted: f64,
    pub base_rate: f64,
    pub gap: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationBin {
    pub bin_center: f64,
    pub count: usize,
    pub mean_predicted: Option<f64>,
    pub empirical_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scores {
    pub brier: f64,
    pub log_loss: f64,
    pub ece: f64,
}

/// Every prediction with a settled match, in `(date, fixture_id)` order. The
/// probability is the stated confidence and the outcome is whether the 1X2
/// pick came in.
pub fn outcome_sample(matches: &[MatchRecord], predictions: &[PredictionRecord]) -> OutcomeSample {
    let by_fixture: HashMap<i64, &MatchRecord> =
        matches.iter().map(|m| (m.fixture_id, m)).collect();
    let mut ordered: Vec<&PredictionRecord> = predictions.iter().collect();
    ordered.sort_by_key(|p| (p.date, p.fixture_id));

    let mut pairs = Vec::with_capacity(ordered.len());
    for p in ordered {
        let Some(m) = by_fixture.get(&p.fixture_id) else {
            continue;
        };
        // The threshold only matters for Over/Under.
        let Some(actual) = m.realized(BetType::MatchResult, 0.0) else {
            continue;
        };
        pairs.push((p.confidence, p.prediction_1x2 == actual));
    }
    OutcomeSample::from_pairs(&pairs)
}

pub fn point_stats(sample: &OutcomeSample) -> PointStats {
    if sample.is_empty() {
        return PointStats {
            samples: 0,
            mean_predicted: 0.0,
            base_rate: 0.0,
            gap: 0.0,
        };
    }
    let n = sample.len() as f64;
    let mean_predicted = sample.probs.iter().sum::<f64>() / n;
    let base_rate = sample.outcomes.iter().sum::<f64>() / n;
    PointStats {
        samples: sample.len(),
        mean_predicted,
        base_rate,
        gap: base_rate - mean_predicted,
    }
}

/// Equal-width bins over `[0, 1]`; empty bins keep their slot with `None`
/// averages.
pub fn calibration_bins(sample: &OutcomeSample, bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(1);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, y) in sample.probs.iter().zip(&sample.outcomes) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        actual_sum[idx] += y;
    }

    (0..bins)
        .map(|i| {
            let count = counts[i];
            let (mean_predicted, empirical_rate) = if count > 0 {
                (
                    Some(pred_sum[i] / count as f64),
                    Some(actual_sum[i] / count as f64),
                )
            } else {
                (None, None)
            };
            CalibrationBin {
                bin_center: (i as f64 + 0.5) / bins as f64,
                count,
                mean_predicted,
                empirical_rate,
            }
        })
        .collect()
}

pub fn calibration_curve(sample: &OutcomeSample) -> Vec<CalibrationBin> {
    calibration_bins(sample, CALIBRATION_BINS)
}

/// Count-weighted mean gap between predicted and realized rates per bin.
pub fn expected_calibration_error(bins: &[CalibrationBin]) -> f64 {
    let n: usize = bins.iter().map(|b| b.count).sum();
    if n == 0 {
        return 0.0;
    }
    bins.iter()
        .filter_map(|b| {
            let (Some(pred), Some(rate)) = (b.mean_predicted, b.empirical_rate) else {
                return None;
            };
            Some(b.count as f64 / n as f64 * (pred - rate).abs())
        })
        .sum()
}

pub fn evaluate(sample: &OutcomeSample) -> Scores {
    if sample.is_empty() {
        return Scores::default();
    }
    let n = sample.len() as f64;
    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    for (p, y) in sample.probs.iter().zip(&sample.outcomes) {
        brier_sum += (p - y).powi(2);
        let p = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
        log_loss_sum += -(y * p.ln() + (1.0 - y) * (1.0 - p).ln());
    }
    Scores {
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        ece: expected_calibration_error(&calibration_curve(sample)),
    }
}
