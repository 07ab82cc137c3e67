use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::calibration::{self, CalibrationBin, OutcomeSample, PointStats, Scores};
use crate::stats::{self, Interval};

const STABILITY_BLOCKS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiMethod {
    Percentile,
    BiasCorrected,
    Studentized,
}

impl CiMethod {
    pub const ALL: [CiMethod; 3] = [
        CiMethod::Percentile,
        CiMethod::BiasCorrected,
        CiMethod::Studentized,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CiMethod::Percentile => "percentile",
            CiMethod::BiasCorrected => "bias_corrected",
            CiMethod::Studentized => "studentized",
        }
    }
}

/// One value per configured confidence level, in configured order.
pub type ByLevel<T> = Vec<(f64, T)>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coverage {
    pub expected: f64,
    pub actual: f64,
    pub gap: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quality {
    pub bias: f64,
    pub se: f64,
    pub efficiency: f64,
    /// `None` when the bootstrap is too short or too flat to split into blocks.
    pub stability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Uncertainty {
    pub point: PointStats,
    pub calibration: Vec<CalibrationBin>,
    pub confidence_intervals: Vec<(CiMethod, ByLevel<Option<Interval>>)>,
    pub prediction_intervals: ByLevel<Option<Interval>>,
    /// Keyed by CI method name plus `conformal`.
    pub coverage: Vec<(&'static str, ByLevel<Option<Coverage>>)>,
    pub quality: Quality,
    pub scores: Scores,
}

#[derive(Debug, Clone, Copy)]
pub struct UncertaintyOptions<'a> {
    pub levels: &'a [f64],
    pub bootstrap_samples: usize,
    pub rng_seed: u64,
}

/// Fraction of realized outcomes inside `interval`.
pub fn coverage(outcomes: &[f64], interval: Interval, level: f64) -> Option<Coverage> {
    if outcomes.is_empty() {
        return None;
    }
    let inside = outcomes.iter().filter(|y| interval.contains(**y)).count();
    let actual = inside as f64 / outcomes.len() as f64;
    Some(Coverage {
        expected: level,
        actual,
        gap: (level - actual).abs(),
    })
}

pub fn confidence_interval(
    method: CiMethod,
    boot: &[f64],
    point: f64,
    n: usize,
    level: f64,
) -> Option<Interval> {
    match method {
        CiMethod::Percentile => stats::ci_percentile(boot, level),
        CiMethod::BiasCorrected => stats::ci_bias_corrected(boot, point, level),
        CiMethod::Studentized => stats::ci_studentized(boot, point, n, level),
    }
}

/// Bias, standard error, width efficiency and block stability of one
/// bootstrap distribution.
pub fn bootstrap_quality(boot: &[f64], point: f64, widths: &[f64]) -> Quality {
    if boot.is_empty() {
        return Quality::default();
    }
    let mean_width = stats::mean(widths);
    Quality {
        bias: (stats::mean(boot) - point).abs(),
        se: stats::std_population(boot),
        efficiency: if mean_width > 0.0 {
            100.0 / (1.0 + mean_width)
        } else {
            0.0
        },
        stability: block_stability(boot),
    }
}

/// `100 − 100·σ(SE)/μ(SE)` over ten consecutive blocks, clipped to [0, 100].
pub fn block_stability(boot: &[f64]) -> Option<f64> {
    let block = boot.len() / STABILITY_BLOCKS;
    if block == 0 {
        return None;
    }
    let ses: Vec<f64> = boot
        .chunks_exact(block)
        .take(STABILITY_BLOCKS)
        .map(stats::std_population)
        .collect();
    let mean_se = stats::mean(&ses);
    if mean_se <= 0.0 {
        return None;
    }
    Some((100.0 - 100.0 * stats::std_population(&ses) / mean_se).clamp(0.0, 100.0))
}

pub fn analyze(sample: &OutcomeSample, opts: UncertaintyOptions<'_>) -> Uncertainty {
    let point = calibration::point_stats(sample);
    let estimate = point.mean_predicted;
    let n = sample.len();

    let mut rng = StdRng::seed_from_u64(opts.rng_seed);
    let boot = stats::bootstrap(&sample.probs, opts.bootstrap_samples, &mut rng, stats::mean);

    let mut widths = Vec::new();
    let mut confidence_intervals = Vec::with_capacity(CiMethod::ALL.len());
    let mut coverage_rows = Vec::with_capacity(CiMethod::ALL.len() + 1);
    for method in CiMethod::ALL {
        let mut intervals = Vec::with_capacity(opts.levels.len());
        let mut covers = Vec::with_capacity(opts.levels.len());
        for &level in opts.levels {
            let ci = confidence_interval(method, &boot, estimate, n, level);
            if let Some(ci) = ci {
                widths.push(ci.width());
            }
            intervals.push((level, ci));
            covers.push((level, ci.and_then(|ci| coverage(&sample.outcomes, ci, level))));
        }
        confidence_intervals.push((method, intervals));
        coverage_rows.push((method.key(), covers));
    }

    let residuals = sample.residuals();
    let mut prediction_intervals = Vec::with_capacity(opts.levels.len());
    let mut conformal_covers = Vec::with_capacity(opts.levels.len());
    for &level in opts.levels {
        let pi = stats::conformal_interval(&residuals, estimate, level);
        prediction_intervals.push((level, pi));
        conformal_covers.push((level, pi.and_then(|pi| coverage(&sample.outcomes, pi, level))));
    }
    coverage_rows.push(("conformal", conformal_covers));

    Uncertainty {
        point,
        calibration: calibration::calibration_curve(sample),
        confidence_intervals,
        prediction_intervals,
        coverage: coverage_rows,
        quality: bootstrap_quality(&boot, estimate, &widths),
        scores: calibration::evaluate(sample),
    }
}
