//! Pure numeric routines shared by the simulator, the aggregators and the
//! uncertainty engine.
//!
//! Every scalar statistic returns `0.0` on empty input and every
//! distributional routine returns an empty vector (or `None` for intervals).
//! Nothing here panics on data.

use rand::Rng;
use rand::rngs::StdRng;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Below this sample size the studentized interval uses Student's t.
pub const SMALL_SAMPLE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawdownWalk {
    pub cumulative: Vec<f64>,
    pub running_max: Vec<f64>,
    pub drawdown: Vec<f64>,
    pub max_drawdown: f64,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Bessel-corrected standard deviation; `0.0` for fewer than two values.
pub fn std_sample(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

pub fn std_population(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Type-7 quantile (linear interpolation between order statistics), `q` in
/// `[0, 1]`.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    percentile_sorted(&sorted(values), q)
}

pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

pub fn drawdown_walk(pnl: &[f64]) -> DrawdownWalk {
    let mut walk = DrawdownWalk {
        cumulative: Vec::with_capacity(pnl.len()),
        running_max: Vec::with_capacity(pnl.len()),
        drawdown: Vec::with_capacity(pnl.len()),
        max_drawdown: 0.0,
    };
    let mut total = 0.0_f64;
    let mut peak = f64::NEG_INFINITY;
    for v in pnl {
        total += v;
        peak = peak.max(total);
        let dd = peak - total;
        walk.cumulative.push(total);
        walk.running_max.push(peak);
        walk.drawdown.push(dd);
        walk.max_drawdown = walk.max_drawdown.max(dd);
    }
    walk
}

/// Largest peak-to-trough fall of `initial + cumulative P&L`, in percent of
/// the peak. The peak starts at the initial capital.
pub fn max_drawdown_pct(initial_capital: f64, pnl: &[f64]) -> f64 {
    let mut capital = initial_capital;
    let mut peak = initial_capital;
    let mut worst = 0.0_f64;
    for v in pnl {
        capital += v;
        peak = peak.max(capital);
        if peak > 0.0 {
            worst = worst.max(100.0 * (peak - capital) / peak);
        }
    }
    worst
}

pub fn sharpe(returns: &[f64], risk_free: f64) -> f64 {
    let sd = std_sample(returns);
    if sd == 0.0 {
        return 0.0;
    }
    (mean(returns) - risk_free) / sd
}

pub fn sortino(returns: &[f64], risk_free: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let excess = mean(returns) - risk_free;
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let sd = std_sample(&downside);
    if sd == 0.0 {
        return if excess > 0.0 { f64::INFINITY } else { 0.0 };
    }
    excess / sd
}

pub fn calmar(annualized_roi: f64, max_drawdown_pct: f64) -> f64 {
    if max_drawdown_pct == 0.0 {
        return 0.0;
    }
    annualized_roi / max_drawdown_pct
}

/// Moment skewness (biased estimator).
pub fn skewness(values: &[f64]) -> f64 {
    let m2 = central_moment(values, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    central_moment(values, 3) / m2.powf(1.5)
}

pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let m2 = central_moment(values, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    central_moment(values, 4) / (m2 * m2) - 3.0
}

fn central_moment(values: &[f64], order: i32) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(order)).sum::<f64>() / values.len() as f64
}

pub fn value_at_risk(values: &[f64], q: f64) -> f64 {
    percentile(values, q)
}

/// Mean of the tail at or below the `q` value at risk.
pub fn conditional_value_at_risk(values: &[f64], q: f64) -> f64 {
    let var = value_at_risk(values, q);
    let tail: Vec<f64> = values.iter().copied().filter(|v| *v <= var).collect();
    mean(&tail)
}

/// Draws `samples` resamples of `sample.len()` values with replacement and
/// applies `statistic` to each.
pub fn bootstrap<F>(sample: &[f64], samples: usize, rng: &mut StdRng, statistic: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = sample.len();
    if n == 0 {
        return Vec::new();
    }
    let mut scratch = vec![0.0_f64; n];
    let mut out = Vec::with_capacity(samples);
    for _ in 0..samples {
        for slot in scratch.iter_mut() {
            *slot = sample[rng.gen_range(0..n)];
        }
        out.push(statistic(&scratch));
    }
    out
}

pub fn ci_percentile(boot: &[f64], level: f64) -> Option<Interval> {
    if boot.is_empty() {
        return None;
    }
    let alpha = 1.0 - level;
    let s = sorted(boot);
    Some(Interval {
        lower: percentile_sorted(&s, alpha / 2.0),
        upper: percentile_sorted(&s, 1.0 - alpha / 2.0),
    })
}

pub fn ci_bias_corrected(boot: &[f64], point: f64, level: f64) -> Option<Interval> {
    let bias = mean(boot) - point;
    let shifted: Vec<f64> = boot.iter().map(|v| v - bias).collect();
    ci_percentile(&shifted, level)
}

/// `point ± critical · std(boot)`, with Student's t on `n − 1` degrees of
/// freedom for small samples.
pub fn ci_studentized(boot: &[f64], point: f64, n: usize, level: f64) -> Option<Interval> {
    if boot.is_empty() {
        return None;
    }
    let half = critical_value(n, level) * std_sample(boot);
    Some(Interval {
        lower: point - half,
        upper: point + half,
    })
}

pub fn critical_value(n: usize, level: f64) -> f64 {
    let p = 1.0 - (1.0 - level) / 2.0;
    if (2..SMALL_SAMPLE).contains(&n)
        && let Ok(t) = StudentsT::new(0.0, 1.0, (n - 1) as f64)
    {
        return t.inverse_cdf(p);
    }
    Normal::new(0.0, 1.0)
        .map(|d| d.inverse_cdf(p))
        .unwrap_or(0.0)
}

/// Split conformal interval: `point ± Q_level(|residual|)`.
pub fn conformal_interval(residuals: &[f64], point: f64, level: f64) -> Option<Interval> {
    if residuals.is_empty() {
        return None;
    }
    let abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    let q = percentile(&abs, level);
    Some(Interval {
        lower: point - q,
        upper: point + q,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn drawdown_walk_tracks_running_max() {
        let walk = drawdown_walk(&[10.0, -5.0, -10.0, 20.0]);
        assert_eq!(walk.cumulative, vec![10.0, 5.0, -5.0, 15.0]);
        assert_eq!(walk.running_max, vec![10.0, 10.0, 10.0, 15.0]);
        assert_eq!(walk.drawdown, vec![0.0, 5.0, 15.0, 0.0]);
        assert_eq!(walk.max_drawdown, 15.0);
    }

    #[test]
    fn empty_inputs_are_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_sample(&[1.0]), 0.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
        assert_eq!(drawdown_walk(&[]).max_drawdown, 0.0);
        assert_eq!(sharpe(&[], 0.005), 0.0);
        assert_eq!(sortino(&[], 0.005), 0.0);
        assert!(ci_percentile(&[], 0.9).is_none());
        assert!(conformal_interval(&[], 0.5, 0.9).is_none());
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert!(close(percentile(&v, 0.0), 1.0));
        assert!(close(percentile(&v, 0.5), 2.5));
        assert!(close(percentile(&v, 0.9), 3.7));
        assert!(close(percentile(&v, 1.0), 4.0));
    }

    #[test]
    fn std_variants_differ_by_ddof() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(std_population(&v), 2.0));
        assert!(close(std_sample(&v), (32.0_f64 / 7.0).sqrt()));
    }

    #[test]
    fn sortino_without_losses_is_infinite() {
        assert_eq!(sortino(&[10.0, 20.0], 0.005), f64::INFINITY);
        assert_eq!(sortino(&[0.0, 0.0], 0.005), 0.0);
    }

    #[test]
    fn capital_drawdown_pct_uses_initial_peak() {
        let dd = max_drawdown_pct(100.0, &[-10.0, 5.0, -15.0]);
        assert!(close(dd, 20.0));
        assert_eq!(max_drawdown_pct(100.0, &[5.0, 5.0]), 0.0);
    }

    #[test]
    fn bootstrap_is_reproducible_per_seed() {
        let sample = [0.1, 0.4, 0.35, 0.8, 0.9, 0.55];
        let a = bootstrap(&sample, 200, &mut StdRng::seed_from_u64(42), mean);
        let b = bootstrap(&sample, 200, &mut StdRng::seed_from_u64(42), mean);
        let c = bootstrap(&sample, 200, &mut StdRng::seed_from_u64(43), mean);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 200);
    }

    #[test]
    fn studentized_uses_t_for_small_samples() {
        assert!(critical_value(5, 0.95) > critical_value(100, 0.95));
        assert!((critical_value(100, 0.95) - 1.959964).abs() < 1e-4);
        let ci = ci_studentized(&[1.0, 2.0, 3.0], 2.0, 100, 0.95).unwrap();
        assert!(close(ci.lower + ci.upper, 4.0));
    }

    #[test]
    fn bias_corrected_recenters_on_point() {
        let boot = [1.0, 2.0, 3.0];
        let ci = ci_bias_corrected(&boot, 0.0, 0.5).unwrap();
        let raw = ci_percentile(&boot, 0.5).unwrap();
        assert!(close(raw.lower - ci.lower, 2.0));
        assert!(close(raw.upper - ci.upper, 2.0));
    }

    #[test]
    fn cvar_is_tail_mean() {
        let v: Vec<f64> = (1..=20).map(f64::from).collect();
        let var = value_at_risk(&v, 0.05);
        assert!(close(var, 1.95));
        assert!(close(conditional_value_at_risk(&v, 0.05), 1.0));
    }
}
