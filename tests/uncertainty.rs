use bet_backtest::calibration::{self, OutcomeSample};
use bet_backtest::stats;
use bet_backtest::uncertainty::{self, CiMethod, UncertaintyOptions};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn sample(n: usize) -> OutcomeSample {
    let pairs: Vec<(f64, bool)> = (0..n)
        .map(|i| {
            let p = 0.5 + (i % 9) as f64 * 0.05;
            (p, (i * 7) % 10 < 6)
        })
        .collect();
    OutcomeSample::from_pairs(&pairs)
}

fn options(levels: &[f64], seed: u64) -> UncertaintyOptions<'_> {
    UncertaintyOptions {
        levels,
        bootstrap_samples: 500,
        rng_seed: seed,
    }
}

#[test]
fn scenario_f_same_seed_same_intervals() {
    let levels = [0.68, 0.90, 0.95];
    let s = sample(60);
    let first = uncertainty::analyze(&s, options(&levels, 42));
    let second = uncertainty::analyze(&s, options(&levels, 42));
    assert_eq!(first.confidence_intervals, second.confidence_intervals);
    assert_eq!(first.prediction_intervals, second.prediction_intervals);
    assert_eq!(first, second);
}

#[test]
fn different_seed_moves_bootstrap_but_not_conformal() {
    let levels = [0.90];
    let s = sample(60);
    let a = uncertainty::analyze(&s, options(&levels, 1));
    let b = uncertainty::analyze(&s, options(&levels, 2));
    assert_ne!(a.confidence_intervals, b.confidence_intervals);
    assert_eq!(a.prediction_intervals, b.prediction_intervals);
}

#[test]
fn bootstrap_engine_is_reproducible() {
    let values: Vec<f64> = (0..25).map(|i| i as f64 / 25.0).collect();
    let mut r1 = StdRng::seed_from_u64(7);
    let mut r2 = StdRng::seed_from_u64(7);
    let b1 = stats::bootstrap(&values, 300, &mut r1, stats::mean);
    let b2 = stats::bootstrap(&values, 300, &mut r2, stats::mean);
    assert_eq!(b1.len(), 300);
    assert_eq!(b1, b2);
}

#[test]
fn calibration_always_has_ten_bins() {
    for n in [0, 1, 5, 200] {
        let curve = calibration::calibration_curve(&sample(n));
        assert_eq!(curve.len(), 10);
        let counted: usize = curve.iter().map(|b| b.count).sum();
        assert_eq!(counted, n);
    }
}

#[test]
fn every_method_reports_every_level() {
    let levels = [0.68, 0.80, 0.90, 0.95, 0.99];
    let u = uncertainty::analyze(&sample(40), options(&levels, 42));
    let methods: Vec<CiMethod> = u.confidence_intervals.iter().map(|(m, _)| *m).collect();
    assert_eq!(methods, CiMethod::ALL.to_vec());
    for (_, by_level) in &u.confidence_intervals {
        let got: Vec<f64> = by_level.iter().map(|(l, _)| *l).collect();
        assert_eq!(got, levels.to_vec());
        assert!(by_level.iter().all(|(_, ci)| ci.is_some_and(|ci| ci.lower <= ci.upper)));
    }
    let keys: Vec<&str> = u.coverage.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec!["percentile", "bias_corrected", "studentized", "conformal"]);
    for (_, by_level) in &u.coverage {
        for (level, cov) in by_level {
            let cov = cov.expect("non-empty sample has coverage");
            assert_eq!(cov.expected, *level);
            assert!((0.0..=1.0).contains(&cov.actual));
        }
    }
}

#[test]
fn scores_are_bounded() {
    let s = sample(80);
    let scores = calibration::evaluate(&s);
    assert!((0.0..=1.0).contains(&scores.brier));
    assert!(scores.log_loss > 0.0 && scores.log_loss.is_finite());
    assert!((0.0..=1.0).contains(&scores.ece));
}
