//! Rolling train/test windows over the settled ledger.
//!
//! Each window pairs a training span with the test span that immediately
//! follows it. Windows advance by `step_months` from the first bet date and
//! stop once a full train+test span no longer fits before the last bet
//! date. Windows whose spans hold too few bets are dropped.

use chrono::{Days, NaiveDate};

use crate::config::WalkForwardConfig;
use crate::performance;
use crate::records::BetRecord;
use crate::stats;

const DAYS_PER_MONTH: u64 = 30;
const OVERFIT_RATIO: f64 = 1.5;
const DEGRADATION_RATIO: f64 = 0.7;
const DEGRADATION_SPAN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMetrics {
    pub bets: usize,
    pub win_rate: f64,
    pub profit: f64,
    pub roi: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub profit_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub train: WindowMetrics,
    pub test: WindowMetrics,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkForward {
    pub windows: Vec<Window>,
    /// Mean of each test metric over the windows, non-finite values skipped.
    pub overall: Option<WindowMetrics>,
    pub stability_score: f64,
    pub overfitting_detected: bool,
    pub performance_degradation: bool,
}

/// Bets dated in `[start, end)`. The ledger is in date order.
fn span(ledger: &[BetRecord], start: NaiveDate, end: NaiveDate) -> &[BetRecord] {
    let lo = ledger.partition_point(|b| b.date < start);
    let hi = ledger.partition_point(|b| b.date < end);
    &ledger[lo..hi.max(lo)]
}

pub fn window_metrics(bets: &[BetRecord], risk_free_rate: f64) -> WindowMetrics {
    let pnl = performance::pnl_series(bets);
    let wins = bets.iter().filter(|b| b.is_win()).count();
    let stake: f64 = bets.iter().map(|b| b.stake).sum();
    let profit: f64 = pnl.iter().sum();
    WindowMetrics {
        bets: bets.len(),
        win_rate: if bets.is_empty() {
            0.0
        } else {
            100.0 * wins as f64 / bets.len() as f64
        },
        profit,
        roi: performance::roi(profit, stake),
        sharpe: stats::sharpe(&pnl, risk_free_rate),
        sortino: stats::sortino(&pnl, risk_free_rate),
        max_drawdown: stats::drawdown_walk(&pnl).max_drawdown,
        profit_factor: performance::profit_factor(&pnl),
    }
}

fn months(n: u32) -> Days {
    Days::new(u64::from(n) * DAYS_PER_MONTH)
}

pub fn analyze(
    ledger: &[BetRecord],
    config: &WalkForwardConfig,
    risk_free_rate: f64,
) -> WalkForward {
    let (Some(first), Some(last)) = (ledger.first(), ledger.last()) else {
        return WalkForward::default();
    };
    let (first, last) = (first.date, last.date);

    let mut windows = Vec::new();
    let mut cursor = first;
    loop {
        let Some(train_end) = cursor.checked_add_days(months(config.train_months)) else {
            break;
        };
        let Some(test_end) = train_end.checked_add_days(months(config.test_months)) else {
            break;
        };
        if test_end > last {
            break;
        }
        let train = span(ledger, cursor, train_end);
        let test = span(ledger, train_end, test_end);
        if train.len() >= config.min_train_bets && test.len() >= config.min_test_bets {
            windows.push(Window {
                train_start: cursor,
                train_end,
                test_start: train_end,
                test_end,
                train: window_metrics(train, risk_free_rate),
                test: window_metrics(test, risk_free_rate),
            });
        }
        match cursor.checked_add_days(months(config.step_months)) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    let train_sharpe: Vec<f64> = windows.iter().map(|w| w.train.sharpe).collect();
    let test_sharpe: Vec<f64> = windows.iter().map(|w| w.test.sharpe).collect();
    let (stability_score, overfitting_detected, performance_degradation) =
        stability(&train_sharpe, &test_sharpe);

    WalkForward {
        overall: overall(&windows),
        windows,
        stability_score,
        overfitting_detected,
        performance_degradation,
    }
}

/// `σ/|μ|`, 0 when the mean vanishes.
fn coefficient_of_variation(values: &[f64]) -> f64 {
    let mu = stats::mean(values);
    if mu == 0.0 {
        return 0.0;
    }
    stats::std_population(values) / mu.abs()
}

/// Stability in [0, 1] from the Sharpe spread across windows, plus the
/// overfitting and degradation flags. Needs at least two windows.
pub fn stability(train_sharpe: &[f64], test_sharpe: &[f64]) -> (f64, bool, bool) {
    if train_sharpe.len() < 2 || test_sharpe.len() < 2 {
        return (0.0, false, false);
    }
    let cv = (coefficient_of_variation(train_sharpe) + coefficient_of_variation(test_sharpe)) / 2.0;
    let score = (1.0 - cv).clamp(0.0, 1.0);

    let overfit = stats::mean(train_sharpe) > stats::mean(test_sharpe) * OVERFIT_RATIO;
    let degraded = test_sharpe.len() >= DEGRADATION_SPAN && {
        let early = stats::mean(&test_sharpe[..DEGRADATION_SPAN]);
        let recent = stats::mean(&test_sharpe[test_sharpe.len() - DEGRADATION_SPAN..]);
        recent < early * DEGRADATION_RATIO
    };
    (score, overfit, degraded)
}

fn finite_mean(values: impl Iterator<Item = f64>) -> f64 {
    let kept: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    stats::mean(&kept)
}

fn overall(windows: &[Window]) -> Option<WindowMetrics> {
    if windows.is_empty() {
        return None;
    }
    let tests = || windows.iter().map(|w| w.test);
    Some(WindowMetrics {
        bets: tests().map(|m| m.bets).sum::<usize>() / windows.len(),
        win_rate: finite_mean(tests().map(|m| m.win_rate)),
        profit: finite_mean(tests().map(|m| m.profit)),
        roi: finite_mean(tests().map(|m| m.roi)),
        sharpe: finite_mean(tests().map(|m| m.sharpe)),
        sortino: finite_mean(tests().map(|m| m.sortino)),
        max_drawdown: finite_mean(tests().map(|m| m.max_drawdown)),
        profit_factor: finite_mean(tests().map(|m| m.profit_factor)),
    })
}

#[cfg(test)]
mod tests {
    use super::{analyze, stability, window_metrics};
    use crate::config::WalkForwardConfig;
    use crate::records::{BetRecord, BetResult, BetType, Pick};
    use chrono::{Days, NaiveDate};

    fn bet(date: NaiveDate, win: bool) -> BetRecord {
        BetRecord {
            date,
            fixture_id: 1,
            league: "L".to_string(),
            home_team: "H".to_string(),
            away_team: "A".to_string(),
            bet_type: BetType::MatchResult,
            prediction: Pick::Home,
            odds: 2.0,
            stake: 10.0,
            confidence: 0.7,
            actual_result: if win { Pick::Home } else { Pick::Away },
            bet_result: if win { BetResult::Win } else { BetResult::Loss },
            profit_loss: if win { 10.0 } else { -10.0 },
            roi: if win { 100.0 } else { -100.0 },
        }
    }

    /// One bet a day for `days` days, winning two days out of three.
    fn daily_ledger(days: u64) -> Vec<BetRecord> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        (0..days)
            .map(|d| bet(start + Days::new(d), d % 3 != 0))
            .collect()
    }

    fn short_windows() -> WalkForwardConfig {
        WalkForwardConfig {
            train_months: 2,
            test_months: 1,
            step_months: 1,
            min_train_bets: 30,
            min_test_bets: 10,
        }
    }

    #[test]
    fn windows_tile_the_ledger() {
        let ledger = daily_ledger(200);
        let wf = analyze(&ledger, &short_windows(), 0.0);
        // Starts at day 0, 30, ..., 90; day 120 would end at day 210.
        assert_eq!(wf.windows.len(), 4);
        let w = &wf.windows[1];
        assert_eq!((w.train_end - w.train_start).num_days(), 60);
        assert_eq!(w.test_start, w.train_end);
        assert_eq!(w.train.bets, 60);
        assert_eq!(w.test.bets, 30);
        assert!(wf.overall.is_some_and(|m| m.bets == 30));
    }

    #[test]
    fn thin_windows_are_dropped() {
        let ledger = daily_ledger(200);
        let cfg = WalkForwardConfig {
            min_test_bets: 31,
            ..short_windows()
        };
        let wf = analyze(&ledger, &cfg, 0.0);
        assert!(wf.windows.is_empty());
        assert!(wf.overall.is_none());
        assert_eq!(wf.stability_score, 0.0);
        assert!(!wf.overfitting_detected);
    }

    #[test]
    fn short_history_has_no_windows() {
        let wf = analyze(&daily_ledger(20), &WalkForwardConfig::default(), 0.0);
        assert!(wf.windows.is_empty());
        assert!(analyze(&[], &WalkForwardConfig::default(), 0.0).windows.is_empty());
    }

    #[test]
    fn identical_windows_are_perfectly_stable() {
        let (score, overfit, degraded) = stability(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]);
        assert_eq!(score, 1.0);
        assert!(!overfit);
        assert!(!degraded);
        assert_eq!(stability(&[1.0], &[1.0]), (0.0, false, false));
    }

    #[test]
    fn flags_follow_sharpe_ratios() {
        let (_, overfit, _) = stability(&[2.0, 2.0], &[1.0, 1.0]);
        assert!(overfit);
        let (_, _, degraded) = stability(&[1.0; 6], &[1.0, 1.0, 1.0, 0.5, 0.5, 0.5]);
        assert!(degraded);
        let (score, _, _) = stability(&[1.0, 3.0], &[1.0, 3.0]);
        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn metrics_cover_a_span() {
        let ledger = daily_ledger(3);
        let m = window_metrics(&ledger, 0.0);
        assert_eq!(m.bets, 3);
        assert!((m.win_rate - 200.0 / 3.0).abs() < 1e-9);
        assert!((m.profit - 10.0).abs() < 1e-9);
        assert!((m.profit_factor - 2.0).abs() < 1e-9);
        assert_eq!(window_metrics(&[], 0.0).sharpe, 0.0);
    }
}
