use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};

use crate::config::{BacktestConfig, ConfidenceBand};
use crate::records::{BetRecord, BetResult, BetType};
use crate::stats;

/// Tail share cut off by the 95% VaR.
const VAR_TAIL: f64 = 0.05;
const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub win_rate: f64,
    pub total_stake: f64,
    pub total_profit: f64,
    pub total_roi: f64,
    pub average_odds: f64,
    pub average_confidence: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub profit_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStats {
    pub key: String,
    pub bets: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub stake: f64,
    pub profit: f64,
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandStats {
    pub band: ConfidenceBand,
    pub stats: SegmentStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub roi: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extremes {
    pub best: Option<String>,
    pub worst: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerPeriod {
    pub daily: BTreeMap<String, f64>,
    pub weekly: BTreeMap<String, f64>,
    pub monthly: BTreeMap<String, f64>,
    pub rolling: Vec<RollingPoint>,
    pub daily_extremes: Extremes,
    pub weekly_extremes: Extremes,
    pub monthly_extremes: Extremes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceRating {
    Excellent,
    VeryGood,
    Good,
    Regular,
    NeedsImprovement,
}

impl PerformanceRating {
    pub fn label(self) -> &'static str {
        match self {
            PerformanceRating::Excellent => "EXCELLENT",
            PerformanceRating::VeryGood => "VERY_GOOD",
            PerformanceRating::Good => "GOOD",
            PerformanceRating::Regular => "REGULAR",
            PerformanceRating::NeedsImprovement => "NEEDS_IMPROVEMENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskRating {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskRating {
    pub fn label(self) -> &'static str {
        match self {
            RiskRating::Low => "LOW",
            RiskRating::Moderate => "MODERATE",
            RiskRating::High => "HIGH",
            RiskRating::VeryHigh => "VERY_HIGH",
        }
    }

    pub fn from_sharpe(sharpe: f64) -> Self {
        if sharpe > 1.5 {
            RiskRating::Low
        } else if sharpe > 1.0 {
            RiskRating::Moderate
        } else if sharpe > 0.5 {
            RiskRating::High
        } else {
            RiskRating::VeryHigh
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Benchmark {
    pub benchmark_roi: f64,
    pub excess_return: f64,
    pub tracking_error: f64,
    pub information_ratio: f64,
    pub outperforms: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Returns {
    pub final_capital: f64,
    pub compound_roi: f64,
    pub annualized_roi: f64,
    pub risk_adjusted_roi: f64,
    pub max_drawdown_pct: f64,
    pub volatility: f64,
    pub var_95: f64,
    pub cvar_95: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub performance_rating: PerformanceRating,
    pub risk_rating: RiskRating,
    pub benchmark: Benchmark,
}

pub fn roi(profit: f64, stake: f64) -> f64 {
    if stake == 0.0 {
        return 0.0;
    }
    100.0 * profit / stake
}

pub fn pnl_series(ledger: &[BetRecord]) -> Vec<f64> {
    ledger.iter().map(|b| b.profit_loss).collect()
}

pub fn roi_series(ledger: &[BetRecord]) -> Vec<f64> {
    ledger.iter().map(|b| b.roi).collect()
}

/// `Σ positive P&L / |Σ negative P&L|`; `+inf` without losses, `0` when
/// both sides vanish.
pub fn profit_factor(pnl: &[f64]) -> f64 {
    let gains: f64 = pnl.iter().filter(|v| **v > 0.0).sum();
    let losses: f64 = pnl.iter().filter(|v| **v < 0.0).map(|v| v.abs()).sum();
    if losses == 0.0 {
        return if gains > 0.0 { f64::INFINITY } else { 0.0 };
    }
    gains / losses
}

pub fn period_range(ledger: &[BetRecord]) -> PeriodRange {
    let start = ledger.iter().map(|b| b.date).min();
    let end = ledger.iter().map(|b| b.date).max();
    let days = match (start, end) {
        (Some(s), Some(e)) => (e - s).num_days(),
        _ => 0,
    };
    PeriodRange { start, end, days }
}

pub fn totals(ledger: &[BetRecord], config: &BacktestConfig) -> Totals {
    if ledger.is_empty() {
        return Totals::default();
    }
    let pnl = pnl_series(ledger);
    let bets = ledger.len();
    let wins = ledger.iter().filter(|b| b.bet_result == BetResult::Win).count();
    let losses = ledger.iter().filter(|b| b.bet_result == BetResult::Loss).count();
    let pushes = ledger.iter().filter(|b| b.bet_result == BetResult::Push).count();
    let total_stake: f64 = ledger.iter().map(|b| b.stake).sum();
    let total_profit: f64 = pnl.iter().sum();
    let odds: Vec<f64> = ledger.iter().map(|b| b.odds).collect();
    let confidences: Vec<f64> = ledger.iter().map(|b| b.confidence).collect();

    let dd_pct = stats::max_drawdown_pct(config.initial_capital, &pnl);
    let annualized = annualized_roi(ledger, config.initial_capital);

    Totals {
        bets,
        wins,
        losses,
        pushes,
        win_rate: 100.0 * wins as f64 / bets as f64,
        total_stake,
        total_profit,
        total_roi: roi(total_profit, total_stake),
        average_odds: stats::mean(&odds),
        average_confidence: stats::mean(&confidences),
        sharpe: stats::sharpe(&pnl, config.risk_free_rate),
        sortino: stats::sortino(&pnl, config.risk_free_rate),
        calmar: stats::calmar(annualized, dd_pct),
        max_drawdown: stats::drawdown_walk(&pnl).max_drawdown,
        profit_factor: profit_factor(&pnl),
    }
}

/// Geometric mean monthly growth over the distinct calendar months bet on.
pub fn compound_roi(ledger: &[BetRecord], initial_capital: f64) -> f64 {
    let months: BTreeSet<(i32, u32)> = ledger
        .iter()
        .map(|b| (b.date.year(), b.date.month()))
        .collect();
    if months.is_empty() || initial_capital <= 0.0 {
        return 0.0;
    }
    let final_capital = initial_capital + ledger.iter().map(|b| b.profit_loss).sum::<f64>();
    growth_rate(final_capital / initial_capital, months.len() as f64)
}

pub fn annualized_roi(ledger: &[BetRecord], initial_capital: f64) -> f64 {
    let range = period_range(ledger);
    if range.days == 0 || initial_capital <= 0.0 {
        return 0.0;
    }
    let total_profit: f64 = ledger.iter().map(|b| b.profit_loss).sum();
    let years = range.days as f64 / DAYS_PER_YEAR;
    growth_rate(1.0 + total_profit / initial_capital, years)
}

fn growth_rate(ratio: f64, periods: f64) -> f64 {
    if ratio <= 0.0 {
        return -100.0;
    }
    (ratio.powf(1.0 / periods) - 1.0) * 100.0
}

pub fn risk_adjusted_roi(pnl: &[f64]) -> f64 {
    let sd = stats::std_sample(pnl);
    if sd == 0.0 {
        return 0.0;
    }
    100.0 * stats::mean(pnl) / sd
}

pub fn benchmark(ledger: &[BetRecord], annualized: f64, benchmark_roi: f64) -> Benchmark {
    let daily_benchmark = benchmark_roi / 365.0;
    let active: Vec<f64> = ledger.iter().map(|b| b.roi - daily_benchmark).collect();
    let tracking_error = stats::std_sample(&active);
    let excess_return = annualized - benchmark_roi;
    Benchmark {
        benchmark_roi,
        excess_return,
        tracking_error,
        information_ratio: if tracking_error == 0.0 {
            0.0
        } else {
            excess_return / tracking_error
        },
        outperforms: excess_return > 0.0,
    }
}

/// Points: ROI 40, win rate 30, Sharpe 20, drawdown 10.
pub fn performance_rating(totals: &Totals, max_drawdown_pct: f64) -> PerformanceRating {
    let roi_points = step_points(
        totals.total_roi,
        &[(20.0, 40), (10.0, 30), (5.0, 20), (0.0, 10)],
    );
    let win_points = step_points(
        totals.win_rate,
        &[(70.0, 30), (60.0, 25), (50.0, 15), (40.0, 10)],
    );
    let sharpe_points = step_points(totals.sharpe, &[(2.0, 20), (1.0, 15), (0.5, 10), (0.0, 5)]);
    let dd_points = [(10.0, 10), (20.0, 7), (30.0, 5), (50.0, 3)]
        .iter()
        .find(|(limit, _)| max_drawdown_pct < *limit)
        .map(|(_, pts)| *pts)
        .unwrap_or(0);

    match roi_points + win_points + sharpe_points + dd_points {
        s if s >= 85 => PerformanceRating::Excellent,
        s if s >= 70 => PerformanceRating::VeryGood,
        s if s >= 55 => PerformanceRating::Good,
        s if s >= 40 => PerformanceRating::Regular,
        _ => PerformanceRating::NeedsImprovement,
    }
}

fn step_points(value: f64, steps: &[(f64, u32)]) -> u32 {
    steps
        .iter()
        .find(|(threshold, _)| value > *threshold)
        .map(|(_, pts)| *pts)
        .unwrap_or(0)
}

pub fn returns(ledger: &[BetRecord], totals: &Totals, config: &BacktestConfig) -> Returns {
    let pnl = pnl_series(ledger);
    let rois = roi_series(ledger);
    let max_drawdown_pct = stats::max_drawdown_pct(config.initial_capital, &pnl);
    let annualized = annualized_roi(ledger, config.initial_capital);
    Returns {
        final_capital: config.initial_capital + totals.total_profit,
        compound_roi: compound_roi(ledger, config.initial_capital),
        annualized_roi: annualized,
        risk_adjusted_roi: risk_adjusted_roi(&pnl),
        max_drawdown_pct,
        volatility: stats::std_sample(&rois),
        var_95: stats::value_at_risk(&rois, VAR_TAIL),
        cvar_95: stats::conditional_value_at_risk(&rois, VAR_TAIL),
        skewness: stats::skewness(&rois),
        kurtosis: stats::excess_kurtosis(&rois),
        performance_rating: performance_rating(totals, max_drawdown_pct),
        risk_rating: RiskRating::from_sharpe(totals.sharpe),
        benchmark: benchmark(ledger, annualized, config.benchmark_roi),
    }
}

pub fn segment_stats<'a>(
    key: impl Into<String>,
    bets: impl IntoIterator<Item = &'a BetRecord>,
) -> SegmentStats {
    let mut count = 0usize;
    let mut wins = 0usize;
    let mut stake = 0.0_f64;
    let mut profit = 0.0_f64;
    for b in bets {
        count += 1;
        if b.is_win() {
            wins += 1;
        }
        stake += b.stake;
        profit += b.profit_loss;
    }
    SegmentStats {
        key: key.into(),
        bets: count,
        wins,
        win_rate: if count == 0 {
            0.0
        } else {
            100.0 * wins as f64 / count as f64
        },
        stake,
        profit,
        roi: roi(profit, stake),
    }
}

/// Bets grouped by league, keyed and ordered by league name.
pub fn group_by_league(ledger: &[BetRecord]) -> BTreeMap<&str, Vec<&BetRecord>> {
    let mut out: BTreeMap<&str, Vec<&BetRecord>> = BTreeMap::new();
    for b in ledger {
        out.entry(b.league.as_str()).or_default().push(b);
    }
    out
}

pub fn per_bet_type(ledger: &[BetRecord]) -> Vec<SegmentStats> {
    BetType::ALL
        .iter()
        .map(|t| (t, ledger.iter().filter(|b| b.bet_type == *t).collect::<Vec<_>>()))
        .filter(|(_, bets)| !bets.is_empty())
        .map(|(t, bets)| segment_stats(t.label(), bets))
        .collect()
}

/// Every configured band is reported, empty or not. Bands are half-open
/// except the last, which includes its upper edge.
pub fn per_confidence(ledger: &[BetRecord], bands: &[ConfidenceBand]) -> Vec<BandStats> {
    bands
        .iter()
        .enumerate()
        .map(|(idx, band)| {
            let inclusive = idx + 1 == bands.len();
            let bets = ledger.iter().filter(|b| band.contains(b.confidence, inclusive));
            BandStats {
                band: *band,
                stats: segment_stats(band.label(), bets),
            }
        })
        .collect()
}

pub fn day_label(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn iso_week_label(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

pub fn month_label(date: NaiveDate) -> String {
    format!("{}-{:02}", date.year(), date.month())
}

pub fn roi_by<'a, F>(
    bets: impl IntoIterator<Item = &'a BetRecord>,
    label: F,
) -> BTreeMap<String, f64>
where
    F: Fn(NaiveDate) -> String,
{
    let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for b in bets {
        let entry = sums.entry(label(b.date)).or_insert((0.0, 0.0));
        entry.0 += b.stake;
        entry.1 += b.profit_loss;
    }
    sums.into_iter()
        .map(|(k, (stake, profit))| (k, roi(profit, stake)))
        .collect()
}

/// ROI over the trailing `window` bets, one point per bet.
pub fn rolling_roi(ledger: &[BetRecord], window: usize) -> Vec<RollingPoint> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(ledger.len());
    let mut stake = 0.0_f64;
    let mut profit = 0.0_f64;
    for (i, b) in ledger.iter().enumerate() {
        stake += b.stake;
        profit += b.profit_loss;
        if i >= window {
            let old = &ledger[i - window];
            stake -= old.stake;
            profit -= old.profit_loss;
        }
        out.push(RollingPoint {
            date: b.date,
            roi: roi(profit, stake),
        });
    }
    out
}

/// Best and worst label by value; ties go to the smaller label.
pub fn extremes(values: &BTreeMap<String, f64>) -> Extremes {
    let mut best: Option<(&String, f64)> = None;
    let mut worst: Option<(&String, f64)> = None;
    for (label, v) in values {
        if best.is_none_or(|(_, b)| *v > b) {
            best = Some((label, *v));
        }
        if worst.is_none_or(|(_, w)| *v < w) {
            worst = Some((label, *v));
        }
    }
    Extremes {
        best: best.map(|(l, _)| l.clone()),
        worst: worst.map(|(l, _)| l.clone()),
    }
}

pub fn per_period(ledger: &[BetRecord], rolling_window: usize) -> PerPeriod {
    let daily = roi_by(ledger, day_label);
    let weekly = roi_by(ledger, iso_week_label);
    let monthly = roi_by(ledger, month_label);
    PerPeriod {
        daily_extremes: extremes(&daily),
        weekly_extremes: extremes(&weekly),
        monthly_extremes: extremes(&monthly),
        rolling: rolling_roi(ledger, rolling_window),
        daily,
        weekly,
        monthly,
    }
}

const SHARPE_FLOOR: f64 = 1.5;
const DRAWDOWN_CEILING: f64 = 20.0;
const DRAWDOWN_WARNING: f64 = 15.0;
const WIN_RATE_FLOOR: f64 = 55.0;
const PROFIT_FACTOR_FLOOR: f64 = 1.3;
const CALMAR_WARNING: f64 = 1.0;
const VAR_WARNING: f64 = -5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Passed,
    Warning,
    Critical,
}

impl ValidationStatus {
    pub fn label(self) -> &'static str {
        match self {
            ValidationStatus::Passed => "PASSED",
            ValidationStatus::Warning => "WARNING",
            ValidationStatus::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub status: ValidationStatus,
    pub bets: usize,
    pub years: f64,
    /// 5% quantile of per-bet P&L as a percentage of initial capital.
    pub capital_var_95: f64,
    pub warnings: Vec<String>,
    pub critical_issues: Vec<String>,
}

/// Grades a run against fixed production thresholds. Data requirements
/// are checked first; when they fail the metric checks are skipped.
pub fn validate(
    ledger: &[BetRecord],
    totals: &Totals,
    returns: &Returns,
    config: &BacktestConfig,
) -> Validation {
    let requirements = &config.validation;
    let years = period_range(ledger).days as f64 / DAYS_PER_YEAR;
    let scaled: Vec<f64> = ledger
        .iter()
        .map(|b| 100.0 * b.profit_loss / config.initial_capital)
        .collect();
    let capital_var_95 = stats::value_at_risk(&scaled, VAR_TAIL);

    let mut warnings = Vec::new();
    let mut critical = Vec::new();
    if totals.bets < requirements.min_bets {
        critical.push(format!(
            "insufficient data: {} bets < {} required",
            totals.bets, requirements.min_bets
        ));
    }
    if years < requirements.min_years {
        critical.push(format!(
            "insufficient period: {years:.1} years < {} required",
            requirements.min_years
        ));
    }

    if critical.is_empty() {
        if totals.sharpe < SHARPE_FLOOR {
            critical.push(format!("sharpe ratio {:.2} < {SHARPE_FLOOR}", totals.sharpe));
        }
        if returns.max_drawdown_pct > DRAWDOWN_CEILING {
            critical.push(format!(
                "max drawdown {:.1}% > {DRAWDOWN_CEILING:.1}%",
                returns.max_drawdown_pct
            ));
        } else if returns.max_drawdown_pct > DRAWDOWN_WARNING {
            warnings.push(format!("high drawdown: {:.1}%", returns.max_drawdown_pct));
        }
        if totals.win_rate < WIN_RATE_FLOOR {
            critical.push(format!(
                "win rate {:.1}% < {WIN_RATE_FLOOR:.1}%",
                totals.win_rate
            ));
        }
        if totals.profit_factor < PROFIT_FACTOR_FLOOR {
            critical.push(format!(
                "profit factor {:.2} < {PROFIT_FACTOR_FLOOR}",
                totals.profit_factor
            ));
        }
        if totals.calmar < CALMAR_WARNING {
            warnings.push(format!("low calmar ratio: {:.2}", totals.calmar));
        }
        if capital_var_95 < VAR_WARNING {
            warnings.push(format!(
                "high value at risk: {capital_var_95:.1}% of capital per bet"
            ));
        }
    }

    let status = if !critical.is_empty() {
        ValidationStatus::Critical
    } else if !warnings.is_empty() {
        ValidationStatus::Warning
    } else {
        ValidationStatus::Passed
    };
    Validation {
        status,
        bets: totals.bets,
        years,
        capital_var_95,
        warnings,
        critical_issues: critical,
    }
}
