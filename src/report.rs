use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::calibration::{CalibrationBin, PointStats, Scores};
use crate::config::{BacktestConfig, level_key};
use crate::emit::{Money, Pct, Prob, Ratio};
use crate::league_rankings::{LeagueAnalysis, LeagueSummary, Ranking, RankingKind};
use crate::monte_carlo::MonteCarloSummary;
use crate::performance::{
    BandStats, Extremes, PerPeriod, PeriodRange, Returns, SegmentStats, Totals, Validation,
};
use crate::recommendations::{self, Findings};
use crate::simulator::SkipTally;
use crate::stats::Interval;
use crate::uncertainty::{ByLevel, Coverage, Uncertainty};
use crate::walk_forward::{WalkForward, WindowMetrics};

/// Everything the composer needs, computed and unrounded.
#[derive(Debug, Clone)]
pub struct ReportParts<'a> {
    pub config: &'a BacktestConfig,
    pub input_fingerprint: String,
    pub predictions: usize,
    pub candidates: usize,
    pub skips: SkipTally,
    pub period: PeriodRange,
    pub totals: Totals,
    pub returns: Returns,
    pub per_period: PerPeriod,
    pub per_league: Vec<LeagueAnalysis>,
    pub per_bet_type: Vec<SegmentStats>,
    pub per_confidence: Vec<BandStats>,
    pub rankings: Vec<Ranking>,
    pub league_summary: LeagueSummary,
    pub highlights: Extremes,
    pub monte_carlo: Option<MonteCarloSummary>,
    pub walk_forward: WalkForward,
    pub validation: Validation,
    pub uncertainty: Uncertainty,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Report {
    pub meta: Meta,
    pub period: Period,
    pub totals: TotalsOut,
    pub returns: ReturnsOut,
    pub per_period: PerPeriodOut,
    pub highlights: Highlights,
    pub per_league: Vec<LeagueOut>,
    pub per_bet_type: Vec<BetTypeOut>,
    pub per_confidence: Vec<BandOut>,
    pub rankings: RankingsOut,
    pub league_summary: LeagueSummaryOut,
    pub monte_carlo: Option<MonteCarloOut>,
    pub walk_forward: WalkForwardOut,
    pub validation: ValidationOut,
    pub uncertainty: UncertaintyOut,
    pub diagnostics: Diagnostics,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Meta {
    pub seed: u64,
    pub bootstrap_samples: usize,
    pub stake_strategy: String,
    pub initial_capital: Money,
    pub input_fingerprint: String,
    pub predictions: usize,
    pub candidates: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Period {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub days: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TotalsOut {
    pub bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub win_rate: Pct,
    pub total_stake: Money,
    pub total_profit: Money,
    pub total_roi: Pct,
    pub average_odds: Ratio,
    pub average_confidence: Prob,
    pub sharpe: Ratio,
    pub sortino: Ratio,
    pub calmar: Ratio,
    pub max_drawdown: Money,
    pub profit_factor: Ratio,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BenchmarkOut {
    pub benchmark_roi: Pct,
    pub excess_return: Pct,
    pub tracking_error: Pct,
    pub information_ratio: Ratio,
    pub outperforms: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReturnsOut {
    pub final_capital: Money,
    pub compound_roi: Pct,
    pub annualized_roi: Pct,
    pub risk_adjusted_roi: Pct,
    pub max_drawdown_pct: Pct,
    pub volatility: Pct,
    pub var_95: Pct,
    pub cvar_95: Pct,
    pub skewness: Ratio,
    pub kurtosis: Ratio,
    pub performance_rating: &'static str,
    pub risk_rating: &'static str,
    pub benchmark: BenchmarkOut,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RollingOut {
    pub date: NaiveDate,
    pub roi: Pct,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtremesOut {
    pub best: Option<String>,
    pub worst: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerPeriodOut {
    pub monthly: BTreeMap<String, Pct>,
    pub weekly: BTreeMap<String, Pct>,
    pub daily: BTreeMap<String, Pct>,
    pub rolling: Vec<RollingOut>,
    pub extremes: BTreeMap<&'static str, ExtremesOut>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Highlights {
    pub best_league: Option<String>,
    pub worst_league: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeagueOut {
    pub league: String,
    pub bets: usize,
    pub wins: usize,
    pub win_rate: Pct,
    pub stake: Money,
    pub profit: Money,
    pub roi: Pct,
    pub consistency: Pct,
    pub risk: Pct,
    pub rating: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BetTypeOut {
    pub bet_type: String,
    pub bets: usize,
    pub wins: usize,
    pub win_rate: Pct,
    pub stake: Money,
    pub profit: Money,
    pub roi: Pct,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BandOut {
    pub band: String,
    pub lower: Prob,
    pub upper: Prob,
    pub bets: usize,
    pub wins: usize,
    pub win_rate: Pct,
    pub stake: Money,
    pub profit: Money,
    pub roi: Pct,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoiRank {
    pub rank: usize,
    pub league: String,
    pub roi: Pct,
    pub bets: usize,
    pub win_rate: Pct,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WinRateRank {
    pub rank: usize,
    pub league: String,
    pub win_rate: Pct,
    pub roi: Pct,
    pub bets: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConsistencyRank {
    pub rank: usize,
    pub league: String,
    pub consistency: Pct,
    pub roi: Pct,
    pub risk: Pct,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LowRiskRank {
    pub rank: usize,
    pub league: String,
    pub risk: Pct,
    pub roi: Pct,
    pub consistency: Pct,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VolumeRank {
    pub rank: usize,
    pub league: String,
    pub bets: usize,
    pub roi: Pct,
    pub stake: Money,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RankingsOut {
    pub by_roi: Vec<RoiRank>,
    pub by_win_rate: Vec<WinRateRank>,
    pub by_consistency: Vec<ConsistencyRank>,
    pub by_low_risk: Vec<LowRiskRank>,
    pub by_volume: Vec<VolumeRank>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeagueSummaryOut {
    pub leagues: usize,
    pub profitable_leagues: usize,
    pub profitable_share: Pct,
    pub average_roi: Pct,
    pub average_win_rate: Pct,
    pub average_consistency: Pct,
    pub average_risk: Pct,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WindowMetricsOut {
    pub bets: usize,
    pub win_rate: Pct,
    pub profit: Money,
    pub roi: Pct,
    pub sharpe: Ratio,
    pub sortino: Ratio,
    pub max_drawdown: Money,
    pub profit_factor: Ratio,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WindowOut {
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub train: WindowMetricsOut,
    pub test: WindowMetricsOut,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WalkForwardOut {
    pub windows: Vec<WindowOut>,
    pub overall: Option<WindowMetricsOut>,
    pub stability_score: Ratio,
    pub overfitting_detected: bool,
    pub performance_degradation: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationOut {
    pub status: &'static str,
    pub bets: usize,
    pub years: Ratio,
    pub capital_var_95: Pct,
    pub warnings: Vec<String>,
    pub critical_issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonteCarloOut {
    pub paths: usize,
    pub mean_final_capital: Money,
    pub p5_final_capital: Money,
    pub p50_final_capital: Money,
    pub p95_final_capital: Money,
    pub probability_of_ruin: Prob,
    pub value_at_risk_95: Money,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PointOut {
    pub samples: usize,
    pub mean_predicted: Prob,
    pub base_rate: Prob,
    pub gap: Prob,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalibrationOut {
    pub bin_center: Prob,
    pub mean_pred: Option<Prob>,
    pub empirical: Option<Prob>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CoverageOut {
    pub expected: Prob,
    pub actual: Prob,
    pub gap: Prob,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QualityOut {
    pub bias: Prob,
    pub se: Prob,
    pub efficiency: Pct,
    pub stability: Pct,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoresOut {
    pub brier: Prob,
    pub log_loss: Prob,
    pub ece: Prob,
}

pub type IntervalOut = Option<[Prob; 2]>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UncertaintyOut {
    pub point: PointOut,
    pub calibration: Vec<CalibrationOut>,
    pub confidence_intervals: BTreeMap<&'static str, BTreeMap<String, IntervalOut>>,
    pub prediction_intervals: BTreeMap<String, IntervalOut>,
    pub coverage: BTreeMap<&'static str, BTreeMap<String, Option<CoverageOut>>>,
    pub quality: QualityOut,
    pub scores: ScoresOut,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Diagnostics {
    pub skips: BTreeMap<&'static str, usize>,
    pub total_skipped: usize,
}

pub fn compose(parts: ReportParts<'_>) -> Report {
    let findings = Findings {
        bets: parts.totals.bets,
        min_sample_bets: parts.config.min_sample_bets,
        sharpe: parts.totals.sharpe,
        total_roi: parts.totals.total_roi,
        win_rate: parts.totals.win_rate,
        profit_factor: parts.totals.profit_factor,
        max_drawdown_pct: parts.returns.max_drawdown_pct,
        probability_of_ruin: parts.monte_carlo.map(|m| m.probability_of_ruin),
        calibration_gap: (parts.uncertainty.point.samples > 0)
            .then_some(parts.uncertainty.point.gap),
        bootstrap_stability: parts.uncertainty.quality.stability,
        profitable_league_share: (parts.league_summary.leagues > 0)
            .then_some(parts.league_summary.profitable_share),
    };

    Report {
        meta: Meta {
            seed: parts.config.rng_seed,
            bootstrap_samples: parts.config.bootstrap_samples,
            stake_strategy: parts.config.stake_strategy.name().to_string(),
            initial_capital: Money(parts.config.initial_capital),
            input_fingerprint: parts.input_fingerprint,
            predictions: parts.predictions,
            candidates: parts.candidates,
        },
        period: Period {
            start: parts.period.start,
            end: parts.period.end,
            days: parts.period.days,
        },
        totals: totals_out(&parts.totals),
        returns: returns_out(&parts.returns),
        per_period: per_period_out(&parts.per_period),
        highlights: Highlights {
            best_league: parts.highlights.best,
            worst_league: parts.highlights.worst,
        },
        per_league: parts.per_league.iter().map(league_out).collect(),
        per_bet_type: parts
            .per_bet_type
            .iter()
            .map(|s| BetTypeOut {
                bet_type: s.key.clone(),
                bets: s.bets,
                wins: s.wins,
                win_rate: Pct(s.win_rate),
                stake: Money(s.stake),
                profit: Money(s.profit),
                roi: Pct(s.roi),
            })
            .collect(),
        per_confidence: parts
            .per_confidence
            .iter()
            .map(|b| BandOut {
                band: b.stats.key.clone(),
                lower: Prob(b.band.lo),
                upper: Prob(b.band.hi),
                bets: b.stats.bets,
                wins: b.stats.wins,
                win_rate: Pct(b.stats.win_rate),
                stake: Money(b.stats.stake),
                profit: Money(b.stats.profit),
                roi: Pct(b.stats.roi),
            })
            .collect(),
        rankings: rankings_out(&parts.rankings),
        league_summary: LeagueSummaryOut {
            leagues: parts.league_summary.leagues,
            profitable_leagues: parts.league_summary.profitable_leagues,
            profitable_share: Pct(parts.league_summary.profitable_share),
            average_roi: Pct(parts.league_summary.average_roi),
            average_win_rate: Pct(parts.league_summary.average_win_rate),
            average_consistency: Pct(parts.league_summary.average_consistency),
            average_risk: Pct(parts.league_summary.average_risk),
        },
        monte_carlo: parts.monte_carlo.map(|m| MonteCarloOut {
            paths: m.paths,
            mean_final_capital: Money(m.mean_final_capital),
            p5_final_capital: Money(m.p5_final_capital),
            p50_final_capital: Money(m.p50_final_capital),
            p95_final_capital: Money(m.p95_final_capital),
            probability_of_ruin: Prob(m.probability_of_ruin),
            value_at_risk_95: Money(m.value_at_risk_95),
        }),
        walk_forward: walk_forward_out(&parts.walk_forward),
        validation: ValidationOut {
            status: parts.validation.status.label(),
            bets: parts.validation.bets,
            years: Ratio(parts.validation.years),
            capital_var_95: Pct(parts.validation.capital_var_95),
            warnings: parts.validation.warnings,
            critical_issues: parts.validation.critical_issues,
        },
        uncertainty: uncertainty_out(&parts.uncertainty),
        diagnostics: Diagnostics {
            skips: parts.skips.iter().map(|(r, n)| (r.key(), n)).collect(),
            total_skipped: parts.skips.total(),
        },
        recommendations: recommendations::recommend(&findings),
    }
}

fn window_metrics_out(m: &WindowMetrics) -> WindowMetricsOut {
    WindowMetricsOut {
        bets: m.bets,
        win_rate: Pct(m.win_rate),
        profit: Money(m.profit),
        roi: Pct(m.roi),
        sharpe: Ratio(m.sharpe),
        sortino: Ratio(m.sortino),
        max_drawdown: Money(m.max_drawdown),
        profit_factor: Ratio(m.profit_factor),
    }
}

fn walk_forward_out(wf: &WalkForward) -> WalkForwardOut {
    WalkForwardOut {
        windows: wf
            .windows
            .iter()
            .map(|w| WindowOut {
                train_start: w.train_start,
                train_end: w.train_end,
                test_start: w.test_start,
                test_end: w.test_end,
                train: window_metrics_out(&w.train),
                test: window_metrics_out(&w.test),
            })
            .collect(),
        overall: wf.overall.as_ref().map(window_metrics_out),
        stability_score: Ratio(wf.stability_score),
        overfitting_detected: wf.overfitting_detected,
        performance_degradation: wf.performance_degradation,
    }
}

fn totals_out(t: &Totals) -> TotalsOut {
    TotalsOut {
        bets: t.bets,
        wins: t.wins,
        losses: t.losses,
        pushes: t.pushes,
        win_rate: Pct(t.win_rate),
        total_stake: Money(t.total_stake),
        total_profit: Money(t.total_profit),
        total_roi: Pct(t.total_roi),
        average_odds: Ratio(t.average_odds),
        average_confidence: Prob(t.average_confidence),
        sharpe: Ratio(t.sharpe),
        sortino: Ratio(t.sortino),
        calmar: Ratio(t.calmar),
        max_drawdown: Money(t.max_drawdown),
        profit_factor: Ratio(t.profit_factor),
    }
}

fn returns_out(r: &Returns) -> ReturnsOut {
    ReturnsOut {
        final_capital: Money(r.final_capital),
        compound_roi: Pct(r.compound_roi),
        annualized_roi: Pct(r.annualized_roi),
        risk_adjusted_roi: Pct(r.risk_adjusted_roi),
        max_drawdown_pct: Pct(r.max_drawdown_pct),
        volatility: Pct(r.volatility),
        var_95: Pct(r.var_95),
        cvar_95: Pct(r.cvar_95),
        skewness: Ratio(r.skewness),
        kurtosis: Ratio(r.kurtosis),
        performance_rating: r.performance_rating.label(),
        risk_rating: r.risk_rating.label(),
        benchmark: BenchmarkOut {
            benchmark_roi: Pct(r.benchmark.benchmark_roi),
            excess_return: Pct(r.benchmark.excess_return),
            tracking_error: Pct(r.benchmark.tracking_error),
            information_ratio: Ratio(r.benchmark.information_ratio),
            outperforms: r.benchmark.outperforms,
        },
    }
}

fn roi_map(values: &BTreeMap<String, f64>) -> BTreeMap<String, Pct> {
    values.iter().map(|(k, v)| (k.clone(), Pct(*v))).collect()
}

fn extremes_out(e: &Extremes) -> ExtremesOut {
    ExtremesOut {
        best: e.best.clone(),
        worst: e.worst.clone(),
    }
}

fn per_period_out(p: &PerPeriod) -> PerPeriodOut {
    let mut extremes = BTreeMap::new();
    extremes.insert("daily", extremes_out(&p.daily_extremes));
    extremes.insert("weekly", extremes_out(&p.weekly_extremes));
    extremes.insert("monthly", extremes_out(&p.monthly_extremes));
    PerPeriodOut {
        monthly: roi_map(&p.monthly),
        weekly: roi_map(&p.weekly),
        daily: roi_map(&p.daily),
        rolling: p
            .rolling
            .iter()
            .map(|r| RollingOut {
                date: r.date,
                roi: Pct(r.roi),
            })
            .collect(),
        extremes,
    }
}

fn league_out(a: &LeagueAnalysis) -> LeagueOut {
    LeagueOut {
        league: a.league().to_string(),
        bets: a.stats.bets,
        wins: a.stats.wins,
        win_rate: Pct(a.stats.win_rate),
        stake: Money(a.stats.stake),
        profit: Money(a.stats.profit),
        roi: Pct(a.stats.roi),
        consistency: Pct(a.consistency),
        risk: Pct(a.risk),
        rating: a.rating.label(),
    }
}

fn rankings_out(rankings: &[Ranking]) -> RankingsOut {
    let mut out = RankingsOut::default();
    for ranking in rankings {
        for entry in &ranking.entries {
            let rank = entry.rank;
            let a = &entry.league;
            let league = a.league().to_string();
            match ranking.kind {
                RankingKind::Roi => out.by_roi.push(RoiRank {
                    rank,
                    league,
                    roi: Pct(a.stats.roi),
                    bets: a.stats.bets,
                    win_rate: Pct(a.stats.win_rate),
                }),
                RankingKind::WinRate => out.by_win_rate.push(WinRateRank {
                    rank,
                    league,
                    win_rate: Pct(a.stats.win_rate),
                    roi: Pct(a.stats.roi),
                    bets: a.stats.bets,
                }),
                RankingKind::Consistency => out.by_consistency.push(ConsistencyRank {
                    rank,
                    league,
                    consistency: Pct(a.consistency),
                    roi: Pct(a.stats.roi),
                    risk: Pct(a.risk),
                }),
                RankingKind::LowRisk => out.by_low_risk.push(LowRiskRank {
                    rank,
                    league,
                    risk: Pct(a.risk),
                    roi: Pct(a.stats.roi),
                    consistency: Pct(a.consistency),
                }),
                RankingKind::Volume => out.by_volume.push(VolumeRank {
                    rank,
                    league,
                    bets: a.stats.bets,
                    roi: Pct(a.stats.roi),
                    stake: Money(a.stats.stake),
                }),
            }
        }
    }
    out
}

fn interval_out(interval: Option<Interval>) -> IntervalOut {
    interval.map(|i| [Prob(i.lower), Prob(i.upper)])
}

fn by_level<T, U>(values: &ByLevel<T>, f: impl Fn(&T) -> U) -> BTreeMap<String, U> {
    values
        .iter()
        .map(|(level, v)| (level_key(*level), f(v)))
        .collect()
}

fn point_out(p: &PointStats) -> PointOut {
    PointOut {
        samples: p.samples,
        mean_predicted: Prob(p.mean_predicted),
        base_rate: Prob(p.base_rate),
        gap: Prob(p.gap),
    }
}

fn calibration_out(b: &CalibrationBin) -> CalibrationOut {
    CalibrationOut {
        bin_center: Prob(b.bin_center),
        mean_pred: b.mean_predicted.map(Prob),
        empirical: b.empirical_rate.map(Prob),
        count: b.count,
    }
}

fn coverage_out(c: &Option<Coverage>) -> Option<CoverageOut> {
    c.map(|c| CoverageOut {
        expected: Prob(c.expected),
        actual: Prob(c.actual),
        gap: Prob(c.gap),
    })
}

fn scores_out(s: &Scores) -> ScoresOut {
    ScoresOut {
        brier: Prob(s.brier),
        log_loss: Prob(s.log_loss),
        ece: Prob(s.ece),
    }
}

fn uncertainty_out(u: &Uncertainty) -> UncertaintyOut {
    UncertaintyOut {
        point: point_out(&u.point),
        calibration: u.calibration.iter().map(calibration_out).collect(),
        confidence_intervals: u
            .confidence_intervals
            .iter()
            .map(|(method, levels)| (method.key(), by_level(levels, |i| interval_out(*i))))
            .collect(),
        prediction_intervals: by_level(&u.prediction_intervals, |i| interval_out(*i)),
        coverage: u
            .coverage
            .iter()
            .map(|(method, levels)| (*method, by_level(levels, coverage_out)))
            .collect(),
        quality: QualityOut {
            bias: Prob(u.quality.bias),
            se: Prob(u.quality.se),
            efficiency: Pct(u.quality.efficiency),
            stability: Pct(u.quality.stability.unwrap_or(0.0)),
        },
        scores: scores_out(&u.scores),
    }
}
