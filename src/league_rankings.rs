use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::performance::{self, Extremes, PerformanceRating, SegmentStats};
use crate::records::BetRecord;
use crate::stats;

/// Per-league economics plus the descriptive consistency and risk scores.
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueAnalysis {
    pub stats: SegmentStats,
    pub consistency: f64,
    pub risk: f64,
    pub composite: f64,
    pub rating: PerformanceRating,
}

impl LeagueAnalysis {
    pub fn league(&self) -> &str {
        &self.stats.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingKind {
    Roi,
    WinRate,
    Consistency,
    LowRisk,
    Volume,
}

impl RankingKind {
    pub const ALL: [RankingKind; 5] = [
        RankingKind::Roi,
        RankingKind::WinRate,
        RankingKind::Consistency,
        RankingKind::LowRisk,
        RankingKind::Volume,
    ];

    pub fn key(self) -> &'static str {
        match self {
            RankingKind::Roi => "by_roi",
            RankingKind::WinRate => "by_win_rate",
            RankingKind::Consistency => "by_consistency",
            RankingKind::LowRisk => "by_low_risk",
            RankingKind::Volume => "by_volume",
        }
    }

    fn compare(self, a: &LeagueAnalysis, b: &LeagueAnalysis) -> Ordering {
        let primary = match self {
            RankingKind::Roi => b.stats.roi.total_cmp(&a.stats.roi),
            RankingKind::WinRate => b.stats.win_rate.total_cmp(&a.stats.win_rate),
            RankingKind::Consistency => b.consistency.total_cmp(&a.consistency),
            RankingKind::LowRisk => a.risk.total_cmp(&b.risk),
            RankingKind::Volume => b.stats.bets.cmp(&a.stats.bets),
        };
        primary.then_with(|| a.league().cmp(b.league()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub rank: usize,
    pub league: LeagueAnalysis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub kind: RankingKind,
    pub entries: Vec<RankEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LeagueSummary {
    pub leagues: usize,
    pub profitable_leagues: usize,
    pub profitable_share: f64,
    pub average_roi: f64,
    pub average_win_rate: f64,
    pub average_consistency: f64,
    pub average_risk: f64,
}

/// `max(0, 100 − 100·σ/|μ|)` over the monthly ROI series, population σ.
/// Zero with fewer than two months or a zero mean.
pub fn consistency_score(monthly_roi: &[f64]) -> f64 {
    if monthly_roi.len() < 2 {
        return 0.0;
    }
    let m = stats::mean(monthly_roi);
    if m == 0.0 {
        return 0.0;
    }
    (100.0 - 100.0 * stats::std_population(monthly_roi) / m.abs()).clamp(0.0, 100.0)
}

/// Average of the scaled per-bet ROI volatility and the scaled drawdown of
/// the cumulative ROI series, each capped at 100.
pub fn risk_score(bet_rois: &[f64]) -> f64 {
    let volatility = (stats::std_sample(bet_rois) * 10.0).min(100.0);
    let drawdown = (stats::drawdown_walk(bet_rois).max_drawdown * 2.0).min(100.0);
    (volatility + drawdown) / 2.0
}

pub fn composite_score(roi: f64, win_rate: f64, consistency: f64) -> f64 {
    let normalized_roi = (2.0 * roi).clamp(0.0, 100.0);
    let normalized_win_rate = (1.5 * win_rate).clamp(0.0, 100.0);
    0.5 * normalized_roi + 0.3 * normalized_win_rate + 0.2 * consistency
}

pub fn league_rating(composite: f64) -> PerformanceRating {
    if composite >= 80.0 {
        PerformanceRating::Excellent
    } else if composite >= 65.0 {
        PerformanceRating::VeryGood
    } else if composite >= 50.0 {
        PerformanceRating::Good
    } else if composite >= 35.0 {
        PerformanceRating::Regular
    } else {
        PerformanceRating::NeedsImprovement
    }
}

pub fn analyze_league(league: &str, bets: &[&BetRecord]) -> LeagueAnalysis {
    let seg = performance::segment_stats(league, bets.iter().copied());
    let monthly: Vec<f64> = performance::roi_by(bets.iter().copied(), performance::month_label)
        .into_values()
        .collect();
    let rois: Vec<f64> = bets.iter().map(|b| b.roi).collect();

    let consistency = consistency_score(&monthly);
    let composite = composite_score(seg.roi, seg.win_rate, consistency);
    LeagueAnalysis {
        consistency,
        risk: risk_score(&rois),
        composite,
        rating: league_rating(composite),
        stats: seg,
    }
}

/// One analysis per league, ordered by league name.
pub fn analyze_leagues(ledger: &[BetRecord]) -> Vec<LeagueAnalysis> {
    performance::group_by_league(ledger)
        .into_iter()
        .map(|(league, bets)| analyze_league(league, &bets))
        .collect()
}

pub fn rank(analyses: &[LeagueAnalysis], kind: RankingKind) -> Ranking {
    let mut sorted: Vec<&LeagueAnalysis> = analyses.iter().collect();
    sorted.sort_by(|a, b| kind.compare(a, b));
    Ranking {
        kind,
        entries: sorted
            .into_iter()
            .enumerate()
            .map(|(idx, league)| RankEntry {
                rank: idx + 1,
                league: league.clone(),
            })
            .collect(),
    }
}

pub fn rankings(analyses: &[LeagueAnalysis]) -> Vec<Ranking> {
    RankingKind::ALL
        .iter()
        .map(|kind| rank(analyses, *kind))
        .collect()
}

pub fn league_summary(analyses: &[LeagueAnalysis]) -> LeagueSummary {
    if analyses.is_empty() {
        return LeagueSummary::default();
    }
    let n = analyses.len();
    let profitable = analyses.iter().filter(|a| a.stats.roi > 0.0).count();
    let avg = |f: fn(&LeagueAnalysis) -> f64| analyses.iter().map(f).sum::<f64>() / n as f64;
    LeagueSummary {
        leagues: n,
        profitable_leagues: profitable,
        profitable_share: 100.0 * profitable as f64 / n as f64,
        average_roi: avg(|a| a.stats.roi),
        average_win_rate: avg(|a| a.stats.win_rate),
        average_consistency: avg(|a| a.consistency),
        average_risk: avg(|a| a.risk),
    }
}

/// Best and worst league by ROI.
pub fn league_extremes(analyses: &[LeagueAnalysis]) -> Extremes {
    let by_roi: BTreeMap<String, f64> = analyses
        .iter()
        .map(|a| (a.league().to_string(), a.stats.roi))
        .collect();
    performance::extremes(&by_roi)
}
